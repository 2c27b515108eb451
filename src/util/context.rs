//! Global context for gem-compiler operations.
//!
//! Provides centralized access to configuration and paths.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;

use crate::util::config::{load_config, Config};

/// Name of the per-user configuration directory under the home directory.
const HOME_DIR_NAME: &str = ".gem-compiler";

/// File name of the project configuration.
pub const PROJECT_CONFIG_FILE: &str = ".gem-compiler.toml";

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global settings (~/.gem-compiler/)
    home: PathBuf,

    /// Merged configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let home = BaseDirs::new()
            .map(|b| b.home_dir().join(HOME_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(HOME_DIR_NAME));
        Ok(Self::with_paths(cwd, home))
    }

    /// Create a GlobalContext with explicit working and home directories,
    /// loading configuration from both.
    pub fn with_paths(cwd: PathBuf, home: PathBuf) -> Self {
        let config = load_config(
            &home.join("config.toml"),
            &cwd.join(PROJECT_CONFIG_FILE),
        );
        GlobalContext { cwd, home, config }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the gem-compiler home directory (~/.gem-compiler/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the project configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        self.cwd.join(PROJECT_CONFIG_FILE)
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}
