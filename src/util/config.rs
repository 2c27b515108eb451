//! Configuration file support for gem-compiler.
//!
//! Two configuration file locations are read:
//! - Global: `~/.gem-compiler/config.toml` - User-wide defaults
//! - Project: `.gem-compiler.toml` in the current directory
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ops::compile::{AbiLock, ArtifactRule};

/// gem-compiler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compile settings
    pub compile: CompileConfig,

    /// External tools
    pub toolchain: ToolchainSettings,

    /// Commands run before extensions are built
    pub hooks: HooksConfig,
}

/// Defaults for `gem-compiler compile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Directory the compiled gem is written to
    pub output: Option<PathBuf>,

    /// ABI lock mode (ruby, strict, none)
    pub abi_lock: Option<String>,

    /// Drop manifest entries for files missing after the build
    pub prune: Option<bool>,

    /// Strip command line applied to built extensions
    pub strip: Option<String>,

    /// Directory searched for linkable shared libraries
    pub include_shared_dir: Option<PathBuf>,

    /// Artifact rules; a leading `!` excludes
    pub artifacts: Vec<String>,

    /// Where temporary workspaces are created
    pub temp_dir: Option<PathBuf>,
}

/// Tool overrides for extension builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Ruby interpreter (e.g., /opt/ruby/bin/ruby)
    pub ruby: Option<PathBuf>,

    /// make program (e.g., gmake)
    pub make: Option<String>,

    /// rake program
    pub rake: Option<String>,

    /// cmake program
    pub cmake: Option<String>,

    /// Parallel jobs passed to make and cmake (None = tool default)
    pub jobs: Option<usize>,
}

/// Build hooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Command lines run in the unpacked gem directory before building
    pub pre_build: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Compile settings
        if other.compile.output.is_some() {
            self.compile.output = other.compile.output;
        }
        if other.compile.abi_lock.is_some() {
            self.compile.abi_lock = other.compile.abi_lock;
        }
        if other.compile.prune.is_some() {
            self.compile.prune = other.compile.prune;
        }
        if other.compile.strip.is_some() {
            self.compile.strip = other.compile.strip;
        }
        if other.compile.include_shared_dir.is_some() {
            self.compile.include_shared_dir = other.compile.include_shared_dir;
        }
        if !other.compile.artifacts.is_empty() {
            self.compile.artifacts = other.compile.artifacts;
        }
        if other.compile.temp_dir.is_some() {
            self.compile.temp_dir = other.compile.temp_dir;
        }

        // Toolchain settings
        if other.toolchain.ruby.is_some() {
            self.toolchain.ruby = other.toolchain.ruby;
        }
        if other.toolchain.make.is_some() {
            self.toolchain.make = other.toolchain.make;
        }
        if other.toolchain.rake.is_some() {
            self.toolchain.rake = other.toolchain.rake;
        }
        if other.toolchain.cmake.is_some() {
            self.toolchain.cmake = other.toolchain.cmake;
        }
        if other.toolchain.jobs.is_some() {
            self.toolchain.jobs = other.toolchain.jobs;
        }

        // Hooks replace rather than accumulate
        if !other.hooks.pre_build.is_empty() {
            self.hooks.pre_build = other.hooks.pre_build;
        }
    }

    /// Parse the ABI lock mode.
    pub fn abi_lock(&self) -> Result<Option<AbiLock>> {
        self.compile
            .abi_lock
            .as_deref()
            .map(|s| {
                s.parse()
                    .map_err(|e: String| anyhow::anyhow!("invalid compile.abi_lock: {}", e))
            })
            .transpose()
    }

    /// Parse the artifact rules.
    pub fn artifact_rules(&self) -> Result<Vec<ArtifactRule>> {
        self.compile
            .artifacts
            .iter()
            .map(|s| {
                s.parse()
                    .with_context(|| format!("invalid entry in compile.artifacts: `{}`", s))
            })
            .collect()
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.gem-compiler.toml)
/// 2. Global config (~/.gem-compiler/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    // Load global config first
    if global_path.exists() {
        let global = Config::load_or_default(global_path);
        config.merge(global);
    }

    // Project config overrides global
    if project_path.exists() {
        let project = Config::load_or_default(project_path);
        config.merge(project);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.compile.output.is_none());
        assert!(config.compile.prune.is_none());
        assert!(config.compile.artifacts.is_empty());
        assert!(config.hooks.pre_build.is_empty());
        assert!(config.abi_lock().unwrap().is_none());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[compile]
output = "pkg"
abi_lock = "strict"
prune = true
strip = "strip -x"
include_shared_dir = "ext"
artifacts = ["lib/**/*.so", "!lib/**/test_*.so"]

[toolchain]
make = "gmake"
jobs = 4

[hooks]
pre_build = ["./script/prepare"]
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.compile.output, Some(PathBuf::from("pkg")));
        assert_eq!(config.abi_lock().unwrap(), Some(AbiLock::Strict));
        assert_eq!(config.compile.prune, Some(true));
        assert_eq!(config.compile.strip.as_deref(), Some("strip -x"));
        assert_eq!(config.toolchain.make.as_deref(), Some("gmake"));
        assert_eq!(config.toolchain.jobs, Some(4));
        assert_eq!(config.hooks.pre_build, vec!["./script/prepare"]);

        let rules = config.artifact_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[0].include);
        assert!(!rules[1].include);
        assert_eq!(rules[1].pattern, "lib/**/test_*.so");
    }

    #[test]
    fn test_config_invalid_abi_lock() {
        let mut config = Config::default();
        config.compile.abi_lock = Some("loose".to_string());
        assert!(config.abi_lock().is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.compile.output = Some(PathBuf::from("pkg"));
        base.compile.prune = Some(true);
        base.toolchain.jobs = Some(4);

        let mut override_cfg = Config::default();
        override_cfg.compile.output = Some(PathBuf::from("dist"));
        override_cfg.compile.prune = Some(false);

        base.merge(override_cfg);

        assert_eq!(base.compile.output, Some(PathBuf::from("dist")));
        assert_eq!(base.compile.prune, Some(false));
        assert_eq!(base.toolchain.jobs, Some(4)); // Not overridden
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");

        std::fs::write(
            &global_path,
            r#"
[compile]
strip = "strip"
abi_lock = "none"
"#,
        )
        .unwrap();

        std::fs::write(
            &project_path,
            r#"
[compile]
abi_lock = "strict"
"#,
        )
        .unwrap();

        let config = load_config(&global_path, &project_path);
        assert_eq!(config.abi_lock().unwrap(), Some(AbiLock::Strict));
        assert_eq!(config.compile.strip.as_deref(), Some("strip"));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[compile\noutput = ").unwrap();

        let config = Config::load_or_default(&path);
        assert!(config.compile.output.is_none());
    }
}
