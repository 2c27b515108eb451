//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use gem_compiler::ops::AbiLock;
use gem_compiler::util::shell::ColorChoice;

/// gem-compiler - Build native extensions and repackage a gem for this platform
#[derive(Parser)]
#[command(name = "gem-compiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output (-v per-file details, -vv debug logging)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Disable colored output (same as --color=never)
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the native extensions of a gem into a binary gem
    Compile(CompileArgs),

    /// Show the detected host platform
    Host(HostArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct CompileArgs {
    /// Source gem to compile (e.g. foo-0.1.0.gem)
    pub gemfile: Option<PathBuf>,

    /// Directory to write the compiled gem to
    #[arg(short = 'O', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Also package linkable shared libraries found under DIR
    #[arg(long, value_name = "DIR")]
    pub include_shared_dir: Option<String>,

    /// Add files matching PATTERN; prefix with '!' to exclude (repeatable)
    #[arg(long = "artifact", value_name = "PATTERN")]
    pub artifacts: Vec<String>,

    /// Remove files from the gemspec that no longer exist after the build
    #[arg(long)]
    pub prune: bool,

    /// Lock the compiled gem to the Ruby ABI
    #[arg(long, value_enum, value_name = "MODE")]
    pub abi_lock: Option<AbiLockArg>,

    /// Do not lock the compiled gem to the Ruby ABI (same as --abi-lock=none)
    #[arg(short = 'N', long, conflicts_with = "abi_lock")]
    pub no_abi_lock: bool,

    /// Strip symbols from extensions, optionally with a custom command
    #[arg(
        short = 'S',
        long,
        value_name = "CMD",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    pub strip: Option<String>,

    /// Ruby interpreter used to probe the host and build extensions
    #[arg(long, value_name = "PATH", env = "GEM_COMPILER_RUBY")]
    pub ruby: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AbiLockArg {
    /// Lock to the Ruby ABI version (e.g. ~> 3.3.0)
    Ruby,
    /// Lock to the exact Ruby version (e.g. ~> 3.3.4.0)
    Strict,
    /// Keep the gem's own requirement
    None,
}

impl From<AbiLockArg> for AbiLock {
    fn from(arg: AbiLockArg) -> Self {
        match arg {
            AbiLockArg::Ruby => AbiLock::Ruby,
            AbiLockArg::Strict => AbiLock::Strict,
            AbiLockArg::None => AbiLock::None,
        }
    }
}

#[derive(Args)]
pub struct HostArgs {
    /// Ruby interpreter to describe
    #[arg(long, value_name = "PATH", env = "GEM_COMPILER_RUBY")]
    pub ruby: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
