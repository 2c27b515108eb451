//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use anyhow::{bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

/// Exit status and interleaved stdout/stderr of a finished process.
#[derive(Debug)]
pub struct CombinedOutput {
    pub status: ExitStatus,
    pub output: String,
}

/// Why a process did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl ExitReason {
    pub fn from_status(status: &ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitReason::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitReason::Signal(signal);
            }
        }
        ExitReason::Unknown
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Code(code) => write!(f, "exit code {}", code),
            ExitReason::Signal(signal) => write!(f, "uncaught signal {}", signal),
            ExitReason::Unknown => f.write_str("unknown exit status"),
        }
    }
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Create a builder from a shell-style command line such as `strip -S -x`.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let words = shlex::split(line)
            .with_context(|| format!("invalid command line `{}`", line))?;
        let Some((program, args)) = words.split_first() else {
            bail!("empty command line");
        };
        Ok(ProcessBuilder::new(program).args(args))
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("running `{}`", self.display_command());

        let output = cmd
            .output()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute the command with stdout and stderr sent to the same sink.
    ///
    /// Output is collected in a temporary file so both streams keep their
    /// relative order, the way a terminal would show them.
    pub fn exec_combined(&self) -> Result<CombinedOutput> {
        let mut sink = tempfile::tempfile().context("failed to create output capture file")?;
        let stderr = sink
            .try_clone()
            .context("failed to create output capture file")?;
        let stdout = sink
            .try_clone()
            .context("failed to create output capture file")?;

        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::from(stdout));
        cmd.stderr(Stdio::from(stderr));

        tracing::debug!("running `{}`", self.display_command());

        let status = cmd
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))?;

        let mut bytes = Vec::new();
        sink.seek(SeekFrom::Start(0))
            .and_then(|_| sink.read_to_end(&mut bytes))
            .context("failed to read command output")?;

        Ok(CombinedOutput {
            status,
            output: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve a tool from an explicit setting, then an environment variable,
/// then a list of well-known names.
pub fn find_tool(configured: Option<&str>, env_var: &str, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(tool) = configured {
        return find_executable(tool).or_else(|| Some(PathBuf::from(tool)));
    }

    if let Ok(tool) = std::env::var(env_var) {
        if let Some(path) = find_executable(&tool) {
            return Some(path);
        }
    }

    candidates.iter().find_map(|name| find_executable(name))
}

/// Find make.
pub fn find_make(configured: Option<&str>) -> Option<PathBuf> {
    find_tool(configured, "MAKE", &["make", "gmake", "nmake"])
}

/// Find rake.
pub fn find_rake(configured: Option<&str>) -> Option<PathBuf> {
    find_tool(configured, "RAKE", &["rake"])
}

/// Find CMake.
pub fn find_cmake(configured: Option<&str>) -> Option<PathBuf> {
    find_tool(configured, "CMAKE", &["cmake"])
}
