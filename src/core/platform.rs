//! Host platform detection.
//!
//! The host is described by the Ruby interpreter that will load the compiled
//! extensions: its version, ABI version, `Gem::Platform` and the file
//! extensions it expects for native code.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::core::version::GemVersion;
use crate::util::process::ProcessBuilder;

/// Operating system family, used to pick the linkable shared library extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    /// Linux, the BSDs and Solaris.
    Unix,
    /// MinGW, MSVC, Cygwin and MSYS builds.
    Windows,
    /// Darwin.
    Mach,
    Unknown,
}

/// `Gem::Platform#os` values and their family.
const OS_FAMILIES: &[(&str, PlatformFamily)] = &[
    ("linux", PlatformFamily::Unix),
    ("freebsd", PlatformFamily::Unix),
    ("openbsd", PlatformFamily::Unix),
    ("netbsd", PlatformFamily::Unix),
    ("dragonfly", PlatformFamily::Unix),
    ("solaris", PlatformFamily::Unix),
    ("darwin", PlatformFamily::Mach),
    ("mingw", PlatformFamily::Windows),
    ("mingw32", PlatformFamily::Windows),
    ("mswin", PlatformFamily::Windows),
    ("mswin32", PlatformFamily::Windows),
    ("mswin64", PlatformFamily::Windows),
    ("cygwin", PlatformFamily::Windows),
    ("msys", PlatformFamily::Windows),
];

impl PlatformFamily {
    /// Look up the family of a `Gem::Platform` OS name.
    pub fn from_os(os: &str) -> PlatformFamily {
        OS_FAMILIES
            .iter()
            .find(|(name, _)| *name == os)
            .map(|(_, family)| *family)
            .unwrap_or(PlatformFamily::Unknown)
    }

    /// Extension of linkable shared libraries for this family.
    ///
    /// Unknown platforms fall back to `so`.
    pub fn shared_lib_ext(&self) -> &'static str {
        match self {
            PlatformFamily::Unix => "so",
            PlatformFamily::Windows => "dll",
            PlatformFamily::Mach => "dylib",
            PlatformFamily::Unknown => "so",
        }
    }
}

/// The generic platform marker of source gems.
pub const RUBY_PLATFORM: &str = "ruby";

/// Everything the pipeline needs to know about the host Ruby.
#[derive(Debug, Clone)]
pub struct RubyHost {
    /// Interpreter used for probing and building.
    pub ruby: PathBuf,
    /// `RUBY_VERSION`, e.g. `3.3.4`.
    pub ruby_version: GemVersion,
    /// `RbConfig::CONFIG["ruby_version"]`, the ABI version, e.g. `3.3.0`.
    pub abi_version: String,
    pub major: u32,
    pub minor: u32,
    pub teeny: u32,
    /// `Gem::VERSION`.
    pub rubygems_version: GemVersion,
    /// `Gem::Platform.local.to_s`, e.g. `x86_64-linux`.
    pub platform: String,
    /// `Gem::Platform.local.os`, e.g. `linux`.
    pub os: String,
    /// Extension of loadable Ruby extensions (`RbConfig DLEXT`).
    pub dlext: String,
    /// Default strip command (`RbConfig STRIP`).
    pub strip: Option<String>,
}

const PROBE_SCRIPT: &str = r#"require "json"
require "rbconfig"
c = RbConfig::CONFIG
plat = Gem::Platform.local
print JSON.generate(
  "ruby" => File.join(c["bindir"], c["ruby_install_name"] + c["EXEEXT"].to_s),
  "ruby_version" => RUBY_VERSION,
  "abi_version" => c["ruby_version"],
  "major" => c["MAJOR"],
  "minor" => c["MINOR"],
  "teeny" => c["TEENY"],
  "rubygems_version" => Gem::VERSION,
  "platform" => plat.to_s,
  "os" => plat.os,
  "dlext" => c["DLEXT"],
  "strip" => c["STRIP"]
)"#;

#[derive(Debug, Deserialize)]
struct Probe {
    ruby: PathBuf,
    ruby_version: String,
    abi_version: String,
    major: String,
    minor: String,
    teeny: String,
    rubygems_version: String,
    platform: String,
    os: String,
    dlext: String,
    strip: Option<String>,
}

impl RubyHost {
    /// Ask the given interpreter about itself.
    pub fn probe(ruby: &Path) -> Result<Self> {
        tracing::debug!("probing host Ruby at {}", ruby.display());

        let output = ProcessBuilder::new(ruby)
            .arg("-e")
            .arg(PROBE_SCRIPT)
            .exec()
            .with_context(|| format!("failed to run Ruby interpreter `{}`", ruby.display()))?;

        if !output.status.success() {
            bail!(
                "`{}` could not describe the host platform:\n{}",
                ruby.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        RubyHost::from_probe_json(&String::from_utf8_lossy(&output.stdout))
    }

    fn from_probe_json(json: &str) -> Result<Self> {
        let probe: Probe =
            serde_json::from_str(json).context("unexpected output from host Ruby probe")?;

        let number = |field: &str, value: &str| -> Result<u32> {
            value
                .parse()
                .with_context(|| format!("invalid {} version component `{}`", field, value))
        };

        Ok(RubyHost {
            major: number("MAJOR", &probe.major)?,
            minor: number("MINOR", &probe.minor)?,
            teeny: number("TEENY", &probe.teeny)?,
            ruby_version: GemVersion::parse(&probe.ruby_version)?,
            rubygems_version: GemVersion::parse(&probe.rubygems_version)?,
            ruby: probe.ruby,
            abi_version: probe.abi_version,
            platform: probe.platform,
            os: probe.os,
            dlext: probe.dlext,
            strip: probe.strip.filter(|s| !s.trim().is_empty()),
        })
    }

    pub fn family(&self) -> PlatformFamily {
        PlatformFamily::from_os(&self.os)
    }

    /// Extension of linkable shared libraries on this host.
    pub fn shared_lib_ext(&self) -> &'static str {
        self.family().shared_lib_ext()
    }

    /// The strip command used when none is given explicitly.
    pub fn default_strip(&self) -> String {
        self.strip.clone().unwrap_or_else(|| "strip".to_string())
    }
}

impl fmt::Display for RubyHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ruby:       {}", self.ruby.display())?;
        writeln!(f, "version:    {} (ABI {})", self.ruby_version, self.abi_version)?;
        writeln!(f, "rubygems:   {}", self.rubygems_version)?;
        writeln!(f, "platform:   {}", self.platform)?;
        writeln!(f, "extensions: .{} (shared .{})", self.dlext, self.shared_lib_ext())?;
        write!(f, "strip:      {}", self.default_strip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_lookup() {
        assert_eq!(PlatformFamily::from_os("linux"), PlatformFamily::Unix);
        assert_eq!(PlatformFamily::from_os("freebsd"), PlatformFamily::Unix);
        assert_eq!(PlatformFamily::from_os("solaris"), PlatformFamily::Unix);
        assert_eq!(PlatformFamily::from_os("mingw32"), PlatformFamily::Windows);
        assert_eq!(PlatformFamily::from_os("mswin64"), PlatformFamily::Windows);
        assert_eq!(PlatformFamily::from_os("darwin"), PlatformFamily::Mach);
        assert_eq!(PlatformFamily::from_os("java"), PlatformFamily::Unknown);
    }

    #[test]
    fn test_shared_lib_ext() {
        assert_eq!(PlatformFamily::Unix.shared_lib_ext(), "so");
        assert_eq!(PlatformFamily::Windows.shared_lib_ext(), "dll");
        assert_eq!(PlatformFamily::Mach.shared_lib_ext(), "dylib");
        assert_eq!(PlatformFamily::Unknown.shared_lib_ext(), "so");
    }

    #[test]
    fn test_from_probe_json() {
        let json = r#"{
            "ruby": "/usr/bin/ruby",
            "ruby_version": "3.3.4",
            "abi_version": "3.3.0",
            "major": "3", "minor": "3", "teeny": "4",
            "rubygems_version": "3.5.11",
            "platform": "x86_64-linux",
            "os": "linux",
            "dlext": "so",
            "strip": "strip -S -x"
        }"#;

        let host = RubyHost::from_probe_json(json).unwrap();
        assert_eq!(host.ruby_version, GemVersion::parse("3.3.4").unwrap());
        assert_eq!(host.abi_version, "3.3.0");
        assert_eq!((host.major, host.minor, host.teeny), (3, 3, 4));
        assert_eq!(host.family(), PlatformFamily::Unix);
        assert_eq!(host.default_strip(), "strip -S -x");
    }

    #[test]
    fn test_probe_without_strip() {
        let json = r#"{
            "ruby": "C:/Ruby33/bin/ruby.exe",
            "ruby_version": "3.3.4",
            "abi_version": "3.3.0",
            "major": "3", "minor": "3", "teeny": "4",
            "rubygems_version": "3.5.11",
            "platform": "x64-mingw-ucrt",
            "os": "mingw",
            "dlext": "so",
            "strip": ""
        }"#;

        let host = RubyHost::from_probe_json(json).unwrap();
        assert_eq!(host.shared_lib_ext(), "dll");
        assert_eq!(host.default_strip(), "strip");
    }

    #[test]
    fn test_invalid_probe() {
        assert!(RubyHost::from_probe_json("not json").is_err());
    }
}
