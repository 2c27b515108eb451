//! Gem archive fixtures.
//!
//! A [`GemFixture`] describes a gem (its specification and file contents)
//! and bakes it into a real `.gem` archive on disk.

use std::path::{Path, PathBuf};

use crate::core::package::GemPackage;
use crate::core::spec::GemSpec;
use crate::core::version::GemVersion;

/// Fixture for a complete gem.
#[derive(Debug, Clone)]
pub struct GemFixture {
    /// Specification; `files` is filled in from `contents` when built.
    pub spec: GemSpec,
    /// Files (path relative to the gem root -> content).
    pub contents: Vec<(String, String)>,
}

impl GemFixture {
    /// A pure Ruby source gem with a single library file.
    pub fn new(name: &str, version: &str) -> Self {
        let spec = GemSpec::new(name, GemVersion::parse(version).unwrap());
        GemFixture {
            spec,
            contents: vec![(
                format!("lib/{}.rb", name),
                format!("require \"{}/{}\"\n", name, name),
            )],
        }
    }

    /// A source gem with one extconf-based extension in `ext/<name>`.
    pub fn with_extension(name: &str, version: &str) -> Self {
        let extconf = format!("ext/{}/extconf.rb", name);
        GemFixture::new(name, version)
            .file(
                &extconf,
                &format!("require \"mkmf\"\ncreate_makefile(\"{}/{}\")\n", name, name),
            )
            .file(&format!("ext/{}/{}.c", name, name), "void Init_ext(void) {}\n")
            .extension(&extconf)
    }

    /// A source gem whose `mkrf_conf.rb` generates a Rakefile that touches
    /// `artifact` in `RUBYARCHDIR`.
    pub fn with_rake_extension(name: &str, version: &str, artifact: &str) -> Self {
        let mkrf = format!("ext/{}/mkrf_conf.rb", name);
        let script = format!(
            r#"File.open("Rakefile", "w") do |f|
  f.puts 'task :default do'
  f.puts '  touch File.join(ENV["RUBYARCHDIR"], "{artifact}")'
  f.puts 'end'
end
"#
        );
        GemFixture::new(name, version)
            .file(&mkrf, &script)
            .extension(&mkrf)
    }

    /// Add a file.
    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.contents.push((path.to_string(), content.to_string()));
        self
    }

    /// Declare an extension entry point.
    pub fn extension(mut self, path: &str) -> Self {
        self.spec.extensions.push(path.to_string());
        self
    }

    /// Bake the gem into `dir` and return the path of the archive.
    pub fn build(&self, dir: &Path) -> PathBuf {
        let staging = tempfile::Builder::new()
            .prefix("fixture")
            .tempdir_in(dir)
            .unwrap();

        let mut spec = self.spec.clone();
        for (path, content) in &self.contents {
            let full = staging.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(&full, content).unwrap();
            spec.add_file(path.clone());
        }

        let file_name = GemPackage::build(&spec, staging.path()).unwrap();
        let gemfile = dir.join(&file_name);
        std::fs::rename(staging.path().join(&file_name), &gemfile).unwrap();
        gemfile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fixture_round_trips_through_package() {
        let tmp = TempDir::new().unwrap();
        let gemfile = GemFixture::with_extension("oj", "3.16.1").build(tmp.path());

        assert_eq!(gemfile.file_name().unwrap(), "oj-3.16.1.gem");
        let package = GemPackage::open(&gemfile).unwrap();
        assert_eq!(package.spec().extensions, ["ext/oj/extconf.rb"]);
        assert_eq!(
            package.spec().files,
            ["lib/oj.rb", "ext/oj/extconf.rb", "ext/oj/oj.c"]
        );
    }
}
