//! CLI integration tests for gem-compiler.
//!
//! Tests that need a real Ruby return early when none is on PATH.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

use gem_compiler::core::version::GemVersion;
use gem_compiler::core::{GemPackage, GemSpec};

/// Get the gem-compiler binary command, isolated from the user's config.
fn gem_compiler(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gem-compiler").unwrap();
    cmd.env("HOME", home).env_remove("GEM_COMPILER_RUBY");
    cmd
}

/// Create a temporary directory for test gems.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn have_ruby() -> bool {
    which::which("ruby").is_ok()
}

/// Package a pure-Ruby gem (no extensions) into `dir`.
fn pure_ruby_gem(dir: &Path) -> PathBuf {
    let stage = dir.join("stage");
    fs::create_dir_all(stage.join("lib")).unwrap();
    fs::write(stage.join("lib/plain.rb"), "module Plain; end\n").unwrap();

    let mut spec = GemSpec::new("plain", GemVersion::parse("1.0.0").unwrap());
    spec.add_file("lib/plain.rb");

    let name = GemPackage::build(&spec, &stage).unwrap();
    let gem = dir.join(&name);
    fs::rename(stage.join(&name), &gem).unwrap();
    gem
}

// ============================================================================
// General
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("host"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_compile_help_lists_options() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .args(["compile", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--abi-lock"))
        .stdout(predicate::str::contains("--include-shared-dir"))
        .stdout(predicate::str::contains("--artifact"))
        .stdout(predicate::str::contains("--strip"));
}

#[test]
fn test_completions_bash() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gem-compiler"));
}

#[test]
fn test_rejects_unknown_color_choice() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .args(["--color", "sometimes", "completions", "bash"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid color choice"));
}

// ============================================================================
// gem-compiler compile
// ============================================================================

#[test]
fn test_compile_without_gem_fails() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .arg("compile")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please specify a gem file"));
}

#[test]
fn test_compile_missing_gem_file() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .args(["compile", "nothing-1.0.0.gem"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_compile_rejects_unknown_abi_lock() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .args(["compile", "--abi-lock", "loose", "foo-1.0.0.gem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("possible values"));
}

#[test]
fn test_no_abi_lock_conflicts_with_abi_lock() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .args(["compile", "-N", "--abi-lock", "strict", "foo-1.0.0.gem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_compile_with_unusable_ruby() {
    let tmp = temp_dir();
    let gem = pure_ruby_gem(tmp.path());

    gem_compiler(tmp.path())
        .arg("compile")
        .arg(&gem)
        .args(["--ruby", "/nonexistent/bin/ruby"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to run Ruby interpreter"));
}

#[test]
fn test_compile_skips_gem_without_extensions() {
    if !have_ruby() {
        return;
    }
    let tmp = temp_dir();
    let gem = pure_ruby_gem(tmp.path());
    let out = tmp.path().join("out");
    fs::create_dir(&out).unwrap();

    gem_compiler(tmp.path())
        .arg("compile")
        .arg(&gem)
        .arg("-O")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("no extensions to build"));

    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_compile_quiet_prints_nothing_on_skip() {
    if !have_ruby() {
        return;
    }
    let tmp = temp_dir();
    let gem = pure_ruby_gem(tmp.path());

    gem_compiler(tmp.path())
        .args(["-q", "compile"])
        .arg(&gem)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_compile_missing_output_dir() {
    if !have_ruby() {
        return;
    }
    let tmp = temp_dir();
    let gem = pure_ruby_gem(tmp.path());

    gem_compiler(tmp.path())
        .arg("compile")
        .arg(&gem)
        .arg("-O")
        .arg(tmp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("output directory"));
}

#[test]
fn test_compile_reads_project_config() {
    if !have_ruby() {
        return;
    }
    let tmp = temp_dir();
    let gem = pure_ruby_gem(tmp.path());
    fs::write(
        tmp.path().join(".gem-compiler.toml"),
        "[compile]\nartifacts = [\"\"]\n",
    )
    .unwrap();

    gem_compiler(tmp.path())
        .arg("compile")
        .arg(&gem)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid artifact rule"));
}

// ============================================================================
// gem-compiler host
// ============================================================================

#[test]
fn test_host_describes_platform() {
    if !have_ruby() {
        return;
    }
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .arg("host")
        .assert()
        .success()
        .stdout(predicate::str::contains("ruby"));
}

#[test]
fn test_host_with_unusable_ruby() {
    let tmp = temp_dir();

    gem_compiler(tmp.path())
        .args(["host", "--ruby", "/nonexistent/bin/ruby"])
        .assert()
        .failure();
}
