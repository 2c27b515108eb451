//! `gem-compiler compile` command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::cli::CompileArgs;
use crate::commands::resolve_ruby;
use gem_compiler::builder::hooks::command_hooks;
use gem_compiler::builder::RubyToolchain;
use gem_compiler::core::RubyHost;
use gem_compiler::ops::{AbiLock, ArtifactRule, CompileError, CompileOptions, Compiler, Outcome};
use gem_compiler::util::shell::{Shell, Status};
use gem_compiler::util::GlobalContext;

pub fn execute(args: CompileArgs, shell: &Arc<Shell>) -> Result<()> {
    // Nothing else happens without a gem to work on.
    let Some(gemfile) = args.gemfile.as_deref() else {
        return Err(CompileError::MissingInputArgument.into());
    };

    let ctx = GlobalContext::new()?;
    let config = ctx.config();

    let gemfile = ctx.resolve(gemfile);
    if !gemfile.is_file() {
        bail!("gem file `{}` does not exist", gemfile.display());
    }

    let ruby = resolve_ruby(&ctx, args.ruby.as_deref())?;
    let host = RubyHost::probe(&ruby)?;
    tracing::debug!("host platform {} (ruby {})", host.platform, host.ruby_version);

    // ABI lock: --no-abi-lock > --abi-lock > config > default
    let abi_lock = if args.no_abi_lock {
        AbiLock::None
    } else {
        match args.abi_lock {
            Some(lock) => lock.into(),
            None => config.abi_lock()?.unwrap_or_default(),
        }
    };

    // Artifact rules from the command line replace configured ones
    let artifacts = if args.artifacts.is_empty() {
        config.artifact_rules()?
    } else {
        args.artifacts
            .iter()
            .map(|s| {
                s.parse::<ArtifactRule>()
                    .with_context(|| format!("invalid --artifact `{}`", s))
            })
            .collect::<Result<Vec<_>>>()?
    };

    // An empty strip command means the host default
    let strip = args
        .strip
        .or_else(|| config.compile.strip.clone())
        .map(|cmd| {
            if cmd.trim().is_empty() {
                host.default_strip()
            } else {
                cmd
            }
        });

    let output_dir = ctx.resolve(
        &args
            .output
            .or_else(|| config.compile.output.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
    );

    let options = CompileOptions {
        output_dir,
        include_shared_dir: args.include_shared_dir.or_else(|| {
            config
                .compile
                .include_shared_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned())
        }),
        artifacts,
        prune: args.prune || config.compile.prune.unwrap_or(false),
        abi_lock,
        strip,
        temp_dir: config.compile.temp_dir.as_deref().map(|dir| ctx.resolve(dir)),
    };

    let toolchain = RubyToolchain::new(config.toolchain.clone());
    let compiler = Compiler::new(&host, &toolchain, shell, options)
        .with_hooks(command_hooks(&config.hooks.pre_build));

    let name = gemfile
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let span = shell.span(Status::Compiling, &name);

    match compiler.compile(Some(&gemfile))? {
        Outcome::Built(path) => {
            let built = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            span.finish_with_message(built);
        }
        Outcome::Skipped(skip) => {
            tracing::debug!("{} skipped: {}", name, skip);
        }
    }

    Ok(())
}
