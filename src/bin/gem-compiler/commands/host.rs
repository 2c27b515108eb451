//! `gem-compiler host` command
//!
//! Prints what gem-compiler knows about the host Ruby.

use anyhow::Result;

use crate::cli::HostArgs;
use crate::commands::resolve_ruby;
use gem_compiler::core::RubyHost;
use gem_compiler::util::GlobalContext;

pub fn execute(args: HostArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let ruby = resolve_ruby(&ctx, args.ruby.as_deref())?;
    let host = RubyHost::probe(&ruby)?;

    println!("{}", host);
    Ok(())
}
