//! Turn the source specification into a binary one for the host.

use crate::core::platform::RubyHost;
use crate::core::spec::GemSpec;
use crate::core::version::{Constraint, GemVersion, Op, Requirement, VersionError};
use crate::ops::compile::AbiLock;

/// Clear the extensions, set the host platform and apply the ABI lock.
pub fn rewrite(spec: &mut GemSpec, host: &RubyHost, abi_lock: AbiLock) -> Result<(), VersionError> {
    spec.extensions.clear();
    spec.platform = host.platform.clone();

    let locked = match abi_lock {
        AbiLock::Ruby => GemVersion::parse(&host.abi_version)?,
        AbiLock::Strict => GemVersion::parse(&format!(
            "{}.{}.{}.0",
            host.major, host.minor, host.teeny
        ))?,
        AbiLock::None => return Ok(()),
    };

    spec.required_ruby_version =
        Requirement::from_constraints(vec![Constraint::new(Op::Pessimistic, locked)]);
    Ok(())
}
