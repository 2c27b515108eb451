//! CMake adapter for extensions shipped as CMake projects.

use std::path::{Path, PathBuf};

use crate::builder::{BuildFailure, BuildLog, ExtensionContext};
use crate::util::config::ToolchainSettings;
use crate::util::process::{find_cmake, ProcessBuilder};

pub fn handles(file_name: &str) -> bool {
    file_name == "CMakeLists.txt"
}

/// Configure, build and install the project found next to `CMakeLists.txt`.
pub fn build(
    _entry: &Path,
    ctx: &ExtensionContext<'_>,
    settings: &ToolchainSettings,
    log: &mut BuildLog,
) -> Result<(), BuildFailure> {
    let Some(cmake) = find_cmake(settings.cmake.as_deref()) else {
        log.note(
            "CMake not found\n\
             \n\
             CMake is required to build this extension.\n\
             Install CMake and ensure it's in your PATH.",
        );
        return Err(log.failure());
    };

    let builder = CMakeBuilder::new(cmake, ctx, settings.jobs);
    log.run(builder.configure(), &ctx.ext_dir)?;
    log.run(builder.compile(), &ctx.ext_dir)?;
    log.run(builder.install(), &ctx.ext_dir)
}

/// Command lines for the three CMake steps.
struct CMakeBuilder {
    cmake: PathBuf,
    build_dir: PathBuf,
    install_prefix: PathBuf,
    jobs: Option<usize>,
}

impl CMakeBuilder {
    fn new(cmake: PathBuf, ctx: &ExtensionContext<'_>, jobs: Option<usize>) -> Self {
        CMakeBuilder {
            cmake,
            build_dir: PathBuf::from("build"),
            install_prefix: ctx.dest_dir.clone(),
            jobs,
        }
    }

    fn configure(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.cmake)
            // Source directory
            .arg("-S")
            .arg(".")
            // Build directory
            .arg("-B")
            .arg(&self.build_dir)
            // Install prefix
            .arg(format!(
                "-DCMAKE_INSTALL_PREFIX={}",
                self.install_prefix.display()
            ))
            .arg("-DCMAKE_BUILD_TYPE=Release")
            // Position independent code
            .arg("-DCMAKE_POSITION_INDEPENDENT_CODE=ON")
    }

    fn compile(&self) -> ProcessBuilder {
        let cmd = ProcessBuilder::new(&self.cmake)
            .arg("--build")
            .arg(&self.build_dir)
            // Multi-config generators like Visual Studio
            .arg("--config")
            .arg("Release")
            .arg("--parallel");

        match self.jobs {
            Some(jobs) => cmd.arg(jobs.to_string()),
            None => cmd,
        }
    }

    fn install(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.cmake)
            .arg("--install")
            .arg(&self.build_dir)
            .arg("--config")
            .arg("Release")
    }
}
