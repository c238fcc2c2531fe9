//! External toolchain collaborators.
//!
//! Every build target bottoms out in exactly one of these operations. They
//! are deliberately dumb: paths and flags in, success or failure out. The
//! engine never interprets their output beyond pass/fail.
//!

mod gc;

pub use gc::*;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::*;
use tokio::process::Command;
use tracing::*;

/// A standardised set of command line tools used to build Go programs.
///
#[async_trait]
pub trait Toolchain: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Compile `go_files` into the object file `out_file`, resolving imported
    /// archives through `search_paths`.
    async fn compile(
        &self,
        import_path: &str,
        src_dir: &Path,
        out_file: &Path,
        go_files: &[String],
        search_paths: &[PathBuf],
    ) -> Result<(), ToolchainError>;

    /// Assemble one `.s` file into `out_file`.
    async fn assemble(
        &self,
        src_dir: &Path,
        out_file: &Path,
        s_file: &str,
    ) -> Result<(), ToolchainError>;

    /// Compile one C file into `out_file`.
    async fn cc(
        &self,
        src_dir: &Path,
        obj_dir: &Path,
        out_file: &Path,
        c_file: &Path,
    ) -> Result<(), ToolchainError>;

    /// Run the cgo preprocessor over a package's cgo sources.
    async fn cgo(&self, src_dir: &Path, args: &[String]) -> Result<(), ToolchainError>;

    /// Pack object files, in order, into the archive `archive_file`.
    async fn pack(
        &self,
        archive_file: &Path,
        obj_files: &[PathBuf],
    ) -> Result<(), ToolchainError>;

    /// Link a package archive into the executable `out_file`. `ldflags`
    /// carries the accumulated `#cgo LDFLAGS` of the package and its
    /// transitive imports.
    async fn link(
        &self,
        out_file: &Path,
        archive_file: &Path,
        search_paths: &[PathBuf],
        ldflags: &[String],
    ) -> Result<(), ToolchainError>;
}

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("could not spawn {tool:?}: {source}")]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool:?} exited with {status}:\n{output}")]
    ToolFailed {
        tool: PathBuf,
        status: std::process::ExitStatus,
        output: String,
    },

    /// A failure injected by a scripted test toolchain.
    #[error("{0}")]
    Scripted(String),
}

/// Run `command` in `dir`, capturing combined output. Non-zero exit becomes a
/// [ToolchainError::ToolFailed] carrying everything the tool printed.
///
/// The wait is async, so a running tool only occupies its own task: steps on
/// sibling branches of the graph keep making progress even on a
/// single-threaded runtime.
///
pub(crate) async fn run(dir: &Path, command: &Path, args: &[String]) -> Result<(), ToolchainError> {
    debug!("cd {}; {} {}", dir.display(), command.display(), args.join(" "));
    let output = Command::new(command)
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|source| ToolchainError::Spawn {
            tool: command.to_path_buf(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    error!("{} failed:\n{}", command.display(), combined);

    Err(ToolchainError::ToolFailed {
        tool: command.to_path_buf(),
        status: output.status,
        output: combined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawning_a_missing_tool_is_an_error() {
        let err = run(
            Path::new("."),
            Path::new("/does/not/exist/6g"),
            &["-o".to_string(), "x.6".to_string()],
        )
        .await
        .unwrap_err();
        assert_matches!(err, ToolchainError::Spawn { .. });
    }

    #[tokio::test]
    async fn a_nonzero_exit_captures_output() {
        let err = run(
            Path::new("."),
            Path::new("/bin/sh"),
            &["-c".to_string(), "echo oops; exit 1".to_string()],
        )
        .await
        .unwrap_err();
        assert_matches!(err, ToolchainError::ToolFailed { ref output, .. } if output.contains("oops"));
    }
}
