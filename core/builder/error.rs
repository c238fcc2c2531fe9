use crate::builder::StepKind;
use crate::resolver::ResolveError;
use crate::toolchain::ToolchainError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::*;

/// The outcome carried by every [BuildFuture](crate::BuildFuture).
///
/// Outcomes are broadcast to every dependent of a target, so this type is
/// `Clone`; non-clonable sources are shared behind an [Arc].
///
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    #[error("{step} {import_path:?}: {source}")]
    StepFailed {
        step: StepKind,
        import_path: String,
        #[source]
        source: Arc<ToolchainError>,
    },

    #[error("could not create directory {path:?}: {source}")]
    Mkdir {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("could not create working directory: {0}")]
    Workdir(#[source] Arc<std::io::Error>),

    #[error("import cycle detected: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error(transparent)]
    Resolve(#[from] Arc<ResolveError>),

    #[error(transparent)]
    Config(Arc<crate::config::ConfigError>),

    #[error("build target stopped without publishing a result")]
    AbandonedTarget,
}

impl BuildError {
    pub(crate) fn step_failed(
        step: StepKind,
        import_path: &str,
        source: ToolchainError,
    ) -> BuildError {
        BuildError::StepFailed {
            step,
            import_path: import_path.to_string(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn mkdir(path: &std::path::Path, source: std::io::Error) -> BuildError {
        BuildError::Mkdir {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }
}
