//! # Package resolution
//!
//! Turning import paths into [Package](crate::Package) values. The build
//! engine itself never touches source trees; everything it knows about a
//! package comes through a [PackageResolver].

mod fs_resolver;

pub use fs_resolver::*;

use crate::model::Package;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::*;

/// Where packages come from. Implementations are expected to memoize: the
/// same import path must yield the same [Arc<Package>] for the lifetime of
/// the resolver, since build deduplication keys on package identity.
///
pub trait PackageResolver: Send + Sync + std::fmt::Debug {
    fn resolve(&self, import_path: &str) -> Result<Arc<Package>, ResolveError>;
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("package {import_path:?} not found under {searched:?}")]
    PackageNotFound {
        import_path: String,
        searched: PathBuf,
    },

    #[error("package {import_path:?} has no buildable Go sources")]
    NoGoSources { import_path: String },

    #[error("package {import_path:?} declares conflicting package names: {names:?}")]
    ConflictingPackageNames {
        import_path: String,
        names: Vec<String>,
    },

    #[error("{file:?}: blank import path")]
    BlankImportPath { file: PathBuf },

    #[error("{file:?}: use of cgo in test not supported")]
    CgoInTest { file: PathBuf },

    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
