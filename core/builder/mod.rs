//! # The Future/Target execution engine
//!
//! There is no central work queue here: every build step is spawned as its
//! own task the moment it is wired up, and blocks on the [BuildFuture]s of
//! its predecessors. The dependency graph is the scheduler.
//!

mod build;
mod build_graph;
mod context;
mod error;
mod future;
mod statistics;
mod target;
mod target_cache;

pub use context::*;
pub use error::*;
pub use future::*;
pub use statistics::*;
pub use target::StepKind;

pub(crate) use build_graph::*;
pub(crate) use target::Target;
pub(crate) use target_cache::*;
