//! # The Gale build engine
//!
//! Gale builds Go-style package trees with a gc-suite toolchain. The flow
//! begins by creating a [Config] and using it to open a [BuildContext]. From
//! there, every package handed to [BuildContext::build] is turned into a
//! pipeline of concurrently executing build targets, each memoized behind a
//! [BuildFuture] so that a package shared by many dependents is compiled
//! exactly once per invocation.
//!
//! The dependency graph itself is the scheduler: a target suspends on the
//! futures of its predecessors and runs its single toolchain operation once
//! they have all succeeded.
//!

pub(crate) mod builder;
pub(crate) mod config;
pub(crate) mod model;
pub mod resolver;
pub mod testing;
pub mod toolchain;

pub use builder::{Artifact, BuildContext, BuildError, BuildFuture, BuildResult, StepKind};
pub use config::*;
pub use model::{Goal, Package, PackageBuilder, PackageBuilderError, PackageKind, Task};

#[macro_use]
extern crate derive_builder;

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
