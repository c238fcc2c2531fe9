mod build;
mod test;

pub use build::*;
pub use test::*;

pub(crate) use crate::flags::Flags;
