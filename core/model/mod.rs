mod goal;
mod package;
mod task;

pub use goal::*;
pub use package::*;
pub use task::*;
