pub mod context;
pub mod result;
pub mod task;

pub use context::*;
pub use result::*;
pub use task::*;
