pub mod classify;
pub mod executor;

pub use classify::{ErrorClassifier, ErrorKind};
pub use executor::{ExecutorError, SourceError};
