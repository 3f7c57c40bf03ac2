pub mod plugin;
pub mod resolver;
pub mod strategy;

pub use plugin::*;
pub use resolver::*;
pub use strategy::*;
