mod manager;
mod queue;

pub use manager::TaskManager;
pub use queue::TaskQueue;
