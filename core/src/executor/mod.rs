//! Interface execution engine.
//!
//! Every task runs the same per-attempt state machine, whether it is driven
//! synchronously or by the async worker pool:
//!
//! ```text
//! before_execute hooks
//!   ↓
//! resolve interface ──(not found)──→ UNKNOWN failure, no retry
//!   ↓
//! ┌→ acquire rate limit (blocking sleep / async sleep)
//! │    ↓
//! │  cache lookup ──(hit)──→ success, from_cache = true
//! │    ↓
//! │  invoke under timeout (thread pool / cooperative / soft)
//! │    ├─ Ok  → write cache → success
//! │    └─ Err → classify → on_error hooks (any false = veto)
//! │               ↓
//! └── backoff ←─ retryable and attempts left?  ──(no)──→ failure
//!   ↓
//! after_execute hooks (once, final result)
//! ```

mod backoff;
mod engine;
mod registry;
mod scheduler;
pub mod traits;
pub mod types;

pub use backoff::backoff_delay;
pub use engine::{InterfaceExecutor, InterfaceExecutorBuilder};
pub use registry::InterfaceRegistry;
pub use scheduler::ResultCallback;
pub use types::{
    BatchResult, CallResult, CallTask, ExecutionContext, ExecutionSummary, Params, ResultMetadata,
};
