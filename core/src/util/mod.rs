mod panic;

pub use panic::{catch_panic, panic_message};
