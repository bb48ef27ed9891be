//! CLI command handlers.

pub mod classify;
pub mod info;
pub mod invoke;

pub use classify::run_classify;
pub use info::run_info;
pub use invoke::{InvokeCommandInput, run_invoke};
