//! Sandbox: guarded, time-boxed execution of a single file.
//!
//! # Modules
//!
//! - [`result`]: `ExecutionStatus` / `ExecutionResult`
//! - [`interpreter`]: `InterpreterTable` (extension to argv)
//! - [`executor`]: `SandboxedExecutor::run_file_safe()`

pub mod executor;
pub mod interpreter;
pub mod result;

pub use executor::SandboxedExecutor;
pub use interpreter::InterpreterTable;
pub use result::{ExecutionResult, ExecutionStatus};
