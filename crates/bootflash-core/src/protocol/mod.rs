//! Flash command protocols
//!
//! This module contains the single-transaction command executor and the
//! vendor-specific status register unlock built on top of it.

pub mod executor;
pub mod unlock;

pub use executor::{wait_idle, CommandExecutor, Executor, WrapMode};
pub use unlock::{unlock, QuirkClass, StatusWrite, UnlockOutcome};
