//! SPI types and transaction structures
//!
//! This module provides the transaction descriptor used by the command
//! executor, the controller register images it programs, and the opcodes
//! the unlock protocol needs.

pub mod opcodes;
mod transaction;

pub use opcodes::*;
pub use transaction::{CtrlFlags, Transaction, UserFlags, UserRegisters};
