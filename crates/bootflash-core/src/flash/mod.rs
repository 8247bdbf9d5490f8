//! Mapped flash I/O
//!
//! [`BootFlash`] is the driver's public surface: aligned reads (plain or
//! through the decrypting window), aligned writes (plain or encrypted),
//! sector and range erase, and the single mmap window.

mod driver;
mod erase;
mod window;

pub use driver::{BootFlash, ENCRYPTED_ALIGN, WORD_ALIGN};
pub use erase::{ErasePlan, EraseStep};
pub use window::Mapping;
