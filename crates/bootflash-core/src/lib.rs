//! bootflash-core - Boot-time flash and cache window driver
//!
//! This crate lets firmware running before any OS service exists read,
//! write, and erase the external SPI flash it is executing from. It is
//! `no_std` and talks to hardware only through the capability traits in
//! [`hal`], so the same code runs against real registers or an emulator.
//!
//! The crate is layered leaves-first:
//!
//! - [`protocol::executor`] - single address-less flash bus transactions
//! - [`protocol::unlock`] - vendor-specific status register unlock
//! - [`flash`] - the mapping window, aligned read/write, and erase batching
//!
//! # Features
//!
//! - `alloc` - Enable heap allocation
//! - `std` - Enable standard library support (includes `alloc`, `serde`
//!   and TOML configuration loading)
//! - `serde` - Deserialize configuration types
//!
//! # Example
//!
//! ```ignore
//! use bootflash_core::{BootFlash, CacheController, FlashBus, RomFlash};
//! use zerocopy::IntoBytes;
//!
//! fn read_header<B, R, C>(flash: &BootFlash<B, R, C>) -> bootflash_core::Result<[u32; 8]>
//! where
//!     B: FlashBus,
//!     R: RomFlash,
//!     C: CacheController,
//! {
//!     let mut header = [0u32; 8];
//!     flash.read(0x1_0000, header.as_mut_bytes(), true)?;
//!     Ok(header)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
pub mod error;
pub mod flash;
pub mod hal;
pub mod protocol;
pub mod spi;

pub use config::{FlashConfig, FlashGeometry};
pub use error::{ArgumentError, Error, Result};
pub use flash::{BootFlash, Mapping};
pub use hal::{CacheController, FlashBus, Relax, RomFlash, RomStatus, Target};
pub use protocol::{QuirkClass, UnlockOutcome, WrapMode};
