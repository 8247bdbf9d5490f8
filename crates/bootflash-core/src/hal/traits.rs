//! Capability traits for the hardware the driver sits on
//!
//! The driver never touches registers or ROM entry points directly. A
//! backend provides three capabilities:
//!
//! - [`FlashBus`] - the flash controller's user-command registers
//! - [`RomFlash`] - the mask ROM's linear read/write/erase primitives
//! - [`CacheController`] - cache liveness and MMU page programming
//!
//! A real backend implements these with volatile register accesses and
//! `extern "C"` ROM calls; `bootflash-dummy` implements them in memory.

use crate::error::{Error, Result};
use crate::hal::target::{CacheKind, MmuBus};
use crate::spi::{CtrlFlags, UserRegisters};

/// Flash controller transaction registers
///
/// Each method corresponds to one register access. The executor sequences
/// them; implementations must not reorder or batch the writes.
pub trait FlashBus {
    /// Read the CTRL register
    fn ctrl(&self) -> CtrlFlags;

    /// Write the CTRL register
    fn set_ctrl(&mut self, ctrl: CtrlFlags);

    /// Read back the user-command register group
    fn user(&self) -> UserRegisters;

    /// Write the user-command register group
    fn set_user(&mut self, regs: &UserRegisters);

    /// Write the ADDR register
    fn set_addr(&mut self, addr: u32);

    /// Read the first word of the data buffer
    fn data(&self) -> u32;

    /// Write the first word of the data buffer
    fn set_data(&mut self, word: u32);

    /// Set the user-command go bit
    fn start(&mut self);

    /// Returns true while the go bit is still set
    fn is_busy(&self) -> bool;

    /// Dummy cycles the bus needs before a data-in phase
    ///
    /// Non-zero when the flash pins go through the GPIO matrix instead of
    /// the dedicated IO_MUX pins.
    fn extra_dummy_cycles(&self) -> u8 {
        0
    }
}

/// Result code of a mask ROM flash primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomStatus {
    /// Operation completed
    Ok,
    /// Operation failed
    Err,
    /// Operation timed out
    Timeout,
}

impl RomStatus {
    /// Translate into the crate error taxonomy
    pub fn into_result(self) -> Result<()> {
        match self {
            RomStatus::Ok => Ok(()),
            RomStatus::Err => Err(Error::DeviceOperationFailed),
            RomStatus::Timeout => Err(Error::DeviceTimeout),
        }
    }
}

/// Mask ROM flash primitives
///
/// Buffers are word slices; the caller guarantees alignment.
pub trait RomFlash {
    /// 24-bit JEDEC ID of the attached chip (manufacturer in bits 23..16)
    fn device_id(&self) -> u32;

    /// Poll the chip once; returns true when no write/erase is in progress
    fn poll_idle(&mut self) -> bool;

    /// Linear read without decryption
    fn read(&mut self, addr: u32, dest: &mut [u32]) -> RomStatus;

    /// Linear write without encryption
    fn write(&mut self, addr: u32, src: &[u32]) -> RomStatus;

    /// Write through the flash encryption engine (32-byte blocks)
    fn write_encrypted(&mut self, addr: u32, src: &[u32]) -> RomStatus;

    /// Erase one sector by index
    fn erase_sector(&mut self, sector: u32) -> RomStatus;

    /// Erase one block by index
    fn erase_block(&mut self, block: u32) -> RomStatus;
}

/// Opaque cache autoload state returned by a suspend
///
/// Must be handed back unchanged to the matching resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autoload(pub u32);

/// Cache and MMU control
pub trait CacheController {
    /// Stop the cache from fetching; returns the autoload state to restore
    fn suspend(&mut self, cache: CacheKind) -> Autoload;

    /// Let the cache fetch again
    fn resume(&mut self, cache: CacheKind, autoload: Autoload);

    /// Drop every cached line
    fn invalidate_all(&mut self, cache: CacheKind);

    /// Map `count` 64 KiB flash pages starting at `paddr` to `vaddr`
    ///
    /// Returns the ROM status code; zero means success.
    fn mmu_set(&mut self, bus: MmuBus, vaddr: u32, paddr: u32, count: u32) -> i32;

    /// Reset the MMU table to its power-on state
    fn mmu_init(&mut self);

    /// Load one word through a mapped virtual address
    ///
    /// This is where inline flash decryption applies.
    fn load_word(&self, vaddr: u32) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_status_mapping() {
        assert_eq!(RomStatus::Ok.into_result(), Ok(()));
        assert_eq!(RomStatus::Err.into_result(), Err(Error::DeviceOperationFailed));
        assert_eq!(RomStatus::Timeout.into_result(), Err(Error::DeviceTimeout));
    }
}
