//! bootflash-dummy - In-memory flash emulator for testing
//!
//! This crate emulates everything `bootflash-core` sits on: a SPI NOR chip
//! with SR1/SR2 and block protection, the flash controller's user-command
//! registers, the mask ROM read/write/erase primitives, and the cache with
//! its MMU page table. It's useful for testing and development without
//! real hardware.
//!
//! A [`DummyChip`] is a cheap handle to shared state. Clone it three times
//! to hand the driver its bus, ROM and cache, and keep one to inspect the
//! contents and the [`Op`] log afterwards.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
mod bus;
#[cfg(feature = "alloc")]
mod cache;
#[cfg(feature = "alloc")]
mod chip;
#[cfg(feature = "alloc")]
mod rom;

#[cfg(feature = "alloc")]
pub use chip::DummyChip;

use bootflash_core::hal::{Autoload, CacheKind, MmuBus};
use bootflash_core::spi::CtrlFlags;

/// JEDEC IDs of a few chips from each unlock family
pub mod ids {
    /// Winbond W25Q128FV
    pub const WINBOND_W25Q128: u32 = 0xEF_40_18;
    /// GigaDevice GD25Q64
    pub const GD25Q64: u32 = 0xC8_40_17;
    /// GigaDevice GD25Q16 (too small for the GD-Q protocol)
    pub const GD25Q16: u32 = 0xC8_40_15;
    /// ISSI IS25LP064
    pub const ISSI_IS25LP064: u32 = 0x9D_60_17;
    /// XMC XM25QH32
    pub const XMC_XM25QH32: u32 = 0x20_40_16;
}

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// 24-bit JEDEC ID
    pub device_id: u32,
    /// Flash size in bytes
    pub size: usize,
    /// Sector size for the smallest erase
    pub sector_size: usize,
    /// Block size for the fast erase
    pub block_size: usize,
    /// Initial status register 1
    pub sr1: u8,
    /// Initial status register 2
    pub sr2: u8,
    /// Polls of the go bit before a command completes
    pub command_polls: u32,
    /// Idle polls the chip reports busy after a write or erase
    pub busy_polls: u32,
    /// Dummy cycles the bus reports for data-in phases
    pub extra_dummy: u8,
    /// Flash encryption key; `None` means encryption is off
    pub encryption_key: Option<u32>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            device_id: ids::WINBOND_W25Q128,
            size: 4 * 1024 * 1024,
            sector_size: 4096,
            block_size: 64 * 1024,
            sr1: 0,
            sr2: 0,
            command_polls: 2,
            busy_polls: 1,
            extra_dummy: 0,
            encryption_key: None,
        }
    }
}

impl DummyConfig {
    /// Default geometry with a specific chip and status registers
    pub fn chip(device_id: u32, sr1: u8, sr2: u8) -> Self {
        Self {
            device_id,
            sr1,
            sr2,
            ..Default::default()
        }
    }
}

/// One thing the driver did to the emulated hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// A user command clocked on the flash bus
    Command {
        /// Opcode
        opcode: u8,
        /// Outgoing data, masked to `mosi_bits`
        mosi_data: u32,
        /// Outgoing bit count
        mosi_bits: u8,
        /// Incoming bit count
        miso_bits: u8,
        /// Address bit count (0 when there is no address phase)
        addr_bits: u8,
        /// Dummy cycles before the data-in phase
        dummy_cycles: u8,
        /// CTRL register when the command started
        ctrl: CtrlFlags,
    },
    /// ROM idle poll
    PollIdle,
    /// ROM linear read
    Read {
        /// Flash address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// ROM linear write
    Write {
        /// Flash address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// ROM encrypted write
    WriteEncrypted {
        /// Flash address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// ROM sector erase
    EraseSector(u32),
    /// ROM block erase
    EraseBlock(u32),
    /// Cache suspended
    Suspend(CacheKind),
    /// Cache resumed
    Resume(CacheKind, Autoload),
    /// Cache invalidated
    Invalidate(CacheKind),
    /// MMU pages programmed
    MmuSet {
        /// MMU bus
        bus: MmuBus,
        /// Virtual address of the first page
        vaddr: u32,
        /// Flash address of the first page
        paddr: u32,
        /// Page count
        count: u32,
    },
    /// MMU table reset
    MmuInit,
}

impl Op {
    /// Opcode if this is a bus command
    pub fn opcode(&self) -> Option<u8> {
        match self {
            Op::Command { opcode, .. } => Some(*opcode),
            _ => None,
        }
    }

    /// Returns true for operations that change flash contents or status
    pub fn is_hardware_write(&self) -> bool {
        matches!(
            self,
            Op::Command { .. }
                | Op::Write { .. }
                | Op::WriteEncrypted { .. }
                | Op::EraseSector(_)
                | Op::EraseBlock(_)
        )
    }
}
