//! SPI flash opcodes and status register bits used by the boot driver
//!
//! Only the status/control commands issued through the command executor
//! live here; data transfers go through the mask ROM.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any status register write
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit; also leaves OTP mode
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Write Status Register 1 (8 bits), or SR1+SR2 (16 bits) on most parts
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;

// ============================================================================
// Cache support
// ============================================================================

/// Set Burst With Wrap
pub const WRAP: u8 = 0x77;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 2: Quad Enable (when SR2 is written on its own)
pub const SR2_QE: u8 = 0x02;

/// ISSI block protect bits in SR1 (BP0-BP3 and SRWD)
pub const SR1_BP_MASK_ISSI: u8 = 0xBC;
/// Quad Enable position when SR1 and SR2 are written as one 16-bit value
pub const SR12_QE: u16 = 1 << 9;

// ============================================================================
// Vendor IDs used for quirk classification
// ============================================================================

/// ISSI manufacturer ID
pub const ISSI_ID: u8 = 0x9D;
/// GigaDevice manufacturer ID
pub const GD_ID: u8 = 0xC8;
/// GigaDevice GD25Q memory type
pub const GD_Q_MEMORY_TYPE: u8 = 0x40;
/// Smallest GD25Q capacity code with separate SR1/SR2 write commands
pub const GD_Q_MIN_CAPACITY: u8 = 0x16;
