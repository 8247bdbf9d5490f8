//! Error types for bootflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Details about a rejected argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// Flash address is not aligned to the required boundary
    UnalignedAddress {
        /// Offending address
        addr: u32,
        /// Required alignment in bytes
        align: u32,
    },
    /// Length is not a multiple of the required boundary
    UnalignedLength {
        /// Offending length
        len: u32,
        /// Required alignment in bytes
        align: u32,
    },
    /// Caller buffer does not start on a 4-byte boundary
    UnalignedBuffer,
    /// Buffer is longer than the 32-bit flash address space
    BufferTooLong,
    /// Requested mapping does not fit in the mmap region
    MappingTooLarge {
        /// Requested size
        size: u32,
        /// Size of the mmap region
        max: u32,
    },
    /// Access falls outside a live mapping
    OutOfWindow {
        /// Offset into the mapping
        offset: u32,
        /// Length of the mapping
        len: u32,
    },
    /// Flash geometry is inconsistent (sizes not powers of two, or a block
    /// that is not a whole number of sectors)
    InvalidGeometry,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Misaligned address, length or buffer, or an impossible request
    InvalidArgument(ArgumentError),
    /// A mapping is already live; unmap it first
    AlreadyMapped,
    /// Programming the MMU page table reported a nonzero status
    RemapFailed(i32),
    /// The ROM flash primitive reported a failure
    DeviceOperationFailed,
    /// The ROM flash primitive timed out
    DeviceTimeout,
    /// The operation is not available on this target
    UnsupportedOperation,
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnalignedAddress { addr, align } => {
                write!(f, "address 0x{:08X} not {}-byte aligned", addr, align)
            }
            Self::UnalignedLength { len, align } => {
                write!(f, "length 0x{:X} not {}-byte aligned", len, align)
            }
            Self::UnalignedBuffer => write!(f, "buffer not 4-byte aligned"),
            Self::BufferTooLong => write!(f, "buffer exceeds flash address space"),
            Self::MappingTooLarge { size, max } => {
                write!(f, "mapping of 0x{:X} bytes exceeds window of 0x{:X}", size, max)
            }
            Self::OutOfWindow { offset, len } => {
                write!(f, "offset 0x{:X} outside mapping of 0x{:X} bytes", offset, len)
            }
            Self::InvalidGeometry => write!(f, "invalid flash geometry"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(detail) => write!(f, "invalid argument: {}", detail),
            Self::AlreadyMapped => write!(f, "flash window already mapped"),
            Self::RemapFailed(code) => write!(f, "MMU remap failed with status {}", code),
            Self::DeviceOperationFailed => write!(f, "flash operation failed"),
            Self::DeviceTimeout => write!(f, "flash operation timed out"),
            Self::UnsupportedOperation => write!(f, "operation not supported on this target"),
        }
    }
}

impl From<ArgumentError> for Error {
    fn from(detail: ArgumentError) -> Self {
        Error::InvalidArgument(detail)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
