//! Erase batching
//!
//! An erase range is walked in sector indices. Wherever a whole block
//! fits, one block erase replaces a run of sector erases.

use crate::config::FlashGeometry;
use crate::error::{ArgumentError, Result};

/// One hardware erase operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseStep {
    /// Erase the sector with this index
    Sector(u32),
    /// Erase the block with this index
    Block(u32),
}

impl EraseStep {
    /// Flash address of the first byte this step erases
    pub fn addr(&self, geometry: &FlashGeometry) -> u32 {
        match *self {
            EraseStep::Sector(sector) => sector * geometry.sector_size,
            EraseStep::Block(block) => block * geometry.block_size,
        }
    }
}

/// Iterator over the erase steps that cover a sector range
///
/// Steps are yielded in ascending address order.
#[derive(Debug, Clone)]
pub struct ErasePlan {
    next: u32,
    end: u32,
    sectors_per_block: u32,
}

impl ErasePlan {
    /// Plan an erase of `[addr, addr + len)`
    ///
    /// Both values must be sector-aligned; an unaligned start and an
    /// unaligned length are reported separately. The geometry is validated
    /// first.
    pub fn new(geometry: &FlashGeometry, addr: u32, len: u32) -> Result<Self> {
        geometry.validate()?;
        if !geometry.is_sector_aligned(addr) {
            return Err(ArgumentError::UnalignedAddress {
                addr,
                align: geometry.sector_size,
            }
            .into());
        }
        if !geometry.is_sector_aligned(len) {
            return Err(ArgumentError::UnalignedLength {
                len,
                align: geometry.sector_size,
            }
            .into());
        }

        let start = addr / geometry.sector_size;
        Ok(Self {
            next: start,
            end: start + len / geometry.sector_size,
            sectors_per_block: geometry.sectors_per_block(),
        })
    }

    /// Returns true if nothing is left to erase
    pub fn is_empty(&self) -> bool {
        self.next >= self.end
    }
}

impl Iterator for ErasePlan {
    type Item = EraseStep;

    fn next(&mut self) -> Option<EraseStep> {
        if self.is_empty() {
            return None;
        }

        let sector = self.next;
        if sector % self.sectors_per_block == 0 && self.end - sector >= self.sectors_per_block {
            self.next += self.sectors_per_block;
            Some(EraseStep::Block(sector / self.sectors_per_block))
        } else {
            self.next += 1;
            Some(EraseStep::Sector(sector))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::vec::Vec;

    fn plan(addr: u32, len: u32) -> Vec<EraseStep> {
        ErasePlan::new(&FlashGeometry::default(), addr, len)
            .unwrap()
            .collect()
    }

    #[test]
    fn test_two_blocks_and_three_sectors() {
        assert_eq!(
            plan(0x2_0000, 0x2_3000),
            [
                EraseStep::Block(2),
                EraseStep::Block(3),
                EraseStep::Sector(0x40),
                EraseStep::Sector(0x41),
                EraseStep::Sector(0x42),
            ]
        );
    }

    #[test]
    fn test_unaligned_start_uses_sectors_until_boundary() {
        let steps = plan(0xE000, 0x1_3000);
        assert_eq!(
            steps,
            [
                EraseStep::Sector(0xE),
                EraseStep::Sector(0xF),
                EraseStep::Block(1),
                EraseStep::Sector(0x20),
            ]
        );
    }

    #[test]
    fn test_short_range_inside_block() {
        assert_eq!(
            plan(0x1_0000, 0x2000),
            [EraseStep::Sector(0x10), EraseStep::Sector(0x11)]
        );
    }

    #[test]
    fn test_empty_range() {
        assert!(plan(0x1000, 0).is_empty());
    }

    #[test]
    fn test_alignment_errors_are_distinct() {
        let geometry = FlashGeometry::default();
        assert_eq!(
            ErasePlan::new(&geometry, 0x1001, 0x1000).unwrap_err(),
            Error::InvalidArgument(ArgumentError::UnalignedAddress {
                addr: 0x1001,
                align: 0x1000
            })
        );
        assert_eq!(
            ErasePlan::new(&geometry, 0x1000, 0x800).unwrap_err(),
            Error::InvalidArgument(ArgumentError::UnalignedLength {
                len: 0x800,
                align: 0x1000
            })
        );
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let err = Err(Error::InvalidArgument(ArgumentError::InvalidGeometry));
        let small_block = FlashGeometry {
            size: 0x40_0000,
            sector_size: 0x1000,
            block_size: 0x800,
        };
        assert_eq!(ErasePlan::new(&small_block, 0x1000, 0x1000).map(|_| ()), err);

        let no_sector = FlashGeometry {
            sector_size: 0,
            ..FlashGeometry::default()
        };
        assert_eq!(ErasePlan::new(&no_sector, 0, 0x1000).map(|_| ()), err);
    }

    #[test]
    fn test_step_addresses() {
        let geometry = FlashGeometry::default();
        assert_eq!(EraseStep::Block(3).addr(&geometry), 0x3_0000);
        assert_eq!(EraseStep::Sector(3).addr(&geometry), 0x3000);
    }
}
