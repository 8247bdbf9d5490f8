//! Mask ROM flash primitives

use bootflash_core::hal::{RomFlash, RomStatus};

use crate::chip::ChipState;
use crate::{DummyChip, Op};

impl ChipState {
    fn program(&mut self, addr: u32, src: &[u32], key: Option<u32>) -> RomStatus {
        if self.rom_timeout {
            return RomStatus::Timeout;
        }
        let Some(range) = self.span(addr, src.len() * 4) else {
            return RomStatus::Err;
        };
        if self.is_protected() {
            log::debug!("dummy: write at 0x{:X} blocked by protect bits", addr);
            return RomStatus::Err;
        }

        // Flash programming: can only change 1 -> 0
        for (chunk, word) in self.data[range].chunks_exact_mut(4).zip(src) {
            let stored = word ^ key.unwrap_or(0);
            for (byte, new) in chunk.iter_mut().zip(stored.to_le_bytes()) {
                *byte &= new;
            }
        }
        self.busy_left = self.config.busy_polls;
        RomStatus::Ok
    }

    fn erase(&mut self, addr: u32, size: usize) -> RomStatus {
        if self.rom_timeout {
            return RomStatus::Timeout;
        }
        let Some(range) = self.span(addr, size) else {
            return RomStatus::Err;
        };
        if self.is_protected() {
            log::debug!("dummy: erase at 0x{:X} blocked by protect bits", addr);
            return RomStatus::Err;
        }
        if let Some(bad) = self.fail_erase_at {
            if range.contains(&(bad as usize)) {
                return RomStatus::Err;
            }
        }

        self.data[range].fill(0xFF);
        self.busy_left = self.config.busy_polls;
        RomStatus::Ok
    }
}

impl RomFlash for DummyChip {
    fn device_id(&self) -> u32 {
        self.state().config.device_id
    }

    fn poll_idle(&mut self) -> bool {
        let mut state = self.state_mut();
        state.ops.push(Op::PollIdle);
        if state.hung {
            return false;
        }
        if state.busy_left > 0 {
            state.busy_left -= 1;
            false
        } else {
            true
        }
    }

    fn read(&mut self, addr: u32, dest: &mut [u32]) -> RomStatus {
        let mut state = self.state_mut();
        let len = dest.len() * 4;
        state.ops.push(Op::Read {
            addr,
            len: len as u32,
        });
        let Some(range) = state.span(addr, len) else {
            return RomStatus::Err;
        };
        for (word, chunk) in dest.iter_mut().zip(state.data[range].chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        RomStatus::Ok
    }

    fn write(&mut self, addr: u32, src: &[u32]) -> RomStatus {
        let mut state = self.state_mut();
        state.ops.push(Op::Write {
            addr,
            len: (src.len() * 4) as u32,
        });
        state.program(addr, src, None)
    }

    fn write_encrypted(&mut self, addr: u32, src: &[u32]) -> RomStatus {
        let mut state = self.state_mut();
        state.ops.push(Op::WriteEncrypted {
            addr,
            len: (src.len() * 4) as u32,
        });
        let key = state.config.encryption_key;
        state.program(addr, src, key)
    }

    fn erase_sector(&mut self, sector: u32) -> RomStatus {
        let mut state = self.state_mut();
        state.ops.push(Op::EraseSector(sector));
        let size = state.config.sector_size;
        match sector.checked_mul(size as u32) {
            Some(addr) => state.erase(addr, size),
            None => RomStatus::Err,
        }
    }

    fn erase_block(&mut self, block: u32) -> RomStatus {
        let mut state = self.state_mut();
        state.ops.push(Op::EraseBlock(block));
        let size = state.config.block_size;
        match block.checked_mul(size as u32) {
            Some(addr) => state.erase(addr, size),
            None => RomStatus::Err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DummyConfig;

    #[test]
    fn test_program_only_clears_bits() {
        let mut chip = DummyChip::new_default();
        assert_eq!(chip.write(0x100, &[0x0F0F_0F0F]), RomStatus::Ok);
        assert_eq!(chip.write(0x100, &[0xFF00_FF00]), RomStatus::Ok);
        assert_eq!(chip.contents_at(0x100, 4), [0x00, 0x0F, 0x00, 0x0F]);
    }

    #[test]
    fn test_out_of_range() {
        let mut chip = DummyChip::new_default();
        let mut buf = [0u32; 2];
        assert_eq!(chip.read(0x3F_FFFC, &mut buf), RomStatus::Err);
        assert_eq!(chip.erase_sector(1024), RomStatus::Err);
        assert_eq!(chip.erase_block(63), RomStatus::Ok);
        assert_eq!(chip.erase_sector(0x10_0000), RomStatus::Err);
        assert_eq!(chip.erase_block(u32::MAX), RomStatus::Err);
    }

    #[test]
    fn test_protect_bits_block_erase() {
        let mut chip = DummyChip::new(DummyConfig::chip(0xEF_40_18, 0x1C, 0));
        assert_eq!(chip.erase_sector(0), RomStatus::Err);
        assert_eq!(chip.write(0, &[0]), RomStatus::Err);
    }

    #[test]
    fn test_timeout_injection() {
        let mut chip = DummyChip::new_default();
        chip.set_rom_timeout(true);
        assert_eq!(chip.write(0, &[0]), RomStatus::Timeout);
        assert_eq!(chip.erase_sector(0), RomStatus::Timeout);
        assert_eq!(chip.contents_at(0, 4), [0xFF; 4]);
    }

    #[test]
    fn test_busy_after_erase() {
        let mut chip = DummyChip::new_default();
        assert_eq!(chip.erase_sector(0), RomStatus::Ok);
        assert!(!chip.poll_idle());
        assert!(chip.poll_idle());
    }
}
