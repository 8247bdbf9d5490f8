//! Flash controller user-command registers

use bootflash_core::hal::FlashBus;
use bootflash_core::spi::{opcodes, CtrlFlags, UserFlags, UserRegisters};

use crate::chip::ChipState;
use crate::{DummyChip, Op};

fn mask(value: u32, bits: u8) -> u32 {
    match bits {
        0 => 0,
        bits if bits >= 32 => value,
        bits => value & ((1u32 << bits) - 1),
    }
}

impl ChipState {
    fn run_command(&mut self) {
        let regs = self.user;
        let opcode = regs.command_value as u8;
        let mosi_bits = regs.mosi_bits();
        let mosi_data = mask(self.data_buf, mosi_bits);
        let addr_bits = if regs.user.contains(UserFlags::USR_ADDR) {
            regs.addr_bitlen + 1
        } else {
            0
        };

        self.ops.push(Op::Command {
            opcode,
            mosi_data,
            mosi_bits,
            miso_bits: regs.miso_bits(),
            addr_bits,
            dummy_cycles: regs.dummy_cycles(),
            ctrl: self.ctrl,
        });
        log::trace!("dummy: cmd 0x{:02X} data 0x{:X}/{}", opcode, mosi_data, mosi_bits);

        match opcode {
            opcodes::RDSR => self.data_buf = self.read_sr1() as u32,
            opcodes::RDSR2 => self.data_buf = self.sr2 as u32,
            opcodes::WREN => self.write_enabled = true,
            opcodes::WRDI => self.write_enabled = false,
            opcodes::WRSR if self.write_enabled => {
                self.sr1 = mosi_data as u8;
                if mosi_bits >= 16 {
                    self.sr2 = (mosi_data >> 8) as u8;
                }
                self.finish_status_write();
            }
            opcodes::WRSR2 if self.write_enabled => {
                self.sr2 = mosi_data as u8;
                self.finish_status_write();
            }
            opcodes::WRAP => self.wrap = Some((mosi_data >> 4) as u8),
            // Ignored without WEL, like the real chip
            opcodes::WRSR | opcodes::WRSR2 => {}
            other => log::warn!("dummy: unhandled command 0x{:02X}", other),
        }
    }

    fn finish_status_write(&mut self) {
        self.write_enabled = false;
        self.busy_left = self.config.busy_polls;
    }
}

impl FlashBus for DummyChip {
    fn ctrl(&self) -> CtrlFlags {
        self.state().ctrl
    }

    fn set_ctrl(&mut self, ctrl: CtrlFlags) {
        self.state_mut().ctrl = ctrl;
    }

    fn user(&self) -> UserRegisters {
        self.state().user
    }

    fn set_user(&mut self, regs: &UserRegisters) {
        self.state_mut().user = *regs;
    }

    fn set_addr(&mut self, addr: u32) {
        self.state_mut().addr = addr;
    }

    fn data(&self) -> u32 {
        self.state().data_buf
    }

    fn set_data(&mut self, word: u32) {
        self.state_mut().data_buf = word;
    }

    fn start(&mut self) {
        let mut state = self.state_mut();
        state.go_left = state.config.command_polls;
        state.run_command();
    }

    fn is_busy(&self) -> bool {
        let mut state = self.state_mut();
        if state.hung {
            return true;
        }
        if state.go_left > 0 {
            state.go_left -= 1;
            true
        } else {
            false
        }
    }

    fn extra_dummy_cycles(&self) -> u8 {
        self.state().config.extra_dummy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DummyConfig;
    use bootflash_core::protocol::executor::{read_status1, read_status2, write_enable};
    use bootflash_core::protocol::{CommandExecutor, Executor};
    use bootflash_core::spi::Transaction;
    use bootflash_core::hal::Spin;

    #[test]
    fn test_status_reads() {
        let mut chip = DummyChip::new(DummyConfig::chip(0xEF_40_18, 0x1C, 0x02));
        let mut exec = Executor::new(&mut chip, &Spin);
        assert_eq!(read_status1(&mut exec), 0x1C);
        assert_eq!(read_status2(&mut exec), 0x02);
    }

    #[test]
    fn test_wrsr_needs_wel() {
        let mut chip = DummyChip::new(DummyConfig::chip(0xEF_40_18, 0x1C, 0x02));
        let probe = chip.clone();
        let mut exec = Executor::new(&mut chip, &Spin);

        exec.execute(&Transaction::write_reg(opcodes::WRSR, 0, 16));
        assert_eq!(probe.status(), (0x1C, 0x02));

        write_enable(&mut exec);
        exec.execute(&Transaction::write_reg(opcodes::WRSR, 0x0200, 16));
        assert_eq!(probe.status(), (0x00, 0x02));
        assert!(!probe.is_write_enabled());
    }

    #[test]
    fn test_eight_bit_wrsr_keeps_sr2() {
        let mut chip = DummyChip::new(DummyConfig::chip(0xEF_40_18, 0x1C, 0x42));
        let probe = chip.clone();
        let mut exec = Executor::new(&mut chip, &Spin);
        write_enable(&mut exec);
        exec.execute(&Transaction::write_reg(opcodes::WRSR, 0, 8));
        assert_eq!(probe.status(), (0x00, 0x42));
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(0x1234_5678, 8), 0x78);
        assert_eq!(mask(0x1234_5678, 0), 0);
        assert_eq!(mask(0x1234_5678, 32), 0x1234_5678);
    }
}
