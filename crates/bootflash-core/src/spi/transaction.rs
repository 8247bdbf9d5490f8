//! Flash bus transaction descriptor and controller register images

use bitflags::bitflags;

bitflags! {
    /// Flash controller CTRL register bits touched by the executor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CtrlFlags: u32 {
        /// Dual I/O command phase
        const FCMD_DUAL = 1 << 7;
        /// Quad I/O command phase
        const FCMD_QUAD = 1 << 8;
        /// Fast read with dual output
        const FREAD_DUAL = 1 << 14;
        /// Fast read with quad output
        const FREAD_QUAD = 1 << 20;
        /// Drive WP high while idle
        const WP_REG = 1 << 21;
        /// Fast read with quad I/O
        const FREAD_QIO = 1 << 24;
        /// Fast read with dual I/O
        const FREAD_DIO = 1 << 23;
    }
}

bitflags! {
    /// Flash controller USER register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UserFlags: u32 {
        /// Write data phase in dual output mode
        const FWRITE_DUAL = 1 << 12;
        /// Write data phase in quad output mode
        const FWRITE_QUAD = 1 << 13;
        /// Write address and data in dual I/O mode
        const FWRITE_DIO = 1 << 14;
        /// Write address and data in quad I/O mode
        const FWRITE_QIO = 1 << 15;
        /// Data-out (MOSI) phase enabled
        const USR_MOSI = 1 << 27;
        /// Data-in (MISO) phase enabled
        const USR_MISO = 1 << 28;
        /// Dummy phase enabled
        const USR_DUMMY = 1 << 29;
        /// Address phase enabled
        const USR_ADDR = 1 << 30;
        /// Command phase enabled
        const USR_COMMAND = 1 << 31;

        /// Every phase-enable bit
        const PHASES = Self::USR_MOSI.bits()
            | Self::USR_MISO.bits()
            | Self::USR_DUMMY.bits()
            | Self::USR_ADDR.bits()
            | Self::USR_COMMAND.bits();
    }
}

impl Default for CtrlFlags {
    fn default() -> Self {
        CtrlFlags::empty()
    }
}

impl Default for UserFlags {
    fn default() -> Self {
        UserFlags::empty()
    }
}

/// Image of the user-command register group
///
/// Bit lengths are stored the way the hardware wants them: one less than
/// the number of bits, with the matching `USR_*` flag gating the phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserRegisters {
    /// USER register
    pub user: UserFlags,
    /// USER1: dummy cycle length minus one
    pub dummy_cyclelen: u8,
    /// USER1: address bit length minus one
    pub addr_bitlen: u8,
    /// USER2: command bit length minus one
    pub command_bitlen: u8,
    /// USER2: command value
    pub command_value: u16,
    /// MOSI_DLEN: outgoing bit length minus one
    pub mosi_bitlen: u16,
    /// MISO_DLEN: incoming bit length minus one
    pub miso_bitlen: u16,
}

impl UserRegisters {
    /// Number of outgoing data bits this image will clock
    pub fn mosi_bits(&self) -> u8 {
        if self.user.contains(UserFlags::USR_MOSI) {
            self.mosi_bitlen as u8 + 1
        } else {
            0
        }
    }

    /// Number of incoming data bits this image will clock
    pub fn miso_bits(&self) -> u8 {
        if self.user.contains(UserFlags::USR_MISO) {
            self.miso_bitlen as u8 + 1
        } else {
            0
        }
    }

    /// Number of dummy cycles between the command and the data phases
    pub fn dummy_cycles(&self) -> u8 {
        if self.user.contains(UserFlags::USR_DUMMY) {
            self.dummy_cyclelen + 1
        } else {
            0
        }
    }
}

/// One address-less status/control transaction
///
/// Lives only for the duration of a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// The opcode byte
    pub command: u8,
    /// Outgoing bits, LSB first in the data buffer
    pub mosi_data: u32,
    /// Number of outgoing bits (0 = no data-out phase)
    pub mosi_bits: u8,
    /// Number of incoming bits (0 = no data-in phase)
    pub miso_bits: u8,
}

impl Transaction {
    /// A command with no data phases (e.g. WREN, WRDI)
    pub fn simple(command: u8) -> Self {
        Self {
            command,
            mosi_data: 0,
            mosi_bits: 0,
            miso_bits: 0,
        }
    }

    /// A register read of `bits` bits (e.g. RDSR)
    pub fn read_reg(command: u8, bits: u8) -> Self {
        Self {
            command,
            mosi_data: 0,
            mosi_bits: 0,
            miso_bits: bits,
        }
    }

    /// A register write of the low `bits` bits of `value` (e.g. WRSR)
    pub fn write_reg(command: u8, value: u32, bits: u8) -> Self {
        Self {
            command,
            mosi_data: value,
            mosi_bits: bits,
            miso_bits: 0,
        }
    }

    /// Returns true if this transaction has a data-in phase
    pub fn has_read(&self) -> bool {
        self.miso_bits > 0
    }

    /// Returns true if this transaction has a data-out phase
    pub fn has_write(&self) -> bool {
        self.mosi_bits > 0
    }

    /// Build the user register image for this transaction
    ///
    /// `extra_dummy` is the number of dummy cycles the bus needs before a
    /// data-in phase; it is only applied when this transaction reads.
    pub fn user_registers(&self, extra_dummy: u8) -> UserRegisters {
        self.apply(&UserRegisters::default(), extra_dummy)
    }

    /// Build the image on top of `base`, keeping its non-phase bits
    ///
    /// Write-mode bits such as `FWRITE_QIO` belong to whoever configured
    /// the controller last and are carried through untouched.
    pub fn apply(&self, base: &UserRegisters, extra_dummy: u8) -> UserRegisters {
        let mut user = (base.user & !UserFlags::PHASES) | UserFlags::USR_COMMAND;
        if self.has_read() {
            user |= UserFlags::USR_MISO;
        }
        if self.has_write() {
            user |= UserFlags::USR_MOSI;
        }

        let dummy = if self.has_read() { extra_dummy } else { 0 };
        if dummy > 0 {
            user |= UserFlags::USR_DUMMY;
        }

        UserRegisters {
            user,
            dummy_cyclelen: dummy.saturating_sub(1),
            addr_bitlen: base.addr_bitlen,
            command_bitlen: 7,
            command_value: self.command as u16,
            mosi_bitlen: self.mosi_bits.saturating_sub(1) as u16,
            miso_bitlen: self.miso_bits.saturating_sub(1) as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    #[test]
    fn test_read_reg_encoding() {
        let regs = Transaction::read_reg(opcodes::RDSR, 8).user_registers(0);
        assert_eq!(regs.user, UserFlags::USR_COMMAND | UserFlags::USR_MISO);
        assert_eq!(regs.command_bitlen, 7);
        assert_eq!(regs.command_value, 0x05);
        assert_eq!(regs.miso_bitlen, 7);
        assert_eq!(regs.miso_bits(), 8);
        assert_eq!(regs.mosi_bits(), 0);
        assert_eq!(regs.dummy_cycles(), 0);
    }

    #[test]
    fn test_write_reg_encoding() {
        let regs = Transaction::write_reg(opcodes::WRSR, 0x0200, 16).user_registers(2);
        assert_eq!(regs.user, UserFlags::USR_COMMAND | UserFlags::USR_MOSI);
        assert_eq!(regs.mosi_bitlen, 15);
        assert_eq!(regs.mosi_bits(), 16);
        // Extra dummy cycles only precede a read phase
        assert_eq!(regs.dummy_cycles(), 0);
    }

    #[test]
    fn test_extra_dummy_on_read() {
        let regs = Transaction::read_reg(opcodes::RDSR2, 8).user_registers(1);
        assert!(regs.user.contains(UserFlags::USR_DUMMY));
        assert_eq!(regs.dummy_cyclelen, 0);
        assert_eq!(regs.dummy_cycles(), 1);
    }

    #[test]
    fn test_apply_keeps_write_mode_bits() {
        let base = UserRegisters {
            user: UserFlags::FWRITE_QIO | UserFlags::USR_ADDR | UserFlags::USR_DUMMY,
            ..Default::default()
        };
        let regs = Transaction::simple(opcodes::WRDI).apply(&base, 0);
        assert_eq!(regs.user, UserFlags::FWRITE_QIO | UserFlags::USR_COMMAND);
    }

    #[test]
    fn test_simple_has_no_data_phases() {
        let regs = Transaction::simple(opcodes::WREN).user_registers(1);
        assert_eq!(regs.user, UserFlags::USR_COMMAND);
        assert_eq!(regs.mosi_bitlen, 0);
        assert_eq!(regs.miso_bitlen, 0);
    }
}
