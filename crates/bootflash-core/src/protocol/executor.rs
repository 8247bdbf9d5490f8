//! Command executor
//!
//! Issues one address-less flash transaction by programming the
//! controller's user-command registers directly. This is the only path
//! for status/control commands; data transfers go through the ROM.

use crate::hal::{spin_until, FlashBus, Relax, RomFlash};
use crate::spi::{opcodes, CtrlFlags, Transaction, UserFlags, UserRegisters};

/// Something that can run a single status/control transaction
///
/// Implemented by [`Executor`]; the unlock protocol is generic over it.
pub trait CommandExecutor {
    /// Run `tx` to completion and return the received bits
    ///
    /// Bits beyond `tx.miso_bits` are zero. Cannot fail: a bus that never
    /// completes hangs the caller.
    fn execute(&mut self, tx: &Transaction) -> u32;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &mut E {
    fn execute(&mut self, tx: &Transaction) -> u32 {
        (**self).execute(tx)
    }
}

/// Burst wrap length for the cache line fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WrapMode {
    /// Wrap within 8 bytes
    Bytes8 = 0,
    /// Wrap disabled
    Disabled = 1,
    /// Wrap within 16 bytes
    Bytes16 = 2,
    /// Wrap within 32 bytes
    Bytes32 = 4,
    /// Wrap within 64 bytes
    Bytes64 = 6,
}

/// Drives a [`FlashBus`] one transaction at a time
pub struct Executor<'a, B: ?Sized, W: ?Sized> {
    bus: &'a mut B,
    relax: &'a W,
}

impl<'a, B, W> Executor<'a, B, W>
where
    B: FlashBus + ?Sized,
    W: Relax + ?Sized,
{
    /// Borrow the bus for a sequence of commands
    pub fn new(bus: &'a mut B, relax: &'a W) -> Self {
        Self { bus, relax }
    }

    fn run(&mut self) {
        self.bus.start();
        let bus = &*self.bus;
        spin_until(self.relax, || !bus.is_busy());
    }

    /// Program the flash chip's burst wrap length
    ///
    /// Unlike [`CommandExecutor::execute`] this transaction carries a
    /// 24-bit address and clocks its data out in QIO mode, so both the
    /// control and user registers are saved and restored around it.
    pub fn set_wrap_mode(&mut self, mode: WrapMode) {
        let saved_ctrl = self.bus.ctrl();
        let saved_user = self.bus.user();

        let user = (saved_user.user
            - (UserFlags::FWRITE_DIO
                | UserFlags::FWRITE_DUAL
                | UserFlags::FWRITE_QUAD
                | UserFlags::USR_DUMMY
                | UserFlags::USR_MISO))
            | UserFlags::FWRITE_QIO
            | UserFlags::USR_ADDR
            | UserFlags::USR_COMMAND
            | UserFlags::USR_MOSI;

        let regs = UserRegisters {
            user,
            addr_bitlen: 23,
            command_bitlen: 7,
            command_value: opcodes::WRAP as u16,
            mosi_bitlen: 7,
            ..saved_user
        };

        log::trace!("wrap mode {:?}", mode);
        self.bus
            .set_ctrl(saved_ctrl - (CtrlFlags::FCMD_DUAL | CtrlFlags::FCMD_QUAD));
        self.bus.set_user(&regs);
        self.bus.set_addr(0);
        self.bus.set_data((mode as u32) << 4);
        self.run();

        self.bus.set_ctrl(saved_ctrl);
        self.bus.set_user(&saved_user);
    }
}

impl<B, W> CommandExecutor for Executor<'_, B, W>
where
    B: FlashBus + ?Sized,
    W: Relax + ?Sized,
{
    fn execute(&mut self, tx: &Transaction) -> u32 {
        let saved_ctrl = self.bus.ctrl();
        // Keep WP high while idle; this also drops any DIO/QIO command mode
        self.bus.set_ctrl(CtrlFlags::WP_REG);

        let base = self.bus.user();
        let regs = tx.apply(&base, self.bus.extra_dummy_cycles());
        self.bus.set_user(&regs);
        self.bus.set_data(tx.mosi_data);
        self.run();

        self.bus.set_ctrl(saved_ctrl);

        let data = self.bus.data();
        log::trace!(
            "cmd 0x{:02X} out 0x{:X}/{} in {} -> 0x{:X}",
            tx.command,
            tx.mosi_data,
            tx.mosi_bits,
            tx.miso_bits,
            data
        );
        match tx.miso_bits {
            0 => 0,
            bits if bits >= 32 => data,
            bits => data & ((1u32 << bits) - 1),
        }
    }
}

/// Wait for the flash chip to finish any write or erase in progress
///
/// Busy-polls the ROM status check with no timeout.
pub fn wait_idle<R, W>(rom: &mut R, relax: &W)
where
    R: RomFlash + ?Sized,
    W: Relax + ?Sized,
{
    spin_until(relax, || rom.poll_idle());
}

/// Read status register 1
pub fn read_status1<E: CommandExecutor + ?Sized>(exec: &mut E) -> u8 {
    exec.execute(&Transaction::read_reg(opcodes::RDSR, 8)) as u8
}

/// Read status register 2
pub fn read_status2<E: CommandExecutor + ?Sized>(exec: &mut E) -> u8 {
    exec.execute(&Transaction::read_reg(opcodes::RDSR2, 8)) as u8
}

/// Send the Write Enable command
pub fn write_enable<E: CommandExecutor + ?Sized>(exec: &mut E) {
    exec.execute(&Transaction::simple(opcodes::WREN));
}

/// Send the Write Disable command
pub fn write_disable<E: CommandExecutor + ?Sized>(exec: &mut E) {
    exec.execute(&Transaction::simple(opcodes::WRDI));
}
