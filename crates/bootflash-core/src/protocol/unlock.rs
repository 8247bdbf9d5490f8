//! Status register unlock
//!
//! Block protect bits left set by an earlier boot stage silently turn
//! later erases and writes into no-ops. Before the first write or erase,
//! the driver classifies the chip by its JEDEC ID and rewrites the status
//! registers so every protect bit is clear while the Quad Enable bit
//! survives.
//!
//! The register layout and write commands differ by vendor family:
//!
//! | Class   | Read            | Target                   | Write                  |
//! |---------|-----------------|--------------------------|------------------------|
//! | ISSI    | SR1             | SR1 minus BP mask        | WRSR, 8 bits           |
//! | GD-Q    | SR1, SR2        | SR1 = 0, SR2 = QE only   | WRSR + WRSR2, 8 bits   |
//! | Generic | SR1 \| SR2 << 8 | QE only                  | WRSR, 16 bits          |
//!
//! Status writes are not read back.

use heapless::Vec;

use super::executor::{read_status1, read_status2, wait_idle, write_disable, write_enable};
use super::CommandExecutor;
use crate::hal::{Relax, RomFlash};
use crate::spi::{opcodes, Transaction};

/// Vendor family that decides the status register protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuirkClass {
    /// ISSI: protect bits include bit 7; SR1 written alone
    Issi,
    /// GigaDevice GD25Q32 and up: SR1 and SR2 have separate write commands
    GdQ,
    /// Everything else (XMC, Winbond, ...): SR1+SR2 written as 16 bits
    Generic,
}

impl QuirkClass {
    /// Classify a chip from its 24-bit JEDEC ID
    pub fn classify(device_id: u32) -> Self {
        let [_, manufacturer, memory_type, capacity] = device_id.to_be_bytes();
        if manufacturer == opcodes::ISSI_ID {
            QuirkClass::Issi
        } else if manufacturer == opcodes::GD_ID
            && memory_type == opcodes::GD_Q_MEMORY_TYPE
            && capacity >= opcodes::GD_Q_MIN_CAPACITY
        {
            QuirkClass::GdQ
        } else {
            QuirkClass::Generic
        }
    }
}

/// One status register as read, and the value it should hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWrite {
    /// Write opcode for this register
    pub command: u8,
    /// Value read from the chip
    pub current: u16,
    /// Value the register must hold after unlock
    pub target: u16,
    /// Width of the write transaction in bits
    pub bits: u8,
}

impl StatusWrite {
    fn new(command: u8, current: u16, target: u16, bits: u8) -> Self {
        Self {
            command,
            current,
            target,
            bits,
        }
    }

    /// Returns true if the register differs from its target
    pub fn is_needed(&self) -> bool {
        self.current != self.target
    }
}

/// Status registers in the order they are written
pub type StatusPlan = Vec<StatusWrite, 2>;

/// What an unlock pass found and did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockOutcome {
    /// Classification of the attached chip
    pub class: QuirkClass,
    /// Every register examined, with its current and target value
    pub plan: StatusPlan,
}

impl UnlockOutcome {
    /// Number of status register writes that were issued
    pub fn writes_issued(&self) -> usize {
        self.plan.iter().filter(|w| w.is_needed()).count()
    }
}

/// Target for an ISSI SR1: protect mask cleared, everything else kept
pub fn issi_target(sr1: u8) -> u8 {
    sr1 & !opcodes::SR1_BP_MASK_ISSI
}

/// Targets for a GD-Q SR1/SR2 pair: SR1 cleared, SR2 keeps only QE
pub fn gd_q_targets(_sr1: u8, sr2: u8) -> (u8, u8) {
    (0, sr2 & opcodes::SR2_QE)
}

/// Target for a combined SR1 | SR2 << 8 value: only QE kept
pub fn generic_target(status: u16) -> u16 {
    status & opcodes::SR12_QE
}

/// Read the status registers for `class` and work out their targets
pub fn plan_status_writes<E: CommandExecutor + ?Sized>(class: QuirkClass, exec: &mut E) -> StatusPlan {
    let mut plan = StatusPlan::new();
    match class {
        QuirkClass::Issi => {
            let sr1 = read_status1(exec);
            plan.extend([StatusWrite::new(
                opcodes::WRSR,
                sr1 as u16,
                issi_target(sr1) as u16,
                8,
            )]);
        }
        QuirkClass::GdQ => {
            let sr1 = read_status1(exec);
            let sr2 = read_status2(exec);
            let (sr1_target, sr2_target) = gd_q_targets(sr1, sr2);
            plan.extend([
                StatusWrite::new(opcodes::WRSR, sr1 as u16, sr1_target as u16, 8),
                StatusWrite::new(opcodes::WRSR2, sr2 as u16, sr2_target as u16, 8),
            ]);
        }
        QuirkClass::Generic => {
            let status = read_status1(exec) as u16 | (read_status2(exec) as u16) << 8;
            plan.extend([StatusWrite::new(
                opcodes::WRSR,
                status,
                generic_target(status),
                16,
            )]);
        }
    }
    plan
}

/// Clear the chip's block protection
///
/// Safe to run before every write: registers already at their target are
/// left alone, and the chip always ends write-disabled.
pub fn unlock<E, R, W>(exec: &mut E, rom: &mut R, relax: &W) -> UnlockOutcome
where
    E: CommandExecutor + ?Sized,
    R: RomFlash + ?Sized,
    W: Relax + ?Sized,
{
    wait_idle(rom, relax);

    let class = QuirkClass::classify(rom.device_id());
    let plan = plan_status_writes(class, exec);

    for write in plan.iter().filter(|w| w.is_needed()) {
        log::debug!(
            "{:?} chip: status 0x{:X} -> 0x{:X} (cmd 0x{:02X})",
            class,
            write.current,
            write.target,
            write.command
        );
        // Each register write consumes the write enable latch
        wait_idle(rom, relax);
        write_enable(exec);
        wait_idle(rom, relax);
        exec.execute(&Transaction::write_reg(
            write.command,
            write.target as u32,
            write.bits,
        ));
        wait_idle(rom, relax);
    }

    write_disable(exec);
    wait_idle(rom, relax);

    UnlockOutcome { class, plan }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(QuirkClass::classify(0x9D_60_16), QuirkClass::Issi);
        assert_eq!(QuirkClass::classify(0xC8_40_16), QuirkClass::GdQ);
        assert_eq!(QuirkClass::classify(0xC8_40_18), QuirkClass::GdQ);
        // GD25Q16 and smaller use the 16-bit write
        assert_eq!(QuirkClass::classify(0xC8_40_15), QuirkClass::Generic);
        // GD25LQ is a different memory type
        assert_eq!(QuirkClass::classify(0xC8_60_16), QuirkClass::Generic);
        assert_eq!(QuirkClass::classify(0x20_40_16), QuirkClass::Generic);
        assert_eq!(QuirkClass::classify(0xEF_40_18), QuirkClass::Generic);
    }

    #[test]
    fn test_classify_ignores_top_byte() {
        assert_eq!(QuirkClass::classify(0xFF_9D_60_16), QuirkClass::Issi);
    }

    #[test]
    fn test_issi_target() {
        assert_eq!(issi_target(0xBC), 0x00);
        // QE (bit 6) and WEL/WIP are not protect bits
        assert_eq!(issi_target(0xFF), 0x43);
        assert_eq!(issi_target(0x40), 0x40);
    }

    #[test]
    fn test_gd_q_targets() {
        assert_eq!(gd_q_targets(0x9C, 0x43), (0x00, 0x02));
        assert_eq!(gd_q_targets(0x00, 0x00), (0x00, 0x00));
    }

    #[test]
    fn test_generic_target() {
        assert_eq!(generic_target(0x021C), 0x0200);
        assert_eq!(generic_target(0x401C), 0x0000);
        assert_eq!(generic_target(0x0200), 0x0200);
    }

    struct Scripted {
        sr1: u8,
        sr2: u8,
        log: std::vec::Vec<Transaction>,
    }

    impl CommandExecutor for Scripted {
        fn execute(&mut self, tx: &Transaction) -> u32 {
            self.log.push(*tx);
            match tx.command {
                opcodes::RDSR => self.sr1 as u32,
                opcodes::RDSR2 => self.sr2 as u32,
                _ => 0,
            }
        }
    }

    #[test]
    fn test_plan_generic_reads_both_registers() {
        let mut exec = Scripted {
            sr1: 0x1C,
            sr2: 0x02,
            log: std::vec::Vec::new(),
        };
        let plan = plan_status_writes(QuirkClass::Generic, &mut exec);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].current, 0x021C);
        assert_eq!(plan[0].target, 0x0200);
        assert_eq!(plan[0].bits, 16);
        assert_eq!(exec.log.len(), 2);
    }
}
