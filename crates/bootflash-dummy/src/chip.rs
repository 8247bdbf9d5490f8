//! Shared emulator state

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};
use core::ops::Range;

use bootflash_core::hal::{Autoload, CacheKind, MMU_PAGE_MASK};
use bootflash_core::spi::{opcodes, CtrlFlags, UserRegisters};
use bootflash_core::{BootFlash, FlashConfig, FlashGeometry, Relax};

use crate::{DummyConfig, Op};

/// Block protect bits BP0..BP3 in SR1
const SR1_BP_MASK: u8 = 0x3C;

pub(crate) struct ChipState {
    pub config: DummyConfig,
    pub data: Vec<u8>,
    pub ops: Vec<Op>,

    // Flash chip
    pub sr1: u8,
    pub sr2: u8,
    pub write_enabled: bool,
    pub busy_left: u32,
    pub wrap: Option<u8>,

    // Controller registers
    pub ctrl: CtrlFlags,
    pub user: UserRegisters,
    pub addr: u32,
    pub data_buf: u32,
    pub go_left: u32,
    pub hung: bool,

    // ROM fault injection
    pub fail_erase_at: Option<u32>,
    pub rom_timeout: bool,

    // Cache and MMU
    pub suspended: Option<(CacheKind, Autoload)>,
    pub next_autoload: u32,
    pub mmu: BTreeMap<u32, u32>,
    pub mmu_status: i32,
    pub stray_resumes: u32,
}

impl ChipState {
    /// Byte range for an access, if it fits in the chip
    pub fn span(&self, addr: u32, len: usize) -> Option<Range<usize>> {
        let start = addr as usize;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }

    pub fn is_protected(&self) -> bool {
        self.sr1 & SR1_BP_MASK != 0
    }

    /// SR1 as the chip reports it, with WEL folded in
    pub fn read_sr1(&self) -> u8 {
        let wel = if self.write_enabled { 0x02 } else { 0 };
        (self.sr1 & !opcodes::SR1_WIP & !0x02) | wel
    }
}

/// Handle to an emulated flash chip, controller and cache
///
/// Clones share the same state.
#[derive(Clone)]
pub struct DummyChip {
    state: Rc<RefCell<ChipState>>,
}

impl DummyChip {
    /// Create an erased chip
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        let state = ChipState {
            sr1: config.sr1,
            sr2: config.sr2,
            data,
            ops: Vec::new(),
            write_enabled: false,
            busy_left: 0,
            wrap: None,
            ctrl: CtrlFlags::FREAD_QIO | CtrlFlags::FCMD_QUAD,
            user: UserRegisters::default(),
            addr: 0,
            data_buf: 0,
            go_left: 0,
            hung: false,
            fail_erase_at: None,
            rom_timeout: false,
            suspended: None,
            next_autoload: 1,
            mmu: BTreeMap::new(),
            mmu_status: 0,
            stray_resumes: 0,
            config,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Create a chip with the default configuration (W25Q128FV, 4 MiB)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a chip with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let chip = Self::new(config);
        {
            let mut state = chip.state_mut();
            let len = core::cmp::min(initial_data.len(), state.data.len());
            state.data[..len].copy_from_slice(&initial_data[..len]);
        }
        chip
    }

    pub(crate) fn state(&self) -> Ref<'_, ChipState> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, ChipState> {
        self.state.borrow_mut()
    }

    /// Flash geometry matching this chip
    pub fn geometry(&self) -> FlashGeometry {
        let state = self.state();
        FlashGeometry {
            size: state.config.size as u32,
            sector_size: state.config.sector_size as u32,
            block_size: state.config.block_size as u32,
        }
    }

    /// Build a driver on top of this chip
    pub fn boot_flash(&self, config: FlashConfig) -> BootFlash<Self, Self, Self> {
        BootFlash::new(config, self.clone(), self.clone(), self.clone())
    }

    /// Build a driver with a custom relax hook
    pub fn boot_flash_with_relax<W: Relax>(
        &self,
        config: FlashConfig,
        relax: W,
    ) -> BootFlash<Self, Self, Self, W> {
        BootFlash::with_relax(config, self.clone(), self.clone(), self.clone(), relax)
    }

    /// Copy of the whole flash array
    pub fn contents(&self) -> Vec<u8> {
        self.state().data.clone()
    }

    /// Copy of `len` bytes at `addr`
    pub fn contents_at(&self, addr: u32, len: usize) -> Vec<u8> {
        let state = self.state();
        let start = addr as usize;
        state.data[start..start + len].to_vec()
    }

    /// Overwrite flash contents directly, bypassing the driver
    pub fn fill(&self, addr: u32, bytes: &[u8]) {
        let mut state = self.state_mut();
        let start = addr as usize;
        state.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Everything recorded so far
    pub fn ops(&self) -> Vec<Op> {
        self.state().ops.clone()
    }

    /// Return and clear the operation log
    pub fn take_ops(&self) -> Vec<Op> {
        core::mem::take(&mut self.state_mut().ops)
    }

    /// Opcodes of the bus commands recorded so far
    pub fn commands(&self) -> Vec<u8> {
        self.state().ops.iter().filter_map(Op::opcode).collect()
    }

    /// Current (SR1, SR2)
    pub fn status(&self) -> (u8, u8) {
        let state = self.state();
        (state.sr1, state.sr2)
    }

    /// Returns true while the write enable latch is set
    pub fn is_write_enabled(&self) -> bool {
        self.state().write_enabled
    }

    /// Last wrap mode programmed with the burst wrap command
    pub fn wrap_mode(&self) -> Option<u8> {
        self.state().wrap
    }

    /// Wedge the controller and the chip: nothing ever completes
    pub fn set_hung(&self, hung: bool) {
        self.state_mut().hung = hung;
    }

    /// Make erases covering `addr` fail
    pub fn fail_erase_at(&self, addr: Option<u32>) {
        self.state_mut().fail_erase_at = addr;
    }

    /// Make every ROM write and erase time out
    pub fn set_rom_timeout(&self, timeout: bool) {
        self.state_mut().rom_timeout = timeout;
    }

    /// Status returned by every MMU programming call
    pub fn set_mmu_status(&self, status: i32) {
        self.state_mut().mmu_status = status;
    }

    /// Flash page behind the virtual page containing `vaddr`
    pub fn mmu_entry(&self, vaddr: u32) -> Option<u32> {
        self.state().mmu.get(&(vaddr & MMU_PAGE_MASK)).copied()
    }

    /// Returns true while the cache is suspended
    pub fn is_cache_suspended(&self) -> bool {
        self.state().suspended.is_some()
    }

    /// Number of resumes that did not match the last suspend
    pub fn stray_resumes(&self) -> u32 {
        self.state().stray_resumes
    }
}
