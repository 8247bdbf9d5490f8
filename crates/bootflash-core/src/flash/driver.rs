//! The boot-time flash driver

use core::cell::{Cell, RefCell};

use zerocopy::FromBytes;

use super::erase::{ErasePlan, EraseStep};
use super::window::{Mapping, Suspended, WindowState};
use crate::config::FlashConfig;
use crate::error::{ArgumentError, Error, Result};
use crate::hal::{
    pages_to_map, CacheController, FlashBus, Relax, RomFlash, Spin, Target, MMU_PAGE_MASK,
    MMU_PAGE_SIZE,
};
use crate::protocol::executor::write_disable;
use crate::protocol::{self, Executor, UnlockOutcome, WrapMode};

/// Alignment of plain reads and writes
pub const WORD_ALIGN: u32 = 4;

/// Alignment of encrypted writes (one encryption engine block)
pub const ENCRYPTED_ALIGN: u32 = 32;

struct Hardware<B, R, C, W> {
    bus: B,
    rom: R,
    cache: C,
    relax: W,
}

/// Flash driver for code running before any OS service exists
///
/// Owns the flash bus, the ROM primitives, and the cache/MMU. Every method
/// takes `&self`: the only shared resource is the mapping window, and a
/// live [`Mapping`] borrows the driver. The type is not `Sync`.
pub struct BootFlash<B, R, C, W = Spin> {
    hw: RefCell<Hardware<B, R, C, W>>,
    config: FlashConfig,
    window: Cell<WindowState>,
    unlocked: Cell<bool>,
}

impl<B, R, C> BootFlash<B, R, C, Spin>
where
    B: FlashBus,
    R: RomFlash,
    C: CacheController,
{
    /// Create a driver that spins while the hardware is busy
    pub fn new(config: FlashConfig, bus: B, rom: R, cache: C) -> Self {
        Self::with_relax(config, bus, rom, cache, Spin)
    }
}

impl<B, R, C, W> BootFlash<B, R, C, W>
where
    B: FlashBus,
    R: RomFlash,
    C: CacheController,
    W: Relax,
{
    /// Create a driver with a custom relax hook for busy polls
    pub fn with_relax(config: FlashConfig, bus: B, rom: R, cache: C, relax: W) -> Self {
        log::debug!(
            "{} flash driver: {} KiB, mmap window at 0x{:08X}",
            config.target,
            config.geometry.size / 1024,
            config.target.drom_base()
        );
        Self {
            hw: RefCell::new(Hardware {
                bus,
                rom,
                cache,
                relax,
            }),
            config,
            window: Cell::new(WindowState::default()),
            unlocked: Cell::new(false),
        }
    }

    /// Configuration the driver was built with
    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Chip family
    pub fn target(&self) -> Target {
        self.config.target
    }

    /// Returns true while a [`Mapping`] is live
    pub fn is_mapped(&self) -> bool {
        self.window.get().mapped
    }

    /// Flash page currently behind the decrypting read window, if any
    pub fn read_window_page(&self) -> Option<u32> {
        self.window.get().read_page
    }

    /// Returns true once the unlock protocol has run
    pub fn is_unlocked(&self) -> bool {
        self.unlocked.get()
    }

    /// Give the hardware back
    pub fn into_parts(self) -> (B, R, C, W) {
        let hw = self.hw.into_inner();
        (hw.bus, hw.rom, hw.cache, hw.relax)
    }

    /// Number of MMU pages available to [`BootFlash::mmap`]
    pub fn free_page_count(&self) -> u32 {
        self.config.target.mmap_region_size() / MMU_PAGE_SIZE
    }

    // Argument checks

    fn check_aligned(what: &str, addr: u32, len: u32, align: u32) -> Result<()> {
        if addr % align != 0 {
            log::error!("{} addr 0x{:x} not {}-byte aligned", what, addr, align);
            return Err(ArgumentError::UnalignedAddress { addr, align }.into());
        }
        if len % align != 0 {
            log::error!("{} size 0x{:x} not {}-byte aligned", what, len, align);
            return Err(ArgumentError::UnalignedLength { len, align }.into());
        }
        Ok(())
    }

    /// Length of `buf`, checked to fit in the address space after `addr`
    fn span(addr: u32, buf: &[u8]) -> Result<u32> {
        u32::try_from(buf.len())
            .ok()
            .filter(|len| addr.checked_add(*len).is_some())
            .ok_or_else(|| ArgumentError::BufferTooLong.into())
    }

    // Read

    /// Read `buf.len()` bytes starting at flash address `addr`
    ///
    /// With `allow_decrypt` the data is fetched word by word through the
    /// read window, so the inline decryption engine applies. Otherwise the
    /// ROM linear read is used and the raw flash contents are returned.
    ///
    /// `addr`, the length and the buffer itself must be 4-byte aligned.
    pub fn read(&self, addr: u32, buf: &mut [u8], allow_decrypt: bool) -> Result<()> {
        let len = Self::span(addr, buf)?;
        Self::check_aligned("read", addr, len, WORD_ALIGN)?;
        if len == 0 {
            return Ok(());
        }
        let words = <[u32]>::mut_from_bytes(buf).map_err(|_| {
            log::error!("read dest not 4-byte aligned");
            Error::from(ArgumentError::UnalignedBuffer)
        })?;

        if allow_decrypt {
            self.read_decrypted(addr, words)
        } else {
            self.read_plain(addr, words)
        }
    }

    fn read_plain(&self, addr: u32, words: &mut [u32]) -> Result<()> {
        let target = self.config.target;
        let hw = &mut *self.hw.borrow_mut();

        let _cache = if target.flush_on_suspend() {
            Suspended::invalidated(&mut hw.cache, target.cache())
        } else {
            Suspended::new(&mut hw.cache, target.cache())
        };
        hw.rom.read(addr, words).into_result()
    }

    fn read_decrypted(&self, addr: u32, words: &mut [u32]) -> Result<()> {
        let window_base = self.config.target.read_window_base();

        for (word_addr, word) in (addr..).step_by(4).zip(words.iter_mut()) {
            let page = word_addr & MMU_PAGE_MASK;
            if self.window.get().read_page != Some(page) {
                self.move_read_window(page)?;
            }
            *word = self.load_word(window_base + (word_addr - page));
        }
        Ok(())
    }

    fn move_read_window(&self, page: u32) -> Result<()> {
        let target = self.config.target;
        let mut state = self.window.get();
        log::debug!(
            "mmu set block paddr=0x{:08x} (was {:08x?})",
            page,
            state.read_page
        );

        {
            let hw = &mut *self.hw.borrow_mut();
            let mut cache = Suspended::invalidated(&mut hw.cache, target.cache());
            cache.remap(target.mmu_bus(), target.read_window_base(), page, 1)?;
        }

        state.read_page = Some(page);
        self.window.set(state);
        Ok(())
    }

    pub(super) fn load_word(&self, vaddr: u32) -> u32 {
        self.hw.borrow().cache.load_word(vaddr)
    }

    // Write and erase

    /// Write `buf` to flash address `addr`
    ///
    /// Plain writes need `addr` and the length 4-byte aligned; encrypted
    /// writes need both 32-byte aligned. The buffer must be 4-byte aligned
    /// either way. The chip is unlocked before the first write of the
    /// session.
    pub fn write(&self, addr: u32, buf: &[u8], encrypted: bool) -> Result<()> {
        let len = Self::span(addr, buf)?;
        let align = if encrypted { ENCRYPTED_ALIGN } else { WORD_ALIGN };
        Self::check_aligned("write", addr, len, align)?;
        if len == 0 {
            return Ok(());
        }
        let words = <[u32]>::ref_from_bytes(buf).map_err(|_| {
            log::error!("write src not 4-byte aligned");
            Error::from(ArgumentError::UnalignedBuffer)
        })?;

        self.ensure_unlocked();

        let hw = &mut *self.hw.borrow_mut();
        let status = if encrypted && !self.config.virtual_encryption {
            hw.rom.write_encrypted(addr, words)
        } else {
            hw.rom.write(addr, words)
        };
        status.into_result()
    }

    /// Erase one sector by index
    pub fn erase_sector(&self, sector: u32) -> Result<()> {
        self.ensure_unlocked();
        self.hw.borrow_mut().rom.erase_sector(sector).into_result()
    }

    /// Erase `[addr, addr + len)`, using block erases where a whole block fits
    ///
    /// Both values must be sector-aligned. The erase is not atomic: on
    /// failure, everything erased before the failing step stays erased.
    pub fn erase_range(&self, addr: u32, len: u32) -> Result<()> {
        let plan = ErasePlan::new(&self.config.geometry, addr, len).inspect_err(|e| {
            log::error!("erase range 0x{:x}+0x{:x}: {}", addr, len, e);
        })?;
        if plan.is_empty() {
            return Ok(());
        }

        self.ensure_unlocked();

        let mut hw = self.hw.borrow_mut();
        for step in plan {
            log::trace!("erase {:?}", step);
            let status = match step {
                EraseStep::Sector(sector) => hw.rom.erase_sector(sector),
                EraseStep::Block(block) => hw.rom.erase_block(block),
            };
            status.into_result().inspect_err(|e| {
                log::error!(
                    "erase at 0x{:x} failed: {}",
                    step.addr(&self.config.geometry),
                    e
                );
            })?;
        }
        Ok(())
    }

    // Chip control

    /// Clear the chip's block protection
    ///
    /// Always runs the full protocol, and marks the session unlocked.
    pub fn unlock(&self) -> UnlockOutcome {
        let hw = &mut *self.hw.borrow_mut();
        let outcome = protocol::unlock(
            &mut Executor::new(&mut hw.bus, &hw.relax),
            &mut hw.rom,
            &hw.relax,
        );
        self.unlocked.set(true);
        outcome
    }

    fn ensure_unlocked(&self) {
        if !self.unlocked.get() {
            let outcome = self.unlock();
            log::debug!(
                "unlocked {:?} chip with {} status write(s)",
                outcome.class,
                outcome.writes_issued()
            );
        }
    }

    /// Send Write Disable, leaving OTP mode
    pub fn enable_write_protect(&self) {
        let hw = &mut *self.hw.borrow_mut();
        write_disable(&mut Executor::new(&mut hw.bus, &hw.relax));
    }

    /// Program the flash chip's burst wrap length
    pub fn set_wrap_mode(&self, mode: WrapMode) -> Result<()> {
        if !self.config.target.supports_wrap() {
            log::error!("{} has no cache wrap support", self.config.target);
            return Err(Error::UnsupportedOperation);
        }
        let hw = &mut *self.hw.borrow_mut();
        Executor::new(&mut hw.bus, &hw.relax).set_wrap_mode(mode);
        Ok(())
    }

    // Mapping

    /// Map `size` bytes of flash starting at `addr` into the mmap region
    ///
    /// Fails with [`Error::AlreadyMapped`] while another mapping is live.
    pub fn mmap(&self, addr: u32, size: u32) -> Result<Mapping<'_, B, R, C, W>> {
        let mut state = self.window.get();
        if state.mapped {
            log::error!("tried to mmap twice");
            return Err(Error::AlreadyMapped);
        }

        let target = self.config.target;
        let max = target.mmap_region_size();
        if size > max {
            log::error!("mmap excess size 0x{:x}", size);
            return Err(ArgumentError::MappingTooLarge { size, max }.into());
        }

        let page = addr & MMU_PAGE_MASK;
        let pages = pages_to_map(addr, size);
        // An unaligned start can spill one page past the region, onto the
        // read window
        if pages > self.free_page_count() {
            log::error!("mmap 0x{:x}+0x{:x} needs {} pages", addr, size, pages);
            return Err(ArgumentError::MappingTooLarge { size, max }.into());
        }
        log::debug!(
            "mmu set paddr=0x{:08x} count={} size=0x{:x} src_addr=0x{:x}",
            page,
            pages,
            size,
            addr
        );

        {
            let hw = &mut *self.hw.borrow_mut();
            let mut cache = Suspended::invalidated(&mut hw.cache, target.cache());
            cache.remap(target.mmu_bus(), target.drom_base(), page, pages)?;
        }

        state.mapped = true;
        self.window.set(state);

        Ok(Mapping {
            flash: self,
            vaddr: target.drom_base() + (addr - page),
            paddr: addr,
            len: size,
            pages,
        })
    }

    /// Release a mapping, resetting the MMU
    pub fn munmap(&self, mapping: Mapping<'_, B, R, C, W>) {
        drop(mapping);
    }

    pub(super) fn reset_mmu(&self) {
        let cache_kind = self.config.target.cache();
        {
            let hw = &mut *self.hw.borrow_mut();
            let mut cache = Suspended::invalidated(&mut hw.cache, cache_kind);
            cache.mmu_init();
        }
        log::debug!("mmu reset");
        self.window.set(WindowState::default());
    }
}
