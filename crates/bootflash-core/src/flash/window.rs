//! The cache/MMU mapping window
//!
//! Two regions of the data bus are reserved for flash access:
//!
//! - the mmap region at the bottom of the data ROM range, handed out as a
//!   [`Mapping`] to at most one caller at a time
//! - a single page right after it, which the decrypting read path moves
//!   around one 64 KiB page at a time
//!
//! Every page table change happens with the cache parked: it is suspended
//! and invalidated, the MMU is programmed, and the cache is resumed with the
//! autoload state the suspend returned.

use core::fmt;
use core::ops::{Deref, DerefMut};

use super::BootFlash;
use crate::error::{ArgumentError, Error, Result};
use crate::hal::{
    Autoload, CacheController, CacheKind, FlashBus, MmuBus, Relax, RomFlash, MMU_PAGE_MASK,
};

/// Bookkeeping for the two windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WindowState {
    /// A [`Mapping`] is live
    pub mapped: bool,
    /// Flash page currently behind the read window
    pub read_page: Option<u32>,
}

/// A suspended cache; resumes with the saved autoload state on drop
pub(crate) struct Suspended<'a, C: CacheController + ?Sized> {
    cache: &'a mut C,
    kind: CacheKind,
    autoload: Autoload,
}

impl<'a, C: CacheController + ?Sized> Suspended<'a, C> {
    /// Park the cache without dropping its contents
    pub fn new(cache: &'a mut C, kind: CacheKind) -> Self {
        let autoload = cache.suspend(kind);
        Self {
            cache,
            kind,
            autoload,
        }
    }

    /// Park the cache and drop every line, ready for a page table change
    pub fn invalidated(cache: &'a mut C, kind: CacheKind) -> Self {
        let mut suspended = Self::new(cache, kind);
        suspended.cache.invalidate_all(kind);
        suspended
    }

    /// Program `count` pages at `vaddr` to point at flash page `paddr`
    pub fn remap(&mut self, bus: MmuBus, vaddr: u32, paddr: u32, count: u32) -> Result<()> {
        match self.cache.mmu_set(bus, vaddr, paddr, count) {
            0 => Ok(()),
            code => {
                log::error!("mmu set failed: {} (paddr=0x{:08X} count={})", code, paddr, count);
                Err(Error::RemapFailed(code))
            }
        }
    }
}

impl<C: CacheController + ?Sized> Deref for Suspended<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.cache
    }
}

impl<C: CacheController + ?Sized> DerefMut for Suspended<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.cache
    }
}

impl<C: CacheController + ?Sized> Drop for Suspended<'_, C> {
    fn drop(&mut self) {
        self.cache.resume(self.kind, self.autoload);
    }
}

/// A live view of flash through the mmap region
///
/// Only one exists at a time. Dropping it (or passing it to
/// [`BootFlash::munmap`]) resets the MMU to its power-on state, which also
/// evicts whatever page the read window held.
pub struct Mapping<'a, B, R, C, W>
where
    B: FlashBus,
    R: RomFlash,
    C: CacheController,
    W: Relax,
{
    pub(super) flash: &'a BootFlash<B, R, C, W>,
    pub(super) vaddr: u32,
    pub(super) paddr: u32,
    pub(super) len: u32,
    pub(super) pages: u32,
}

impl<B, R, C, W> Mapping<'_, B, R, C, W>
where
    B: FlashBus,
    R: RomFlash,
    C: CacheController,
    W: Relax,
{
    /// Virtual address of the requested flash byte
    pub fn vaddr(&self) -> u32 {
        self.vaddr
    }

    /// Flash address the mapping was requested for
    pub fn flash_addr(&self) -> u32 {
        self.paddr
    }

    /// First flash page behind the mapping
    pub fn flash_page(&self) -> u32 {
        self.paddr & MMU_PAGE_MASK
    }

    /// Requested length in bytes
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Returns true for a zero-length mapping
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of MMU pages programmed for this mapping
    pub fn page_count(&self) -> u32 {
        self.pages
    }

    fn check(&self, offset: u32, len: u32) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(ArgumentError::OutOfWindow {
                offset,
                len: self.len,
            }
            .into()),
        }
    }

    /// Load the word at `offset` bytes into the mapping
    ///
    /// The resulting virtual address must be word-aligned.
    pub fn read_word(&self, offset: u32) -> Result<u32> {
        self.check(offset, 4)?;
        let vaddr = self.vaddr + offset;
        if vaddr % 4 != 0 {
            return Err(ArgumentError::UnalignedAddress { addr: vaddr, align: 4 }.into());
        }
        Ok(self.flash.load_word(vaddr))
    }

    /// Copy bytes starting at `offset` into `dest`
    pub fn read(&self, offset: u32, dest: &mut [u8]) -> Result<()> {
        let len = u32::try_from(dest.len()).map_err(|_| ArgumentError::BufferTooLong)?;
        self.check(offset, len)?;

        let mut cached: Option<(u32, [u8; 4])> = None;
        for (addr, byte) in (self.vaddr + offset..).zip(dest.iter_mut()) {
            let word_addr = addr & !3;
            let bytes = match cached {
                Some((at, bytes)) if at == word_addr => bytes,
                _ => {
                    let bytes = self.flash.load_word(word_addr).to_le_bytes();
                    cached = Some((word_addr, bytes));
                    bytes
                }
            };
            *byte = bytes[(addr & 3) as usize];
        }
        Ok(())
    }
}

impl<B, R, C, W> fmt::Debug for Mapping<'_, B, R, C, W>
where
    B: FlashBus,
    R: RomFlash,
    C: CacheController,
    W: Relax,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("vaddr", &format_args!("0x{:08X}", self.vaddr))
            .field("paddr", &format_args!("0x{:08X}", self.paddr))
            .field("len", &self.len)
            .field("pages", &self.pages)
            .finish()
    }
}

impl<B, R, C, W> Drop for Mapping<'_, B, R, C, W>
where
    B: FlashBus,
    R: RomFlash,
    C: CacheController,
    W: Relax,
{
    fn drop(&mut self) {
        self.flash.reset_mmu();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Debug, PartialEq, Eq)]
    enum Op {
        Suspend,
        Resume(Autoload),
        Invalidate,
        Set(u32, u32, u32),
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<Op>,
        status: i32,
    }

    impl CacheController for Recorder {
        fn suspend(&mut self, _cache: CacheKind) -> Autoload {
            self.ops.push(Op::Suspend);
            Autoload(0x5A)
        }
        fn resume(&mut self, _cache: CacheKind, autoload: Autoload) {
            self.ops.push(Op::Resume(autoload));
        }
        fn invalidate_all(&mut self, _cache: CacheKind) {
            self.ops.push(Op::Invalidate);
        }
        fn mmu_set(&mut self, _bus: MmuBus, vaddr: u32, paddr: u32, count: u32) -> i32 {
            self.ops.push(Op::Set(vaddr, paddr, count));
            self.status
        }
        fn mmu_init(&mut self) {}
        fn load_word(&self, _vaddr: u32) -> u32 {
            0
        }
    }

    #[test]
    fn test_remap_sequence() {
        let mut cache = Recorder::default();
        {
            let mut parked = Suspended::invalidated(&mut cache, CacheKind::Data);
            parked.remap(MmuBus::Dbus, 0x3C00_0000, 0x2_0000, 2).unwrap();
        }
        assert_eq!(
            cache.ops,
            [
                Op::Suspend,
                Op::Invalidate,
                Op::Set(0x3C00_0000, 0x2_0000, 2),
                Op::Resume(Autoload(0x5A)),
            ]
        );
    }

    #[test]
    fn test_failed_remap_still_resumes() {
        let mut cache = Recorder {
            status: 3,
            ..Default::default()
        };
        let result = Suspended::invalidated(&mut cache, CacheKind::Instruction).remap(
            MmuBus::Ibus,
            0x3F00_0000,
            0,
            1,
        );
        assert_eq!(result, Err(Error::RemapFailed(3)));
        assert_eq!(cache.ops.last(), Some(&Op::Resume(Autoload(0x5A))));
    }

    #[test]
    fn test_plain_suspend_skips_invalidate() {
        let mut cache = Recorder::default();
        drop(Suspended::new(&mut cache, CacheKind::Instruction));
        assert_eq!(cache.ops, [Op::Suspend, Op::Resume(Autoload(0x5A))]);
    }
}
