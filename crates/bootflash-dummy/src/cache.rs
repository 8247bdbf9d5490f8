//! Cache and MMU page table

use bootflash_core::hal::{Autoload, CacheController, CacheKind, MmuBus, MMU_PAGE_MASK, MMU_PAGE_SIZE};

use crate::{DummyChip, Op};

impl CacheController for DummyChip {
    fn suspend(&mut self, cache: CacheKind) -> Autoload {
        let mut state = self.state_mut();
        state.ops.push(Op::Suspend(cache));
        let autoload = Autoload(state.next_autoload);
        state.next_autoload += 1;
        state.suspended = Some((cache, autoload));
        autoload
    }

    fn resume(&mut self, cache: CacheKind, autoload: Autoload) {
        let mut state = self.state_mut();
        state.ops.push(Op::Resume(cache, autoload));
        if state.suspended != Some((cache, autoload)) {
            log::warn!("dummy: resume {:?} {:?} does not match suspend", cache, autoload);
            state.stray_resumes += 1;
        }
        state.suspended = None;
    }

    fn invalidate_all(&mut self, cache: CacheKind) {
        self.state_mut().ops.push(Op::Invalidate(cache));
    }

    fn mmu_set(&mut self, bus: MmuBus, vaddr: u32, paddr: u32, count: u32) -> i32 {
        let mut state = self.state_mut();
        state.ops.push(Op::MmuSet {
            bus,
            vaddr,
            paddr,
            count,
        });
        if state.mmu_status != 0 {
            return state.mmu_status;
        }
        if vaddr & !MMU_PAGE_MASK != 0 || paddr & !MMU_PAGE_MASK != 0 {
            return -1;
        }
        for page in 0..count {
            let offset = page * MMU_PAGE_SIZE;
            state.mmu.insert(vaddr + offset, paddr + offset);
        }
        0
    }

    fn mmu_init(&mut self) {
        let mut state = self.state_mut();
        state.ops.push(Op::MmuInit);
        state.mmu.clear();
    }

    fn load_word(&self, vaddr: u32) -> u32 {
        let state = self.state();
        let Some(page) = state.mmu.get(&(vaddr & MMU_PAGE_MASK)) else {
            log::warn!("dummy: load from unmapped address 0x{:08X}", vaddr);
            return 0;
        };
        let paddr = page + (vaddr & !MMU_PAGE_MASK);
        let Some(range) = state.span(paddr, 4) else {
            return 0;
        };
        let raw = &state.data[range];
        let word = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        // Inline decryption of the mapped bus
        word ^ state.config.encryption_key.unwrap_or(0)
    }
}
