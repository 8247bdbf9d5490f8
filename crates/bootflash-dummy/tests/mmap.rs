//! The single mmap window

use bootflash_core::hal::{Target, MMU_PAGE_SIZE};
use bootflash_core::{ArgumentError, Error, FlashConfig};
use bootflash_dummy::{DummyChip, Op};
use zerocopy::IntoBytes;

fn mmu_sets(ops: &[Op]) -> usize {
    ops.iter().filter(|op| matches!(op, Op::MmuSet { .. })).count()
}

#[test]
fn test_second_mmap_is_rejected() {
    let chip = DummyChip::new_default();
    let target = Target::Esp32s3;
    let flash = chip.boot_flash(FlashConfig::for_target(target));

    let first = flash.mmap(0x2_1234, 0x100).unwrap();
    assert_eq!(first.vaddr(), target.drom_base() + 0x1234);
    assert_eq!(first.flash_page(), 0x2_0000);
    assert_eq!(chip.mmu_entry(target.drom_base()), Some(0x2_0000));

    assert_eq!(flash.mmap(0x30_0000, 0x100).unwrap_err(), Error::AlreadyMapped);

    // The live mapping still points where it did
    assert_eq!(first.vaddr(), target.drom_base() + 0x1234);
    assert_eq!(chip.mmu_entry(target.drom_base()), Some(0x2_0000));
    assert_eq!(mmu_sets(&chip.ops()), 1);

    flash.munmap(first);
    assert!(!flash.is_mapped());
    let second = flash.mmap(0x30_0000, 0x100).unwrap();
    assert_eq!(chip.mmu_entry(second.vaddr()), Some(0x30_0000));
}

#[test]
fn test_mapping_reads_flash() {
    let chip = DummyChip::new_default();
    let words: [u32; 4] = [0x0302_0100, 0x0706_0504, 0x0B0A_0908, 0x0F0E_0D0C];
    chip.fill(0x1_FFF8, words.as_bytes());
    let flash = chip.boot_flash(FlashConfig::for_target(Target::Esp32c3));

    // Crosses into the second page
    let mapping = flash.mmap(0x1_FFF8, 16).unwrap();
    assert_eq!(mapping.page_count(), 2);
    assert_eq!(mapping.read_word(0).unwrap(), 0x0302_0100);
    assert_eq!(mapping.read_word(12).unwrap(), 0x0F0E_0D0C);

    let mut bytes = [0u8; 6];
    mapping.read(5, &mut bytes).unwrap();
    assert_eq!(bytes, [5, 6, 7, 8, 9, 10]);

    assert_eq!(
        mapping.read_word(16),
        Err(Error::InvalidArgument(ArgumentError::OutOfWindow {
            offset: 16,
            len: 16
        }))
    );
    assert!(mapping.read_word(2).is_err());
}

#[test]
fn test_drop_resets_mmu() {
    let chip = DummyChip::new_default();
    let target = Target::Esp32s2;
    let flash = chip.boot_flash(FlashConfig::for_target(target));

    let mut buf = [0u32; 1];
    flash.read(0x5_0000, buf.as_mut_bytes(), true).unwrap();
    assert_eq!(flash.read_window_page(), Some(0x5_0000));

    {
        let _mapping = flash.mmap(0, MMU_PAGE_SIZE).unwrap();
        assert!(flash.is_mapped());
    }

    assert!(!flash.is_mapped());
    assert_eq!(flash.read_window_page(), None);
    assert_eq!(chip.mmu_entry(target.drom_base()), None);
    assert_eq!(chip.mmu_entry(target.read_window_base()), None);

    let ops = chip.ops();
    assert!(matches!(
        ops[ops.len() - 4..],
        [
            Op::Suspend(_),
            Op::Invalidate(_),
            Op::MmuInit,
            Op::Resume(_, _)
        ]
    ));
    assert_eq!(chip.stray_resumes(), 0);

    // Next decrypting read has to map its page again
    chip.take_ops();
    flash.read(0x5_0000, buf.as_mut_bytes(), true).unwrap();
    assert_eq!(mmu_sets(&chip.ops()), 1);
}

#[test]
fn test_mapping_too_large() {
    let chip = DummyChip::new_default();
    let flash = chip.boot_flash(FlashConfig::for_target(Target::Esp32));
    let max = Target::Esp32.mmap_region_size();

    assert_eq!(
        flash.mmap(0, max + 1).unwrap_err(),
        Error::InvalidArgument(ArgumentError::MappingTooLarge { size: max + 1, max })
    );
    assert!(chip.ops().is_empty());

    let mapping = flash.mmap(0, max).unwrap();
    assert_eq!(mapping.page_count(), 50);
}

#[test]
fn test_failed_remap_leaves_window_free() {
    let chip = DummyChip::new_default();
    chip.set_mmu_status(-2);
    let flash = chip.boot_flash(FlashConfig::for_target(Target::Esp32h2));

    assert_eq!(flash.mmap(0x1_0000, 4).unwrap_err(), Error::RemapFailed(-2));
    assert!(!flash.is_mapped());
    assert!(!chip.is_cache_suspended());

    let mut buf = [0u32; 1];
    assert_eq!(
        flash.read(0, buf.as_mut_bytes(), true),
        Err(Error::RemapFailed(-2))
    );
    assert_eq!(flash.read_window_page(), None);

    chip.set_mmu_status(0);
    assert!(flash.mmap(0x1_0000, 4).is_ok());
}

#[test]
fn test_unaligned_mapping_cannot_reach_read_window() {
    let chip = DummyChip::new_default();
    chip.fill(0x5_0000, &[0x11; 4]);
    let target = Target::Esp32s3;
    let flash = chip.boot_flash(FlashConfig::for_target(target));

    let mut buf = [0u32; 1];
    flash.read(0x5_0000, buf.as_mut_bytes(), true).unwrap();
    assert_eq!(buf[0], 0x1111_1111);

    // A full-region mapping starting mid-page needs one page too many
    let max = target.mmap_region_size();
    assert_eq!(
        flash.mmap(0x1_0004, max).unwrap_err(),
        Error::InvalidArgument(ArgumentError::MappingTooLarge { size: max, max })
    );
    assert!(!flash.is_mapped());
    assert_eq!(chip.mmu_entry(target.read_window_base()), Some(0x5_0000));

    chip.take_ops();
    buf[0] = 0;
    flash.read(0x5_0000, buf.as_mut_bytes(), true).unwrap();
    assert_eq!(buf[0], 0x1111_1111);
    assert_eq!(mmu_sets(&chip.ops()), 0);

    let mapping = flash.mmap(0x1_0004, max - 4).unwrap();
    assert_eq!(mapping.page_count(), flash.free_page_count());
}
