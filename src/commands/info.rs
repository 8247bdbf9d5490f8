//! Informational commands: info, unlock and map

use bootflash_core::hal::MMU_PAGE_SIZE;
use bootflash_core::{QuirkClass, RomFlash};

use super::Session;
use crate::error::CliError;

/// Run the info command
pub fn run_info(session: &Session) {
    let config = &session.config;
    let target = config.target;
    let geometry = config.geometry;
    let (sr1, sr2) = session.chip.status();
    let device_id = session.chip.device_id();

    println!("Target:            {}", target);
    println!("  Cache:           {:?}", target.cache());
    println!("  MMU bus:         {:?}", target.mmu_bus());
    println!(
        "  mmap window:     0x{:08X} ({} KiB)",
        target.drom_base(),
        target.mmap_region_size() / 1024
    );
    println!("  Read window:     0x{:08X}", target.read_window_base());
    println!(
        "  Free mmap pages: {}",
        session.flash().free_page_count()
    );
    println!(
        "  Burst wrap:      {}",
        if target.supports_wrap() { "supported" } else { "not supported" }
    );
    println!();
    println!("Flash:");
    println!("  JEDEC ID:        0x{:06X} ({:?})", device_id, QuirkClass::classify(device_id));
    println!(
        "  Size:            {} bytes ({} MiB)",
        geometry.size,
        geometry.size / (1024 * 1024)
    );
    println!("  Sector size:     {} bytes", geometry.sector_size);
    println!(
        "  Block size:      {} bytes ({} sectors)",
        geometry.block_size,
        geometry.sectors_per_block()
    );
    println!("  Status:          SR1=0x{:02X} SR2=0x{:02X}", sr1, sr2);
    if config.virtual_encryption {
        println!("  Encryption:      virtual");
    }
}

/// Run the unlock command
pub fn run_unlock(session: &Session) -> Result<(), CliError> {
    let outcome = session.flash().unlock();

    println!("Chip class: {:?}", outcome.class);
    for write in &outcome.plan {
        println!(
            "  cmd 0x{:02X} ({} bits): 0x{:04X} -> 0x{:04X}{}",
            write.command,
            write.bits,
            write.current,
            write.target,
            if write.is_needed() { "" } else { " (unchanged)" }
        );
    }

    let (sr1, sr2) = session.chip.status();
    println!("Status now SR1=0x{:02X} SR2=0x{:02X}", sr1, sr2);

    if outcome.writes_issued() > 0 {
        session.save()?;
    }
    Ok(())
}

/// Run the map command: map a region, dump it, unmap it
pub fn run_map(session: &Session, addr: u32, length: u32) -> Result<(), CliError> {
    session.check_range(addr, length)?;

    let flash = session.flash();
    let mapping = flash.mmap(addr, length)?;
    println!(
        "Mapped 0x{:08X}+0x{:X} at 0x{:08X} ({} page(s) of {} KiB)",
        addr,
        length,
        mapping.vaddr(),
        mapping.page_count(),
        MMU_PAGE_SIZE / 1024
    );

    let mut data = vec![0u8; length as usize];
    mapping.read(0, &mut data)?;
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
        println!("{:08X}: {}", addr as usize + i * 16, hex.join(" "));
    }

    flash.munmap(mapping);
    log::debug!("{} free page(s) after unmap", flash.free_page_count());
    Ok(())
}
