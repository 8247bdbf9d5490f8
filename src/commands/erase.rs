//! Erase command implementations

use std::time::Duration;

use bootflash_core::flash::{ErasePlan, EraseStep};
use indicatif::{ProgressBar, ProgressStyle};

use super::Session;
use crate::error::CliError;

/// Run the erase command
pub fn run_erase(session: &Session, addr: u32, length: Option<u32>) -> Result<(), CliError> {
    let length = length.unwrap_or_else(|| session.size().saturating_sub(addr));
    session.check_range(addr, length)?;

    let plan = ErasePlan::new(&session.config.geometry, addr, length)?;
    let (blocks, sectors) = plan.fold((0, 0), |(blocks, sectors), step| match step {
        EraseStep::Block(_) => (blocks + 1, sectors),
        EraseStep::Sector(_) => (blocks, sectors + 1),
    });
    println!(
        "Erasing 0x{:08X} - 0x{:08X}: {} block(s), {} sector(s)",
        addr,
        (addr + length).saturating_sub(1),
        blocks,
        sectors
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Erasing...");

    let result = session.flash().erase_range(addr, length);
    pb.finish_and_clear();
    result?;

    session.save()?;
    println!("Erase complete");
    Ok(())
}

/// Run the erase-sector command
pub fn run_erase_sector(session: &Session, sector: u32) -> Result<(), CliError> {
    let sector_size = session.config.geometry.sector_size;
    let addr = sector.checked_mul(sector_size).unwrap_or(u32::MAX);
    session.check_range(addr, sector_size)?;

    session.flash().erase_sector(sector)?;
    session.save()?;
    println!("Erased sector {} (0x{:08X})", sector, addr);
    Ok(())
}
