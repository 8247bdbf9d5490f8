//! Write command implementation

use std::fs;
use std::path::Path;

use bootflash_core::flash::{ENCRYPTED_ALIGN, WORD_ALIGN};
use indicatif::ProgressBar;
use zerocopy::IntoBytes;

use super::{byte_progress_style, Session, CHUNK_SIZE};
use crate::error::CliError;

/// Run the write command
pub fn run_write(
    session: &Session,
    addr: u32,
    input: &Path,
    encrypt: bool,
    erase: bool,
) -> Result<(), CliError> {
    let contents = fs::read(input).map_err(|e| CliError::io(input, e))?;

    // Pad to the write granularity with erased bytes
    let align = if encrypt { ENCRYPTED_ALIGN } else { WORD_ALIGN } as usize;
    let padded_len = contents.len().next_multiple_of(align);
    if padded_len != contents.len() {
        log::info!(
            "Padding {} bytes to {} with 0xFF",
            contents.len(),
            padded_len
        );
    }
    let mut words = vec![u32::MAX; padded_len / 4];
    words.as_mut_bytes()[..contents.len()].copy_from_slice(&contents);
    let data = words.as_bytes();

    let len = u32::try_from(data.len())
        .map_err(|_| CliError::OutOfRange(format!("{:?} is too large", input)))?;
    session.check_range(addr, len)?;

    let flash = session.flash();

    if erase {
        let sector = session.config.geometry.sector_size;
        let start = addr - addr % sector;
        let end = (addr + len).next_multiple_of(sector);
        println!("Erasing 0x{:08X} - 0x{:08X}", start, end - 1);
        flash.erase_range(start, end - start)?;
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(byte_progress_style()?);

    // Chunks stay multiples of 32 bytes, so encrypted writes stay aligned
    let mut offset = 0usize;
    for chunk in data.chunks(CHUNK_SIZE) {
        flash.write(addr + offset as u32, chunk, encrypt)?;
        offset += chunk.len();
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Write complete");

    session.save()?;
    println!(
        "Wrote {} bytes to 0x{:08X}{}",
        len,
        addr,
        if encrypt { " (encrypted)" } else { "" }
    );
    Ok(())
}
