//! Read command implementation

use std::fs::File;
use std::io::Write;
use std::path::Path;

use indicatif::ProgressBar;
use zerocopy::IntoBytes;

use super::{byte_progress_style, Session, CHUNK_SIZE};
use crate::error::CliError;

/// Round a read length up to whole words; extra bytes are dropped before saving
fn word_padded(length: u32) -> Result<u32, CliError> {
    length
        .checked_next_multiple_of(4)
        .ok_or_else(|| CliError::OutOfRange(format!("length 0x{:X} is too large", length)))
}

/// Run the read command
pub fn run_read(
    session: &Session,
    addr: u32,
    length: Option<u32>,
    output: &Path,
    decrypt: bool,
) -> Result<(), CliError> {
    let length = length.unwrap_or_else(|| session.size().saturating_sub(addr));
    let padded = word_padded(length)?;
    session.check_range(addr, padded)?;

    let flash = session.flash();
    let mut words = vec![0u32; padded as usize / 4];
    let data = words.as_mut_bytes();

    let pb = ProgressBar::new(padded as u64);
    pb.set_style(byte_progress_style()?);

    let mut offset = 0usize;
    for chunk in data.chunks_mut(CHUNK_SIZE) {
        flash.read(addr + offset as u32, chunk, decrypt)?;
        offset += chunk.len();
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Read complete");

    let mut file = File::create(output).map_err(|e| CliError::io(output, e))?;
    file.write_all(&data[..length as usize]).map_err(|e| CliError::io(output, e))?;

    println!(
        "Read {} bytes from 0x{:08X}{} to {:?}",
        length,
        addr,
        if decrypt { " (decrypted)" } else { "" },
        output
    );
    Ok(())
}
