//! bootflash - drive the boot-time flash driver from the command line
//!
//! The driver in `bootflash-core` normally runs on the target, before any
//! OS service exists. This tool hosts it on an emulated chip whose
//! contents live in an image file, which makes it possible to inspect
//! what the driver does to a flash image: which erases it batches, how
//! the unlock protocol treats a given vendor, and what the mapping
//! window sees.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins unless -v was given
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match cli.verbose {
        0 => {}
        1 => {
            logger.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            logger.filter_level(log::LevelFilter::Trace);
        }
    }
    logger.init();

    let session = Session::open(&cli.device)?;

    match cli.command {
        Commands::Info => commands::info::run_info(&session),
        Commands::Read {
            addr,
            length,
            output,
            decrypt,
        } => commands::read::run_read(&session, addr, length, &output, decrypt)?,
        Commands::Write {
            addr,
            input,
            encrypt,
            erase,
        } => commands::write::run_write(&session, addr, &input, encrypt, erase)?,
        Commands::Erase { addr, length } => commands::erase::run_erase(&session, addr, length)?,
        Commands::EraseSector { sector } => commands::erase::run_erase_sector(&session, sector)?,
        Commands::Unlock => commands::info::run_unlock(&session)?,
        Commands::Map { addr, length } => commands::info::run_map(&session, addr, length)?,
    }

    Ok(())
}
