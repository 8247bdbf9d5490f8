//! CLI command implementations
//!
//! Every command runs against a [`Session`]: an emulated chip loaded from
//! the image file, plus the driver configuration. Commands that change
//! flash contents write the image back when they succeed.

pub mod erase;
pub mod info;
pub mod read;
pub mod write;

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use bootflash_core::config::{DEFAULT_BLOCK_SIZE, DEFAULT_SECTOR_SIZE};
use bootflash_core::{BootFlash, FlashConfig, FlashGeometry};
use bootflash_dummy::{DummyChip, DummyConfig};
use indicatif::ProgressStyle;

use crate::cli::DeviceArgs;
use crate::error::CliError;

/// Chunk size for progress-reported reads and writes (4 KiB)
pub const CHUNK_SIZE: usize = 4096;

/// Driver type every command works with
pub type Flash = BootFlash<DummyChip, DummyChip, DummyChip>;

/// An emulated chip backed by an image file
pub struct Session {
    /// The emulated hardware
    pub chip: DummyChip,
    /// Driver configuration
    pub config: FlashConfig,
    image: PathBuf,
}

impl Session {
    /// Load the configuration and the image
    pub fn open(args: &DeviceArgs) -> Result<Self, CliError> {
        let config = load_config(args)?;
        let geometry = config.geometry;

        let data = match fs::read(&args.image) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("{} not found, starting from an erased chip", args.image.display());
                Vec::new()
            }
            Err(e) => return Err(CliError::io(&args.image, e)),
        };
        if data.len() > geometry.size as usize {
            log::warn!(
                "image is {} bytes, truncating to the {} byte flash",
                data.len(),
                geometry.size
            );
        }

        let dummy = DummyConfig {
            device_id: args.device_id & 0xFF_FFFF,
            size: geometry.size as usize,
            sector_size: geometry.sector_size as usize,
            block_size: geometry.block_size as usize,
            sr1: args.status as u8,
            sr2: (args.status >> 8) as u8,
            encryption_key: args.key,
            ..Default::default()
        };
        log::debug!("emulating chip 0x{:06X} on {}", dummy.device_id, config.target);

        Ok(Self {
            chip: DummyChip::with_data(dummy, &data),
            config,
            image: args.image.clone(),
        })
    }

    /// Build a driver on the emulated chip
    pub fn flash(&self) -> Flash {
        self.chip.boot_flash(self.config)
    }

    /// Flash size in bytes
    pub fn size(&self) -> u32 {
        self.config.geometry.size
    }

    /// Check that `[addr, addr + len)` lies inside the flash
    pub fn check_range(&self, addr: u32, len: u32) -> Result<(), CliError> {
        match addr.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(CliError::OutOfRange(format!(
                "0x{:X}+0x{:X} exceeds flash size 0x{:X}",
                addr,
                len,
                self.size()
            ))),
        }
    }

    /// Write the chip contents back to the image file
    pub fn save(&self) -> Result<(), CliError> {
        fs::write(&self.image, self.chip.contents()).map_err(|e| CliError::io(&self.image, e))?;
        log::debug!("saved {}", self.image.display());
        Ok(())
    }
}

fn load_config(args: &DeviceArgs) -> Result<FlashConfig, CliError> {
    if let Some(path) = &args.config {
        let config = FlashConfig::load(path)?;
        log::info!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    let mut config = FlashConfig::for_target(args.target.unwrap_or_default());
    if let Some(size) = args.size {
        config = config.with_geometry(FlashGeometry::new(
            size,
            DEFAULT_SECTOR_SIZE,
            DEFAULT_BLOCK_SIZE,
        )?);
    }
    Ok(config)
}

/// Byte progress bar in the style shared by read and write
pub fn byte_progress_style() -> Result<ProgressStyle, CliError> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
        .progress_chars("#>-"))
}
