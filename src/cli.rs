//! CLI argument parsing

use bootflash_core::Target;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a chip family name
fn parse_target(s: &str) -> Result<Target, String> {
    s.parse::<Target>().map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "bootflash")]
#[command(author, version, about = "Boot-time flash driver on an emulated chip", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options describing the emulated device
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Flash image backing the emulated chip (created if missing)
    #[arg(long, global = true, default_value = "flash.bin")]
    pub image: PathBuf,

    /// Driver configuration file (TOML format)
    #[arg(long, global = true, conflicts_with_all = ["target", "size"])]
    pub config: Option<PathBuf>,

    /// Chip family [esp32, esp32s2, esp32s3, esp32c3, esp32h2]
    #[arg(long, global = true, value_parser = parse_target)]
    pub target: Option<Target>,

    /// Flash size (hex or decimal)
    #[arg(long, global = true, value_parser = parse_hex_u32)]
    pub size: Option<u32>,

    /// 24-bit JEDEC ID the emulated chip reports
    #[arg(long, global = true, value_parser = parse_hex_u32, default_value = "0xEF4018")]
    pub device_id: u32,

    /// Initial status registers as SR1 | SR2 << 8
    #[arg(long, global = true, value_parser = parse_hex_u32, default_value = "0")]
    pub status: u32,

    /// Flash encryption key (enables the emulated encryption engine)
    #[arg(long, global = true, value_parser = parse_hex_u32)]
    pub key: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show target, geometry and window information
    Info,

    /// Read flash contents to a file
    Read {
        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Number of bytes to read (defaults to the rest of the flash)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Read through the decrypting window
        #[arg(long)]
        decrypt: bool,
    },

    /// Write a file to flash
    Write {
        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Write through the encryption engine
        #[arg(long)]
        encrypt: bool,

        /// Erase the covered sectors first
        #[arg(long)]
        erase: bool,
    },

    /// Erase a sector-aligned range
    Erase {
        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Length of the range (defaults to the rest of the flash)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Erase one sector by index
    EraseSector {
        /// Sector index
        #[arg(value_parser = parse_hex_u32)]
        sector: u32,
    },

    /// Clear the chip's block protection
    Unlock,

    /// Map a region through the mmap window and hex dump it
    Map {
        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes to map
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x100")]
        length: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x10000"), Ok(0x1_0000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_conflicts_with_target() {
        let parsed = Cli::try_parse_from([
            "bootflash",
            "--config",
            "flash.toml",
            "--target",
            "esp32s3",
            "info",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_read() {
        let cli = Cli::try_parse_from([
            "bootflash",
            "read",
            "--addr",
            "0x1000",
            "--length",
            "64",
            "-o",
            "out.bin",
            "--decrypt",
            "--target",
            "esp32c3",
        ])
        .unwrap();
        assert_eq!(cli.device.target, Some(Target::Esp32c3));
        match cli.command {
            Commands::Read {
                addr,
                length,
                decrypt,
                ..
            } => {
                assert_eq!(addr, 0x1000);
                assert_eq!(length, Some(64));
                assert!(decrypt);
            }
            _ => panic!("expected read"),
        }
    }
}
