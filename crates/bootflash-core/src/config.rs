//! Driver configuration
//!
//! A [`FlashConfig`] fixes everything the driver needs to know up front:
//! the chip family (which selects the cache/MMU variants), the flash
//! geometry, and whether flash encryption is virtual.
//!
//! With the `std` feature a configuration can be loaded from TOML:
//!
//! ```toml
//! target = "esp32s3"
//! virtual_encryption = false
//!
//! [geometry]
//! size = "0x400000"
//! sector_size = 4096
//! block_size = "0x10000"
//! ```

use crate::error::{ArgumentError, Error, Result};
use crate::hal::Target;

/// Default sector size (smallest erase unit)
pub const DEFAULT_SECTOR_SIZE: u32 = 0x1000;
/// Default block size (fast erase unit)
pub const DEFAULT_BLOCK_SIZE: u32 = 0x1_0000;
/// Default flash size
pub const DEFAULT_FLASH_SIZE: u32 = 0x40_0000;

/// Flash erase geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlashGeometry {
    /// Total device size in bytes
    #[cfg_attr(feature = "serde", serde(deserialize_with = "de::hex_u32"))]
    pub size: u32,
    /// Sector size in bytes
    #[cfg_attr(feature = "serde", serde(deserialize_with = "de::hex_u32"))]
    pub sector_size: u32,
    /// Block size in bytes; a whole number of sectors
    #[cfg_attr(feature = "serde", serde(deserialize_with = "de::hex_u32"))]
    pub block_size: u32,
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self {
            size: DEFAULT_FLASH_SIZE,
            sector_size: DEFAULT_SECTOR_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl FlashGeometry {
    /// Create a validated geometry
    pub fn new(size: u32, sector_size: u32, block_size: u32) -> Result<Self> {
        let geometry = Self {
            size,
            sector_size,
            block_size,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check that sizes are powers of two and nest properly
    pub fn validate(&self) -> Result<()> {
        let ok = self.sector_size.is_power_of_two()
            && self.block_size.is_power_of_two()
            && self.block_size >= self.sector_size
            && self.size >= self.block_size
            && self.size % self.block_size == 0;
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidArgument(ArgumentError::InvalidGeometry))
        }
    }

    /// Number of sectors in one block
    pub fn sectors_per_block(&self) -> u32 {
        self.block_size / self.sector_size
    }

    /// Number of sectors on the device
    pub fn sector_count(&self) -> u32 {
        self.size / self.sector_size
    }

    /// Returns true if `value` is a multiple of the sector size
    pub fn is_sector_aligned(&self, value: u32) -> bool {
        value % self.sector_size == 0
    }
}

/// Everything the driver is built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlashConfig {
    /// Chip family
    pub target: Target,
    /// Flash erase geometry
    pub geometry: FlashGeometry,
    /// Flash encryption keys are virtual (kept in flash), so encrypted
    /// writes must go through the plain write path
    pub virtual_encryption: bool,
}

impl FlashConfig {
    /// Default configuration for a target
    pub fn for_target(target: Target) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Replace the geometry
    pub fn with_geometry(mut self, geometry: FlashGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Mark flash encryption as virtual
    pub fn with_virtual_encryption(mut self, virtual_encryption: bool) -> Self {
        self.virtual_encryption = virtual_encryption;
        self
    }
}

#[cfg(feature = "std")]
mod toml_config {
    use std::fmt;
    use std::fs;
    use std::path::Path;
    use std::string::{String, ToString};

    use super::FlashConfig;
    use crate::error::Error;

    /// Failure loading a configuration file
    #[derive(Debug)]
    pub enum ConfigError {
        /// The file could not be read
        Io(std::io::Error),
        /// The TOML did not parse
        Parse(String),
        /// The values parsed but are inconsistent
        Invalid(Error),
    }

    impl fmt::Display for ConfigError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
                ConfigError::Parse(msg) => write!(f, "cannot parse config: {}", msg),
                ConfigError::Invalid(e) => write!(f, "invalid config: {}", e),
            }
        }
    }

    impl std::error::Error for ConfigError {}

    impl FlashConfig {
        /// Parse and validate a TOML configuration
        pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
            let config: FlashConfig =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            config.geometry.validate().map_err(ConfigError::Invalid)?;
            Ok(config)
        }

        /// Load a TOML configuration file
        pub fn load(path: &Path) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            Self::from_toml(&content)
        }
    }
}

#[cfg(feature = "std")]
pub use toml_config::ConfigError;

#[cfg(feature = "serde")]
mod de {
    use core::fmt;

    use serde::de::{self, Visitor};
    use serde::Deserializer;

    /// Deserialize a u32 that can be an integer or a "0x..." string
    pub fn hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HexOrInt;

        impl Visitor<'_> for HexOrInt {
            type Value = u32;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
                u32::try_from(v).map_err(|_| E::custom("value does not fit in 32 bits"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
                u32::try_from(v).map_err(|_| E::custom("value does not fit in 32 bits"))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<u32, E> {
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => u32::from_str_radix(hex, 16),
                    None => s.parse::<u32>(),
                };
                parsed.map_err(|_| E::custom("invalid number"))
            }
        }

        deserializer.deserialize_any(HexOrInt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let geometry = FlashGeometry::default();
        assert!(geometry.validate().is_ok());
        assert_eq!(geometry.sectors_per_block(), 16);
        assert_eq!(geometry.sector_count(), 1024);
    }

    #[test]
    fn test_invalid_geometry() {
        let err = Err(Error::InvalidArgument(ArgumentError::InvalidGeometry));
        assert_eq!(FlashGeometry::new(0x40_0000, 0x1000, 0x800), err);
        assert_eq!(FlashGeometry::new(0x40_0000, 0x1800, 0x1_0000), err);
        assert_eq!(FlashGeometry::new(0x8000, 0x1000, 0x1_0000), err);
    }

    #[test]
    fn test_sector_alignment() {
        let geometry = FlashGeometry::default();
        assert!(geometry.is_sector_aligned(0x3000));
        assert!(!geometry.is_sector_aligned(0x3004));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_from_toml() {
        let config = FlashConfig::from_toml(
            r#"
            target = "esp32s3"
            virtual_encryption = true

            [geometry]
            size = "0x800000"
            sector_size = 4096
            block_size = "0x10000"
            "#,
        )
        .unwrap();
        assert_eq!(config.target, Target::Esp32s3);
        assert!(config.virtual_encryption);
        assert_eq!(config.geometry.size, 0x80_0000);
        assert_eq!(config.geometry.sector_size, 0x1000);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_from_toml_defaults_and_validation() {
        let config = FlashConfig::from_toml("target = \"esp32c3\"").unwrap();
        assert_eq!(config.geometry, FlashGeometry::default());
        assert!(!config.virtual_encryption);

        let bad = FlashConfig::from_toml("[geometry]\nsector_size = 3000");
        assert!(matches!(bad, Err(ConfigError::Invalid(_))));
    }
}
