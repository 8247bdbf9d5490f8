//! Per-target cache and MMU variants
//!
//! Every chip family suspends a different cache and programs a different
//! MMU bus, and the legacy ESP32 cache has no suspend at all (it is
//! disabled and flushed instead). The choice is made once, when the driver
//! is built from a [`Target`], instead of at every call site.

use core::fmt;
use core::str::FromStr;

/// Size of one MMU page (the window granularity)
pub const MMU_PAGE_SIZE: u32 = 0x1_0000;

/// Mask that rounds a flash address down to its MMU page
pub const MMU_PAGE_MASK: u32 = !(MMU_PAGE_SIZE - 1);

/// Which cache must be parked around a remap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// ESP32 PRO CPU cache: disable + flush, no autoload state
    Legacy,
    /// Instruction cache
    Instruction,
    /// Data cache
    Data,
}

/// Which MMU programming entry point maps the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuBus {
    /// ESP32 `cache_flash_mmu_set`
    Legacy,
    /// Instruction bus MMU
    Ibus,
    /// Data bus MMU
    Dbus,
}

/// Supported chip families
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Target {
    /// ESP32
    #[default]
    Esp32,
    /// ESP32-S2
    Esp32s2,
    /// ESP32-S3
    Esp32s3,
    /// ESP32-C3
    Esp32c3,
    /// ESP32-H2
    Esp32h2,
}

impl Target {
    /// All supported targets
    pub const ALL: [Target; 5] = [
        Target::Esp32,
        Target::Esp32s2,
        Target::Esp32s3,
        Target::Esp32c3,
        Target::Esp32h2,
    ];

    /// Short lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            Target::Esp32 => "esp32",
            Target::Esp32s2 => "esp32s2",
            Target::Esp32s3 => "esp32s3",
            Target::Esp32c3 => "esp32c3",
            Target::Esp32h2 => "esp32h2",
        }
    }

    /// Cache that fetches from the mapped flash window
    pub const fn cache(self) -> CacheKind {
        match self {
            Target::Esp32 => CacheKind::Legacy,
            Target::Esp32s2 | Target::Esp32c3 | Target::Esp32h2 => CacheKind::Instruction,
            Target::Esp32s3 => CacheKind::Data,
        }
    }

    /// MMU bus the window is programmed on
    pub const fn mmu_bus(self) -> MmuBus {
        match self {
            Target::Esp32 => MmuBus::Legacy,
            Target::Esp32s2 => MmuBus::Ibus,
            Target::Esp32s3 | Target::Esp32c3 | Target::Esp32h2 => MmuBus::Dbus,
        }
    }

    /// Lowest data ROM virtual address; the mmap region starts here
    pub const fn drom_base(self) -> u32 {
        match self {
            Target::Esp32 => 0x3F40_0000,
            Target::Esp32s2 => 0x3F00_0000,
            Target::Esp32s3 | Target::Esp32c3 | Target::Esp32h2 => 0x3C00_0000,
        }
    }

    /// Size of the general mmap region
    ///
    /// The page right after it is reserved for the decrypting read window.
    pub const fn mmap_region_size(self) -> u32 {
        match self {
            Target::Esp32 => 0x32_0000,
            _ => 0x3F_0000,
        }
    }

    /// Virtual address of the single-page read window
    pub const fn read_window_base(self) -> u32 {
        self.drom_base() + self.mmap_region_size()
    }

    /// Whether plain reads must flush the cache as well as park it
    pub const fn flush_on_suspend(self) -> bool {
        matches!(self.cache(), CacheKind::Legacy)
    }

    /// Whether the cache supports burst wrap mode
    pub const fn supports_wrap(self) -> bool {
        matches!(self, Target::Esp32s2 | Target::Esp32s3 | Target::Esp32c3)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown target name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownTarget;

impl fmt::Display for UnknownTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown target (expected one of esp32, esp32s2, esp32s3, esp32c3, esp32h2)")
    }
}

impl FromStr for Target {
    type Err = UnknownTarget;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Target::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownTarget)
    }
}

/// Number of MMU pages needed to map `size` bytes starting at `addr`
pub fn pages_to_map(addr: u32, size: u32) -> u32 {
    let offset = addr - (addr & MMU_PAGE_MASK);
    (size + offset).div_ceil(MMU_PAGE_SIZE)
}
