//! Hardware capabilities and per-target variants
//!
//! This module defines the traits a backend implements to host the
//! driver, the busy-wait primitive, and the target table that selects
//! which cache and MMU entry points apply.

pub mod target;
mod traits;
pub mod wait;

pub use target::{pages_to_map, CacheKind, MmuBus, Target, MMU_PAGE_MASK, MMU_PAGE_SIZE};
pub use traits::*;
pub use wait::{spin_until, Relax, Spin};
