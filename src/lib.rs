//! Use spare PS3 GDDR video memory as an MTD-style RAM device.
//!
//! The crate is split the same way the hardware stack is:
//!
//! - [`lv1`]: the hypervisor boundary (GPU memory grants, LPAR mapping).
//! - [`mtd`]: the generic storage framework boundary (descriptors, handlers, registry).
//! - [`vram`]: the device itself, its bounds-checked window and the driver lifecycle.

pub mod config;
pub mod error;
pub mod lv1;
pub mod mtd;
pub mod utils;
pub mod vram;

pub use config::VramConfig;
pub use error::{VramError, VramResult};
pub use lv1::{Hypervisor, Lv1Status};
pub use mtd::{EraseInfo, EraseState, MtdFlags, MtdInfo, MtdOps, MtdRegistry, MtdTable, MtdType};
pub use vram::{VramDevice, VramDriver, VramWindow};
