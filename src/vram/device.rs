#![allow(clippy::cast_possible_truncation)]

use super::grant::GpuMemory;
use super::window::{Mapping, VramWindow};
use crate::config::VramConfig;
use crate::error::{VramError, VramResult};
use crate::lv1::Hypervisor;
use crate::mtd::{ERASED_BYTE, EraseInfo, EraseState, MtdFlags, MtdInfo, MtdOps, MtdType};
use std::fmt;
use std::sync::Arc;

/// The VRAM device: one grant, its mapping, and the usable window behind the skip prefix.
///
/// Holding a `VramDevice` means both the grant and the mapping are live; dropping
/// it unmaps first and then frees the grant.
pub struct VramDevice {
    // Fields drop in declaration order: the mapping must go before the grant.
    mapping: Mapping,
    grant: GpuMemory,
    skip: usize,
}

impl VramDevice {
    /// Allocate, map and carve out the usable window.
    ///
    /// No resource is left behind on failure: a mapping failure frees the grant
    /// before the error is returned.
    ///
    /// # Errors
    /// `InvalidConfig` before anything is requested, `Grant` if LV1 refuses the
    /// allocation, `Map` if the grant cannot be mapped.
    pub fn initialize(hv: Arc<dyn Hypervisor>, config: &VramConfig) -> VramResult<Self> {
        config.validate()?;
        let grant = GpuMemory::allocate(hv, config.grant_size)?;
        Self::map(grant, config.skip_size).map_err(|(grant, e)| {
            drop(grant);
            e
        })
    }

    /// Map `grant` and skip its first `skip_size` bytes.
    ///
    /// On failure the grant is handed back untouched together with the error,
    /// so the caller decides how to release it.
    ///
    /// # Errors
    /// `InvalidConfig` if `skip_size` does not fit inside the grant, `Map` if
    /// the grant cannot be mapped.
    pub fn map(grant: GpuMemory, skip_size: u64) -> Result<Self, (GpuMemory, VramError)> {
        let skip = match usize::try_from(skip_size) {
            Ok(skip) if skip_size < grant.size() => skip,
            _ => {
                let e = VramError::InvalidConfig(format!(
                    "skip size {skip_size} leaves nothing of the {} byte grant",
                    grant.size()
                ));
                return Err((grant, e));
            }
        };

        match Mapping::ioremap(&grant) {
            Ok(mapping) => Ok(Self {
                mapping,
                grant,
                skip,
            }),
            Err(e) => Err((grant, e)),
        }
    }

    /// Split the device back into the resources it owns.
    #[must_use]
    pub fn into_parts(self) -> (GpuMemory, Mapping) {
        (self.grant, self.mapping)
    }

    #[must_use]
    pub fn window(&self) -> VramWindow<'_> {
        self.mapping.window(self.skip)
    }

    #[must_use]
    pub const fn memory_handle(&self) -> u64 {
        self.grant.memory_handle()
    }

    #[must_use]
    pub const fn ddr_lpar(&self) -> u64 {
        self.grant.ddr_lpar()
    }

    /// Size of the whole grant.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.grant.size()
    }

    #[must_use]
    pub const fn skip_size(&self) -> u64 {
        self.skip as u64
    }

    /// Start of the raw mapping.
    #[must_use]
    pub const fn real_base(&self) -> *const u8 {
        self.mapping.base()
    }

    /// Start of the usable window (`real_base + skip_size`).
    #[must_use]
    pub fn usable_base(&self) -> *const u8 {
        self.window().base()
    }

    /// Bytes addressable through the device (`total_size - skip_size`).
    #[must_use]
    pub fn usable_size(&self) -> u64 {
        self.window().size() as u64
    }

    /// Read up to `len` bytes at `offset`; the length is clamped to the window.
    ///
    /// # Errors
    /// `OutOfRange` if `offset >= usable_size`.
    pub fn read(&self, offset: u64, len: usize) -> VramResult<Vec<u8>> {
        self.window().read(offset, len)
    }

    /// Write as much of `data` as fits at `offset`. Returns the bytes written.
    ///
    /// # Errors
    /// `OutOfRange` if `offset >= usable_size`.
    pub fn write(&self, offset: u64, data: &[u8]) -> VramResult<usize> {
        self.window().write(offset, data)
    }

    /// Set `offset..offset + len` to the erased value `0xFF`.
    ///
    /// # Errors
    /// `OutOfRange` if `offset + len > usable_size`; nothing is modified.
    pub fn erase(&self, offset: u64, len: u64) -> VramResult<()> {
        self.window().fill(offset, len, ERASED_BYTE)
    }

    /// Descriptor this device registers with.
    #[must_use]
    pub fn mtd_info(&self, config: &VramConfig) -> MtdInfo {
        MtdInfo {
            name: config.name.clone(),
            mtd_type: MtdType::Ram,
            flags: MtdFlags::new().ram().eraseable().volatile(),
            size: self.usable_size(),
            erasesize: config.erase_size,
            writesize: 1,
        }
    }
}

impl MtdOps for VramDevice {
    fn read(&self, from: u64, buf: &mut [u8]) -> VramResult<usize> {
        self.window().read_into(from, buf)
    }

    fn write(&self, to: u64, buf: &[u8]) -> VramResult<usize> {
        self.window().write(to, buf)
    }

    fn erase(&self, instr: &mut EraseInfo) -> VramResult<()> {
        self.erase(instr.addr, instr.len)?;
        instr.complete(EraseState::Done);
        Ok(())
    }
}

impl fmt::Debug for VramDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VramDevice")
            .field("grant", &self.grant)
            .field("real_base", &self.real_base())
            .field("usable_base", &self.usable_base())
            .field("usable_size", &self.usable_size())
            .finish()
    }
}
