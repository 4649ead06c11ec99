use crate::error::{VramError, VramResult};
use crate::lv1::Hypervisor;
use crate::lv1::call::GpuMemoryAllocateArgs;
use std::fmt;
use std::sync::Arc;

/// A live `lv1_gpu_memory_allocate` grant.
///
/// The grant is freed exactly once, when this value is dropped.
pub struct GpuMemory {
    hv: Arc<dyn Hypervisor>,
    memory_handle: u64,
    ddr_lpar: u64,
    size: u64,
}

impl GpuMemory {
    /// Request `size` bytes of GDDR with default placement.
    ///
    /// # Errors
    /// Returns `VramError::Grant` with the hypervisor status if the call fails.
    pub fn allocate(hv: Arc<dyn Hypervisor>, size: u64) -> VramResult<Self> {
        let mut args = GpuMemoryAllocateArgs::new(size);
        let status = hv.gpu_memory_allocate(&mut args);
        if !status.is_success() {
            log::error!("ps3vram: lv1_gpu_memory_allocate failed: {status}");
            return Err(VramError::Grant(status));
        }

        log::debug!(
            "ps3vram: granted {size} bytes, handle 0x{:x} lpar 0x{:x}",
            args.memory_handle,
            args.ddr_lpar
        );

        Ok(Self {
            hv,
            memory_handle: args.memory_handle,
            ddr_lpar: args.ddr_lpar,
            size,
        })
    }

    #[must_use]
    pub const fn memory_handle(&self) -> u64 {
        self.memory_handle
    }

    #[must_use]
    pub const fn ddr_lpar(&self) -> u64 {
        self.ddr_lpar
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn hypervisor(&self) -> &Arc<dyn Hypervisor> {
        &self.hv
    }
}

impl Drop for GpuMemory {
    fn drop(&mut self) {
        let status = self.hv.gpu_memory_free(self.memory_handle);
        if status.is_success() {
            log::debug!("ps3vram: freed GPU memory handle 0x{:x}", self.memory_handle);
        } else {
            log::warn!(
                "ps3vram: lv1_gpu_memory_free(0x{:x}) failed: {status}",
                self.memory_handle
            );
        }
    }
}

impl fmt::Debug for GpuMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuMemory")
            .field("memory_handle", &format_args!("0x{:x}", self.memory_handle))
            .field("ddr_lpar", &format_args!("0x{:x}", self.ddr_lpar))
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
