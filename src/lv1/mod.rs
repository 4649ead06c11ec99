pub mod call;
pub mod memfd;

use call::{GpuMemoryAllocateArgs, LV1_SUCCESS, status_name};
use std::fmt;
use std::io;
use std::ptr::NonNull;

/// Raw status returned by an LV1 hypervisor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lv1Status(pub i64);

impl Lv1Status {
    pub const SUCCESS: Self = Self(LV1_SUCCESS);

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == LV1_SUCCESS
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        status_name(self.0)
    }
}

impl fmt::Display for Lv1Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// The privileged memory layer: GPU memory grants and their CPU mappings.
///
/// Implementations must be shareable; the grant and mapping guards keep an
/// `Arc<dyn Hypervisor>` so they can release themselves on drop.
pub trait Hypervisor: Send + Sync {
    /// `lv1_gpu_memory_allocate`.
    ///
    /// On success, `args.memory_handle` and `args.ddr_lpar` are populated.
    fn gpu_memory_allocate(&self, args: &mut GpuMemoryAllocateArgs) -> Lv1Status;

    /// `lv1_gpu_memory_free`.
    fn gpu_memory_free(&self, memory_handle: u64) -> Lv1Status;

    /// Map `size` bytes starting at an LPAR address into the caller's address space.
    ///
    /// # Errors
    /// Returns an error if the range does not belong to a live grant or the mapping fails.
    fn ioremap(&self, lpar: u64, size: usize) -> io::Result<NonNull<u8>>;

    /// Undo a mapping created by [`Hypervisor::ioremap`].
    fn iounmap(&self, addr: NonNull<u8>, size: usize);
}

pub use memfd::MemfdHypervisor;
