#![allow(dead_code)]

use ps3vram_rs::error::{VramError, VramResult};
use ps3vram_rs::lv1::call::{GpuMemoryAllocateArgs, LV1_RESOURCE_SHORTAGE};
use ps3vram_rs::lv1::{Hypervisor, Lv1Status, MemfdHypervisor};
use ps3vram_rs::mtd::{MtdInfo, MtdOps, MtdRegistry};
use std::io;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Wraps a `MemfdHypervisor`, counting every call and failing on demand.
#[derive(Default)]
pub struct RecordingHypervisor {
    pub inner: MemfdHypervisor,
    pub fail_allocate: AtomicBool,
    pub fail_ioremap: AtomicBool,
    pub allocates: AtomicUsize,
    pub frees: AtomicUsize,
    pub ioremaps: AtomicUsize,
    pub iounmaps: AtomicUsize,
}

impl RecordingHypervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_allocate() -> Arc<Self> {
        let hv = Self::default();
        hv.fail_allocate.store(true, Ordering::SeqCst);
        Arc::new(hv)
    }

    pub fn failing_ioremap() -> Arc<Self> {
        let hv = Self::default();
        hv.fail_ioremap.store(true, Ordering::SeqCst);
        Arc::new(hv)
    }

    /// (allocates, frees, ioremaps, iounmaps)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.allocates.load(Ordering::SeqCst),
            self.frees.load(Ordering::SeqCst),
            self.ioremaps.load(Ordering::SeqCst),
            self.iounmaps.load(Ordering::SeqCst),
        )
    }
}

impl Hypervisor for RecordingHypervisor {
    fn gpu_memory_allocate(&self, args: &mut GpuMemoryAllocateArgs) -> Lv1Status {
        self.allocates.fetch_add(1, Ordering::SeqCst);
        if self.fail_allocate.load(Ordering::SeqCst) {
            return Lv1Status(LV1_RESOURCE_SHORTAGE);
        }
        self.inner.gpu_memory_allocate(args)
    }

    fn gpu_memory_free(&self, memory_handle: u64) -> Lv1Status {
        self.frees.fetch_add(1, Ordering::SeqCst);
        self.inner.gpu_memory_free(memory_handle)
    }

    fn ioremap(&self, lpar: u64, size: usize) -> io::Result<NonNull<u8>> {
        self.ioremaps.fetch_add(1, Ordering::SeqCst);
        if self.fail_ioremap.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "injected ioremap failure"));
        }
        self.inner.ioremap(lpar, size)
    }

    fn iounmap(&self, addr: NonNull<u8>, size: usize) {
        self.iounmaps.fetch_add(1, Ordering::SeqCst);
        self.inner.iounmap(addr, size);
    }
}

/// A storage framework that refuses every device.
#[derive(Default)]
pub struct RejectingRegistry {
    pub adds: AtomicUsize,
    pub dels: AtomicUsize,
}

impl MtdRegistry for RejectingRegistry {
    fn add_mtd_device(&self, info: MtdInfo, _ops: Arc<dyn MtdOps>) -> VramResult<usize> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        Err(VramError::Registration(format!("{}: refused", info.name)))
    }

    fn del_mtd_device(&self, _index: usize) -> VramResult<()> {
        self.dels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
