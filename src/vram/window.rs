#![allow(clippy::cast_possible_truncation)]

use super::grant::GpuMemory;
use crate::error::{VramError, VramResult};
use crate::lv1::Hypervisor;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::ops::Range;
use std::ptr::{self, NonNull};
use std::sync::Arc;

/// The CPU mapping of a whole grant (`real_base`). Unmapped exactly once on drop.
pub struct Mapping {
    hv: Arc<dyn Hypervisor>,
    base: NonNull<u8>,
    size: usize,
}

// Safety: the mapping is plain shared memory owned by this value; all access goes
// through raw byte copies bounded by `size`.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    /// `ioremap` the full grant.
    ///
    /// # Errors
    /// Returns `VramError::Map` if the grant size is not addressable or the hypervisor refuses.
    pub fn ioremap(grant: &GpuMemory) -> VramResult<Self> {
        let size = usize::try_from(grant.size()).map_err(|_| {
            VramError::Map(io::Error::new(
                io::ErrorKind::InvalidInput,
                "grant size exceeds the address space",
            ))
        })?;

        let hv = grant.hypervisor().clone();
        let base = hv.ioremap(grant.ddr_lpar(), size).map_err(|e| {
            log::error!("ps3vram: ioremap failed: {e}");
            VramError::Map(e)
        })?;

        Ok(Self { hv, base, size })
    }

    #[must_use]
    pub const fn base(&self) -> *const u8 {
        self.base.as_ptr()
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The part of the mapping after the first `skip` bytes.
    ///
    /// A `skip` past the end yields an empty window.
    #[must_use]
    pub fn window(&self, skip: usize) -> VramWindow<'_> {
        let skip = skip.min(self.size);
        VramWindow {
            // In bounds: skip <= size.
            base: unsafe { self.base.add(skip) },
            size: self.size - skip,
            _mapping: PhantomData,
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        self.hv.iounmap(self.base, self.size);
        log::debug!("ps3vram: unmapped {} bytes at {:p}", self.size, self.base);
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("base", &self.base)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// The usable window: a bounds-checked view over part of a [`Mapping`].
///
/// `read` and `write` clamp the length to what is left after `offset`; `fill`
/// (erase) refuses any range that runs past the end. Copies go straight to the
/// mapped memory, so concurrent callers on overlapping ranges may interleave.
#[derive(Clone, Copy)]
pub struct VramWindow<'a> {
    base: NonNull<u8>,
    size: usize,
    _mapping: PhantomData<&'a Mapping>,
}

impl VramWindow<'_> {
    #[must_use]
    pub const fn base(&self) -> *const u8 {
        self.base.as_ptr()
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    const fn out_of_range(&self, offset: u64, len: u64) -> VramError {
        VramError::OutOfRange {
            offset,
            len,
            size: self.size as u64,
        }
    }

    /// `offset..offset + len`, with `len` cut down to the end of the window.
    fn clamp(&self, offset: u64, len: usize) -> VramResult<Range<usize>> {
        let start = match usize::try_from(offset) {
            Ok(start) if start < self.size => start,
            _ => return Err(self.out_of_range(offset, len as u64)),
        };
        Ok(start..start + len.min(self.size - start))
    }

    /// `offset..offset + len`, which must lie entirely inside the window.
    fn span(&self, offset: u64, len: u64) -> VramResult<Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size as u64 => Ok(offset as usize..end as usize),
            _ => Err(self.out_of_range(offset, len)),
        }
    }

    /// Copy from the window into `buf`. Returns the number of bytes copied.
    ///
    /// # Errors
    /// `OutOfRange` if `offset` is at or past the end of the window.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> VramResult<usize> {
        let range = self.clamp(offset, buf.len())?;
        let len = range.len();
        unsafe {
            ptr::copy_nonoverlapping(self.base.as_ptr().add(range.start), buf.as_mut_ptr(), len);
        }
        Ok(len)
    }

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// `OutOfRange` if `offset` is at or past the end of the window.
    pub fn read(&self, offset: u64, len: usize) -> VramResult<Vec<u8>> {
        let range = self.clamp(offset, len)?;
        let mut buf = vec![0u8; range.len()];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Copy `data` into the window. Returns the number of bytes written.
    ///
    /// # Errors
    /// `OutOfRange` if `offset` is at or past the end of the window.
    pub fn write(&self, offset: u64, data: &[u8]) -> VramResult<usize> {
        let range = self.clamp(offset, data.len())?;
        let len = range.len();
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.base.as_ptr().add(range.start), len);
        }
        Ok(len)
    }

    /// Set every byte of `offset..offset + len` to `byte`.
    ///
    /// # Errors
    /// `OutOfRange` if the range ends past the window; nothing is written.
    pub fn fill(&self, offset: u64, len: u64, byte: u8) -> VramResult<()> {
        let range = self.span(offset, len)?;
        unsafe {
            ptr::write_bytes(self.base.as_ptr().add(range.start), byte, range.len());
        }
        Ok(())
    }
}

impl fmt::Debug for VramWindow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VramWindow")
            .field("base", &self.base)
            .field("size", &self.size)
            .finish()
    }
}
