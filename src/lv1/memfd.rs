#![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]

use super::call::{
    GpuMemoryAllocateArgs, LV1_ILLEGAL_PARAMETER_VALUE, LV1_NO_ENTRY, LV1_RESOURCE_SHORTAGE,
    LV1_SUCCESS, LV1_UNSUPPORTED_PARAMETER_VALUE,
};
use super::{Hypervisor, Lv1Status};
use crate::utils::{align_up, page_size};
use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::{self, NonNull};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Total GDDR3 on the RSX.
pub const DDR_CAPACITY: u64 = 256 * 1024 * 1024;
/// First LPAR address handed out for a grant.
pub const DDR_LPAR_BASE: u64 = 0x7000_0000_0000;
/// Grants are placed on 1 MiB LPAR boundaries.
const DDR_LPAR_ALIGN: u64 = 1 << 20;

#[derive(Debug)]
struct Grant {
    fd: OwnedFd,
    lpar: u64,
    size: u64,
}

#[derive(Debug)]
struct State {
    next_handle: u64,
    next_lpar: u64,
    used: u64,
    grants: HashMap<u64, Grant>,
}

/// A host-side stand-in for the LV1 GPU memory calls.
///
/// Each grant is backed by an anonymous `memfd`, so every `ioremap` of the same
/// LPAR range is a `MAP_SHARED` view of the same bytes. The DDR capacity is
/// enforced, which makes a second full-size grant fail exactly as it does on
/// the console.
#[derive(Debug)]
pub struct MemfdHypervisor {
    capacity: u64,
    state: Mutex<State>,
}

impl Default for MemfdHypervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemfdHypervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DDR_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity,
            state: Mutex::new(State {
                next_handle: 1,
                next_lpar: DDR_LPAR_BASE,
                used: 0,
                grants: HashMap::new(),
            }),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes of DDR not currently granted.
    pub fn available(&self) -> u64 {
        self.capacity - self.state().used
    }

    /// Number of grants that have not been freed.
    pub fn live_grants(&self) -> usize {
        self.state().grants.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Release paths run from Drop; a poisoned lock must not turn into a second panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_backing(size: u64) -> io::Result<OwnedFd> {
        let fd = unsafe { libc::memfd_create(c"ps3vram-ddr".as_ptr(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // Take ownership first so the descriptor is closed on the error path below.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let ret = unsafe { libc::ftruncate(fd.as_raw_fd(), size as libc::off_t) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(fd)
    }
}

impl Hypervisor for MemfdHypervisor {
    fn gpu_memory_allocate(&self, args: &mut GpuMemoryAllocateArgs) -> Lv1Status {
        if args.size == 0 {
            return Lv1Status(LV1_ILLEGAL_PARAMETER_VALUE);
        }
        if args.reserved.iter().any(|&w| w != 0) {
            return Lv1Status(LV1_UNSUPPORTED_PARAMETER_VALUE);
        }

        let mut state = self.state();
        if args.size > self.capacity - state.used {
            return Lv1Status(LV1_RESOURCE_SHORTAGE);
        }

        let fd = match Self::create_backing(args.size) {
            Ok(fd) => fd,
            Err(e) => {
                log::warn!("memfd backing for {} bytes failed: {e}", args.size);
                return Lv1Status(LV1_RESOURCE_SHORTAGE);
            }
        };

        let handle = state.next_handle;
        let lpar = state.next_lpar;
        state.next_handle += 1;
        state.next_lpar = align_up(lpar + args.size, DDR_LPAR_ALIGN);
        state.used += args.size;
        state.grants.insert(
            handle,
            Grant {
                fd,
                lpar,
                size: args.size,
            },
        );
        drop(state);

        args.memory_handle = handle;
        args.ddr_lpar = lpar;
        Lv1Status(LV1_SUCCESS)
    }

    fn gpu_memory_free(&self, memory_handle: u64) -> Lv1Status {
        let mut state = self.state();
        match state.grants.remove(&memory_handle) {
            Some(grant) => {
                state.used -= grant.size;
                // Existing mappings keep the memfd pages alive until they are unmapped.
                Lv1Status(LV1_SUCCESS)
            }
            None => Lv1Status(LV1_NO_ENTRY),
        }
    }

    fn ioremap(&self, lpar: u64, size: usize) -> io::Result<NonNull<u8>> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "zero-length ioremap",
            ));
        }

        let state = self.state();
        let end = lpar
            .checked_add(size as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "LPAR range overflows"))?;
        let grant = state
            .grants
            .values()
            .find(|g| lpar >= g.lpar && end <= g.lpar + g.size)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no grant covers LPAR 0x{lpar:x}..0x{end:x}"),
                )
            })?;

        let offset = lpar - grant.lpar;
        if offset % page_size() as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("LPAR 0x{lpar:x} is not page aligned within its grant"),
            ));
        }

        let ret = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                grant.fd.as_raw_fd(),
                offset as libc::off_t,
            )
        };
        if ret == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        NonNull::new(ret.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned NULL"))
    }

    fn iounmap(&self, addr: NonNull<u8>, size: usize) {
        let ret = unsafe { libc::munmap(addr.as_ptr().cast(), size) };
        if ret != 0 {
            log::warn!(
                "munmap of {:p} ({size} bytes) failed: {}",
                addr.as_ptr(),
                io::Error::last_os_error()
            );
        }
    }
}
