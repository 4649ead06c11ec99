pub mod table;

use crate::error::VramResult;
use std::fmt;
use std::sync::Arc;

// ===============================================================================================
// Descriptor Constants
// ===============================================================================================

pub const MTD_ERASEABLE: u32 = 0x4;
pub const MTD_VOLATILE: u32 = 0x10;
pub const MTD_WRITEABLE: u32 = 0x400;
pub const MTD_BIT_WRITEABLE: u32 = 0x800;
pub const MTD_CAP_RAM: u32 = MTD_WRITEABLE | MTD_BIT_WRITEABLE;

/// Maximum number of devices the framework keeps track of.
pub const MAX_MTD_DEVICES: usize = 32;

/// Value an erased byte reads back as.
pub const ERASED_BYTE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtdType {
    Absent = 0,
    Ram = 1,
    Rom = 2,
    NorFlash = 3,
    NandFlash = 4,
}

/// Capability flags advertised in the device descriptor (maps to `mtd_info.flags`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MtdFlags {
    pub writeable: bool,
    pub bit_writeable: bool,
    pub eraseable: bool,
    pub volatile: bool,
}

impl MtdFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Random access: any byte can be written at any time (`MTD_CAP_RAM`).
    #[must_use]
    pub const fn ram(mut self) -> Self {
        self.writeable = true;
        self.bit_writeable = true;
        self
    }

    #[must_use]
    pub const fn eraseable(mut self) -> Self {
        self.eraseable = true;
        self
    }

    #[must_use]
    pub const fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Converts the flags into the raw descriptor bitmask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        let mut bits = 0;

        if self.writeable {
            bits |= MTD_WRITEABLE;
        }
        if self.bit_writeable {
            bits |= MTD_BIT_WRITEABLE;
        }
        if self.eraseable {
            bits |= MTD_ERASEABLE;
        }
        if self.volatile {
            bits |= MTD_VOLATILE;
        }

        bits
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            writeable: bits & MTD_WRITEABLE != 0,
            bit_writeable: bits & MTD_BIT_WRITEABLE != 0,
            eraseable: bits & MTD_ERASEABLE != 0,
            volatile: bits & MTD_VOLATILE != 0,
        }
    }
}

/// Device descriptor supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdInfo {
    pub name: String,
    pub mtd_type: MtdType,
    pub flags: MtdFlags,
    /// Total addressable size in bytes.
    pub size: u64,
    /// Erase granularity.
    pub erasesize: u32,
    /// Minimum write granularity.
    pub writesize: u32,
}

// ===============================================================================================
// Erase Requests
// ===============================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseState {
    Pending,
    Done,
    Failed,
}

type EraseCallback = Box<dyn FnOnce(&EraseInfo) + Send>;

/// An erase request, mirroring `struct erase_info`.
pub struct EraseInfo {
    pub addr: u64,
    pub len: u64,
    pub state: EraseState,
    callback: Option<EraseCallback>,
}

impl EraseInfo {
    #[must_use]
    pub const fn new(addr: u64, len: u64) -> Self {
        Self {
            addr,
            len,
            state: EraseState::Pending,
            callback: None,
        }
    }

    /// Attach a completion callback, run once when the request finishes.
    #[must_use]
    pub fn with_callback(mut self, callback: impl FnOnce(&EraseInfo) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Record the final state and notify the requester (`mtd_erase_callback`).
    pub fn complete(&mut self, state: EraseState) {
        self.state = state;
        if let Some(callback) = self.callback.take() {
            callback(self);
        }
    }
}

impl fmt::Debug for EraseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EraseInfo")
            .field("addr", &self.addr)
            .field("len", &self.len)
            .field("state", &self.state)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

// ===============================================================================================
// Framework Boundary
// ===============================================================================================

/// The handlers a device binds into the storage framework.
///
/// The framework may call these concurrently; implementations get `&self`.
pub trait MtdOps: Send + Sync {
    /// Read into `buf` starting at `from`. Returns the number of bytes read.
    fn read(&self, from: u64, buf: &mut [u8]) -> VramResult<usize>;

    /// Write `buf` starting at `to`. Returns the number of bytes written.
    fn write(&self, to: u64, buf: &[u8]) -> VramResult<usize>;

    /// Erase `instr.addr..instr.addr + instr.len`, completing `instr` before returning.
    fn erase(&self, instr: &mut EraseInfo) -> VramResult<()>;
}

/// The generic storage framework's registration calls.
pub trait MtdRegistry: Send + Sync {
    /// `add_mtd_device`. Returns the index the device was registered under.
    fn add_mtd_device(&self, info: MtdInfo, ops: Arc<dyn MtdOps>) -> VramResult<usize>;

    /// `del_mtd_device`.
    fn del_mtd_device(&self, index: usize) -> VramResult<()>;
}

pub use table::MtdTable;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn ram_flags_match_cap_ram() {
        assert_eq!(MtdFlags::new().ram().bits(), MTD_CAP_RAM);
        assert_eq!(
            MtdFlags::new().ram().eraseable().volatile().bits(),
            MTD_CAP_RAM | MTD_ERASEABLE | MTD_VOLATILE
        );
    }

    #[test]
    fn flags_survive_raw_conversion() {
        let flags = MtdFlags::new().ram().volatile();
        assert_eq!(MtdFlags::from_bits(flags.bits()), flags);
        assert_eq!(MtdFlags::from_bits(0), MtdFlags::new());
    }

    #[test]
    fn complete_runs_callback_once_with_final_state() {
        let called = Arc::new(AtomicBool::new(false));
        let seen = called.clone();
        let mut instr = EraseInfo::new(0, 4096).with_callback(move |e| {
            assert_eq!(e.state, EraseState::Done);
            seen.store(true, Ordering::SeqCst);
        });

        instr.complete(EraseState::Done);
        assert!(called.load(Ordering::SeqCst));
        assert_eq!(instr.state, EraseState::Done);

        // A second completion has no callback left to run.
        instr.complete(EraseState::Failed);
        assert_eq!(instr.state, EraseState::Failed);
    }
}
