// ===============================================================================================
// Status Codes
// ===============================================================================================

pub const LV1_SUCCESS: i64 = 0;
pub const LV1_RESOURCE_SHORTAGE: i64 = -2;
pub const LV1_NO_PRIVILEGE: i64 = -3;
pub const LV1_DENIED_BY_POLICY: i64 = -4;
pub const LV1_ACCESS_VIOLATION: i64 = -5;
pub const LV1_NO_ENTRY: i64 = -6;
pub const LV1_DUPLICATE_ENTRY: i64 = -7;
pub const LV1_TYPE_MISMATCH: i64 = -8;
pub const LV1_BUSY: i64 = -9;
pub const LV1_EMPTY: i64 = -10;
pub const LV1_WRONG_STATE: i64 = -11;
pub const LV1_NO_MATCH: i64 = -13;
pub const LV1_ALREADY_CONNECTED: i64 = -14;
pub const LV1_UNSUPPORTED_PARAMETER_VALUE: i64 = -15;
pub const LV1_CONDITION_NOT_SATISFIED: i64 = -16;
pub const LV1_ILLEGAL_PARAMETER_VALUE: i64 = -17;
pub const LV1_BAD_OPTION: i64 = -18;
pub const LV1_IMPLEMENTATION_LIMITATION: i64 = -19;
pub const LV1_NOT_IMPLEMENTED: i64 = -20;
pub const LV1_INVALID_CLASS_ID: i64 = -21;
pub const LV1_CONSTRAINT_NOT_SATISFIED: i64 = -22;
pub const LV1_ALIGNMENT_ERROR: i64 = -23;
pub const LV1_HARDWARE_ERROR: i64 = -24;
pub const LV1_INVALID_DATA_FORMAT: i64 = -25;
pub const LV1_INVALID_OPERATION: i64 = -26;
pub const LV1_INTERNAL_ERROR: i64 = -32768;

/// Symbolic name of an LV1 status code, for log and error messages.
#[must_use]
pub const fn status_name(status: i64) -> &'static str {
    match status {
        LV1_SUCCESS => "LV1_SUCCESS",
        LV1_RESOURCE_SHORTAGE => "LV1_RESOURCE_SHORTAGE",
        LV1_NO_PRIVILEGE => "LV1_NO_PRIVILEGE",
        LV1_DENIED_BY_POLICY => "LV1_DENIED_BY_POLICY",
        LV1_ACCESS_VIOLATION => "LV1_ACCESS_VIOLATION",
        LV1_NO_ENTRY => "LV1_NO_ENTRY",
        LV1_DUPLICATE_ENTRY => "LV1_DUPLICATE_ENTRY",
        LV1_TYPE_MISMATCH => "LV1_TYPE_MISMATCH",
        LV1_BUSY => "LV1_BUSY",
        LV1_EMPTY => "LV1_EMPTY",
        LV1_WRONG_STATE => "LV1_WRONG_STATE",
        LV1_NO_MATCH => "LV1_NO_MATCH",
        LV1_ALREADY_CONNECTED => "LV1_ALREADY_CONNECTED",
        LV1_UNSUPPORTED_PARAMETER_VALUE => "LV1_UNSUPPORTED_PARAMETER_VALUE",
        LV1_CONDITION_NOT_SATISFIED => "LV1_CONDITION_NOT_SATISFIED",
        LV1_ILLEGAL_PARAMETER_VALUE => "LV1_ILLEGAL_PARAMETER_VALUE",
        LV1_BAD_OPTION => "LV1_BAD_OPTION",
        LV1_IMPLEMENTATION_LIMITATION => "LV1_IMPLEMENTATION_LIMITATION",
        LV1_NOT_IMPLEMENTED => "LV1_NOT_IMPLEMENTED",
        LV1_INVALID_CLASS_ID => "LV1_INVALID_CLASS_ID",
        LV1_CONSTRAINT_NOT_SATISFIED => "LV1_CONSTRAINT_NOT_SATISFIED",
        LV1_ALIGNMENT_ERROR => "LV1_ALIGNMENT_ERROR",
        LV1_HARDWARE_ERROR => "LV1_HARDWARE_ERROR",
        LV1_INVALID_DATA_FORMAT => "LV1_INVALID_DATA_FORMAT",
        LV1_INVALID_OPERATION => "LV1_INVALID_OPERATION",
        LV1_INTERNAL_ERROR => "LV1_INTERNAL_ERROR",
        _ => "LV1_UNKNOWN",
    }
}

// ===============================================================================================
// GPU Memory
// ===============================================================================================

/// Argument block for `lv1_gpu_memory_allocate`.
///
/// `size` and `reserved` are inputs; `memory_handle` and `ddr_lpar` are filled
/// in by the hypervisor on success.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct GpuMemoryAllocateArgs {
    pub size: u64,
    /// Report/flag words. Zero requests the default placement.
    pub reserved: [u64; 4],
    pub memory_handle: u64,
    pub ddr_lpar: u64,
}

impl GpuMemoryAllocateArgs {
    #[must_use]
    pub const fn new(size: u64) -> Self {
        Self {
            size,
            reserved: [0; 4],
            memory_handle: 0,
            ddr_lpar: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_have_names() {
        assert_eq!(status_name(LV1_SUCCESS), "LV1_SUCCESS");
        assert_eq!(status_name(LV1_RESOURCE_SHORTAGE), "LV1_RESOURCE_SHORTAGE");
        assert_eq!(status_name(LV1_INTERNAL_ERROR), "LV1_INTERNAL_ERROR");
        assert_eq!(status_name(-12), "LV1_UNKNOWN");
    }

    #[test]
    fn allocate_args_default_to_no_flags() {
        let args = GpuMemoryAllocateArgs::new(0x0fc0_0000);
        assert_eq!(args.size, 0x0fc0_0000);
        assert_eq!(args.reserved, [0; 4]);
        assert_eq!(args.memory_handle, 0);
        assert_eq!(args.ddr_lpar, 0);
    }
}
