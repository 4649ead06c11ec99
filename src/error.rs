use crate::lv1::Lv1Status;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VramError {
    #[error("lv1_gpu_memory_allocate failed: {0}")]
    Grant(Lv1Status),

    #[error("ioremap of GPU memory failed: {0}")]
    Map(#[source] std::io::Error),

    #[error("failed to register MTD device: {0}")]
    Registration(String),

    #[error("out of range: offset={offset} len={len} size={size}")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("device already started")]
    AlreadyStarted,
}

// A convenient alias
pub type VramResult<T> = Result<T, VramError>;
