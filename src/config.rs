#![allow(clippy::cast_possible_truncation)]

use crate::error::{VramError, VramResult};
use crate::utils::{page_size, parse_size};
use std::env;

/// Registered device name.
pub const DEVICE_NAME: &str = "ps3vram";

/// Size of the GPU memory grant requested from LV1 (252 MiB).
pub const DDR_SIZE: u64 = 0x0fc0_0000;

/// Bytes reserved at the start of the grant: one 1080p 32bpp framebuffer, double buffered.
pub const SKIP_SIZE: u64 = framebuffer_size(1920, 1080, 4, 2);

pub const ENV_NAME: &str = "PS3VRAM_NAME";
pub const ENV_GRANT_SIZE: &str = "PS3VRAM_GRANT_SIZE";
pub const ENV_SKIP_SIZE: &str = "PS3VRAM_SKIP_SIZE";
pub const ENV_ERASE_SIZE: &str = "PS3VRAM_ERASE_SIZE";

/// Bytes covered by `buffers` framebuffers of the given video mode.
#[must_use]
pub const fn framebuffer_size(width: u64, height: u64, bytes_per_pixel: u64, buffers: u64) -> u64 {
    width * height * bytes_per_pixel * buffers
}

/// Sizing and naming of the VRAM device.
///
/// The skip size must cover whatever part of the grant the display may be
/// scanning out of; it is a parameter rather than a constant so it can follow
/// the actual video mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VramConfig {
    pub name: String,
    pub grant_size: u64,
    pub skip_size: u64,
    pub erase_size: u32,
}

impl Default for VramConfig {
    fn default() -> Self {
        Self {
            name: DEVICE_NAME.to_string(),
            grant_size: DDR_SIZE,
            skip_size: SKIP_SIZE,
            erase_size: page_size() as u32,
        }
    }
}

impl VramConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn with_grant_size(mut self, grant_size: u64) -> Self {
        self.grant_size = grant_size;
        self
    }

    #[must_use]
    pub const fn with_skip_size(mut self, skip_size: u64) -> Self {
        self.skip_size = skip_size;
        self
    }

    #[must_use]
    pub const fn with_erase_size(mut self, erase_size: u32) -> Self {
        self.erase_size = erase_size;
        self
    }

    /// Reserve enough of the grant for `buffers` framebuffers of the given mode.
    #[must_use]
    pub const fn for_video_mode(
        self,
        width: u64,
        height: u64,
        bytes_per_pixel: u64,
        buffers: u64,
    ) -> Self {
        self.with_skip_size(framebuffer_size(width, height, bytes_per_pixel, buffers))
    }

    /// Bytes exposed through the device once the skip prefix is removed.
    #[must_use]
    pub const fn usable_size(&self) -> u64 {
        self.grant_size.saturating_sub(self.skip_size)
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if a variable is set but does not parse.
    pub fn from_env() -> VramResult<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var(ENV_NAME) {
            config.name = name;
        }
        if let Some(size) = env_size(ENV_GRANT_SIZE)? {
            config.grant_size = size;
        }
        if let Some(size) = env_size(ENV_SKIP_SIZE)? {
            config.skip_size = size;
        }
        if let Some(size) = env_size(ENV_ERASE_SIZE)? {
            config.erase_size = u32::try_from(size).map_err(|_| {
                VramError::InvalidConfig(format!("{ENV_ERASE_SIZE}={size} does not fit in 32 bits"))
            })?;
        }

        Ok(config)
    }

    /// Checks the sizing before any hypervisor resource is requested.
    ///
    /// # Errors
    /// Returns `InvalidConfig` describing the first violated constraint.
    pub fn validate(&self) -> VramResult<()> {
        if self.name.is_empty() {
            return Err(VramError::InvalidConfig("device name is empty".into()));
        }
        if self.grant_size == 0 {
            return Err(VramError::InvalidConfig("grant size is zero".into()));
        }
        if usize::try_from(self.grant_size).is_err() {
            return Err(VramError::InvalidConfig(format!(
                "grant size {} is not addressable",
                self.grant_size
            )));
        }
        if self.skip_size >= self.grant_size {
            return Err(VramError::InvalidConfig(format!(
                "skip size {} leaves nothing of the {} byte grant",
                self.skip_size, self.grant_size
            )));
        }
        if !self.erase_size.is_power_of_two() {
            return Err(VramError::InvalidConfig(format!(
                "erase size {} is not a power of two",
                self.erase_size
            )));
        }
        Ok(())
    }
}

fn env_size(key: &str) -> VramResult<Option<u64>> {
    match env::var(key) {
        Ok(value) => parse_size(&value)
            .map(Some)
            .ok_or_else(|| VramError::InvalidConfig(format!("{key}={value:?} is not a size"))),
        Err(_) => Ok(None),
    }
}
