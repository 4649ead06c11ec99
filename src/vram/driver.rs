use super::device::VramDevice;
use super::grant::GpuMemory;
use crate::config::VramConfig;
use crate::error::{VramError, VramResult};
use crate::lv1::Hypervisor;
use crate::mtd::MtdRegistry;
use std::mem;
use std::sync::Arc;

/// How far bring-up has progressed. Each stage owns exactly what has been acquired so far.
#[derive(Debug)]
pub enum Stage {
    Uninitialized,
    GrantAcquired(GpuMemory),
    Mapped(VramDevice),
    Registered {
        device: Arc<VramDevice>,
        index: usize,
    },
}

impl Stage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::GrantAcquired(_) => "grant-acquired",
            Self::Mapped(_) => "mapped",
            Self::Registered { .. } => "registered",
        }
    }

    /// Release the most recently acquired resource and step back one stage.
    #[must_use]
    pub fn retreat(self, registry: &dyn MtdRegistry) -> Self {
        match self {
            Self::Uninitialized => Self::Uninitialized,
            Self::GrantAcquired(grant) => {
                drop(grant);
                Self::Uninitialized
            }
            Self::Mapped(device) => {
                let (grant, mapping) = device.into_parts();
                drop(mapping);
                Self::GrantAcquired(grant)
            }
            Self::Registered { device, index } => {
                if let Err(e) = registry.del_mtd_device(index) {
                    log::warn!("ps3vram: del_mtd_device(mtd{index}) failed: {e}");
                }
                match Arc::try_unwrap(device) {
                    Ok(device) => Self::Mapped(device),
                    Err(shared) => {
                        // The last outstanding user unmaps and frees when it lets go.
                        log::warn!(
                            "ps3vram: {} other users still hold the device, release deferred",
                            Arc::strong_count(&shared) - 1
                        );
                        Self::Uninitialized
                    }
                }
            }
        }
    }

    /// Retreat all the way back to `Uninitialized`.
    pub fn teardown(mut self, registry: &dyn MtdRegistry) {
        while !matches!(self, Self::Uninitialized) {
            log::debug!("ps3vram: unwinding from {}", self.name());
            self = self.retreat(registry);
        }
    }
}

/// Owns the device for the lifetime of the driver: `start` brings it up and
/// registers it, `stop` (or drop) takes it down in reverse order.
pub struct VramDriver {
    hv: Arc<dyn Hypervisor>,
    registry: Arc<dyn MtdRegistry>,
    config: VramConfig,
    stage: Stage,
}

impl VramDriver {
    #[must_use]
    pub fn new(
        hv: Arc<dyn Hypervisor>,
        registry: Arc<dyn MtdRegistry>,
        config: VramConfig,
    ) -> Self {
        Self {
            hv,
            registry,
            config,
            stage: Stage::Uninitialized,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &VramConfig {
        &self.config
    }

    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        matches!(self.stage, Stage::Registered { .. })
    }

    /// The registered device, if `start` succeeded.
    #[must_use]
    pub const fn device(&self) -> Option<&Arc<VramDevice>> {
        match &self.stage {
            Stage::Registered { device, .. } => Some(device),
            _ => None,
        }
    }

    /// Index the device is registered under.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self.stage {
            Stage::Registered { index, .. } => Some(index),
            _ => None,
        }
    }

    fn advance(&self, stage: Stage) -> Result<Stage, (Stage, VramError)> {
        match stage {
            Stage::Uninitialized => GpuMemory::allocate(self.hv.clone(), self.config.grant_size)
                .map(Stage::GrantAcquired)
                .map_err(|e| (Stage::Uninitialized, e)),

            Stage::GrantAcquired(grant) => VramDevice::map(grant, self.config.skip_size)
                .map(Stage::Mapped)
                .map_err(|(grant, e)| (Stage::GrantAcquired(grant), e)),

            Stage::Mapped(device) => {
                let info = device.mtd_info(&self.config);
                let device = Arc::new(device);
                match self.registry.add_mtd_device(info, device.clone()) {
                    Ok(index) => Ok(Stage::Registered { device, index }),
                    Err(e) => {
                        log::error!("ps3vram: failed to register device: {e}");
                        match Arc::try_unwrap(device) {
                            Ok(device) => Err((Stage::Mapped(device), e)),
                            // The registry kept a reference despite failing; it owns the release now.
                            Err(_) => Err((Stage::Uninitialized, e)),
                        }
                    }
                }
            }

            registered @ Stage::Registered { .. } => Ok(registered),
        }
    }

    /// Allocate, map and register the device. Returns the MTD index.
    ///
    /// On failure everything acquired so far is released in reverse order
    /// before the error is returned.
    ///
    /// # Errors
    /// `AlreadyStarted` if the device is already up, otherwise the error of the
    /// step that failed (`InvalidConfig`, `Grant`, `Map` or `Registration`).
    pub fn start(&mut self) -> VramResult<usize> {
        if !matches!(self.stage, Stage::Uninitialized) {
            return Err(VramError::AlreadyStarted);
        }
        self.config.validate()?;

        let mut stage = Stage::Uninitialized;
        loop {
            log::debug!("ps3vram: advancing from {}", stage.name());
            stage = match self.advance(stage) {
                Ok(next) => next,
                Err((reached, e)) => {
                    reached.teardown(self.registry.as_ref());
                    return Err(e);
                }
            };

            if let Stage::Registered { device, index } = &stage {
                log::info!(
                    "ps3vram mtd device registered, {} bytes",
                    device.usable_size()
                );
                let index = *index;
                self.stage = stage;
                return Ok(index);
            }
        }
    }

    /// Deregister, unmap and free. A no-op unless `start` succeeded.
    pub fn stop(&mut self) {
        let stage = mem::replace(&mut self.stage, Stage::Uninitialized);
        if matches!(stage, Stage::Uninitialized) {
            return;
        }
        stage.teardown(self.registry.as_ref());
        log::info!("ps3vram mtd device unregistered");
    }
}

impl Drop for VramDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Module-init style entry point: bring the device up if possible.
///
/// A failure is logged and leaves the device absent; it is never fatal to the caller.
#[must_use]
pub fn init_module(
    hv: Arc<dyn Hypervisor>,
    registry: Arc<dyn MtdRegistry>,
    config: VramConfig,
) -> VramDriver {
    let mut driver = VramDriver::new(hv, registry, config);
    if let Err(e) = driver.start() {
        log::error!("ps3vram: device not available: {e}");
    }
    driver
}
