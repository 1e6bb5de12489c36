//! Explicit platform context: the injected GPU driver, logger and configuration.
//!
//! There is no process-wide singleton. The embedder builds a [`Platform`] and passes it
//! (or its driver) to whatever produces command streams.

use std::sync::Arc;

use thiserror::Error;

use crate::logging::{init_logging, install_platform_logger, Logger, LoggingConfig};
use crate::protocol::{synchronize, DriverConfig, GpuDriver, SyncScope, ViolationPolicy};

/// Platform-wide settings.
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    /// Policy for backends the embedder builds from [`PlatformConfig::driver_config`].
    pub violation_policy: ViolationPolicy,
    /// `env_logger` setup used when no host logger is supplied. `None` leaves logging alone.
    pub logging: Option<LoggingConfig>,
}

impl PlatformConfig {
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig { violation_policy: self.violation_policy, ..DriverConfig::default() }
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("no GPU driver was supplied")]
    MissingGpuDriver,

    #[error("a global logger is already installed")]
    LoggerAlreadySet(#[from] log::SetLoggerError),
}

/// Builder for [`Platform`].
#[derive(Default)]
pub struct PlatformBuilder {
    config: PlatformConfig,
    gpu_driver: Option<Box<dyn GpuDriver>>,
    logger: Option<Arc<dyn Logger>>,
}

impl PlatformBuilder {
    pub fn config(mut self, config: PlatformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn gpu_driver(mut self, driver: Box<dyn GpuDriver>) -> Self {
        self.gpu_driver = Some(driver);
        self
    }

    /// Host logger receiving every `log` record. Takes precedence over `config.logging`.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<Platform, PlatformError> {
        let gpu_driver = self.gpu_driver.ok_or(PlatformError::MissingGpuDriver)?;

        match (self.logger, &self.config.logging) {
            (Some(logger), _) => install_platform_logger(logger, log::LevelFilter::Info)?,
            (None, Some(logging)) => init_logging(logging.clone()),
            (None, None) => {}
        }

        log::debug!("platform ready (violation policy {:?})", self.config.violation_policy);
        Ok(Platform { config: self.config, gpu_driver })
    }
}

/// Owns the GPU driver the renderer talks to.
pub struct Platform {
    config: PlatformConfig,
    gpu_driver: Box<dyn GpuDriver>,
}

impl Platform {
    pub fn builder() -> PlatformBuilder {
        PlatformBuilder::default()
    }

    #[inline]
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    #[inline]
    pub fn gpu_driver_mut(&mut self) -> &mut dyn GpuDriver {
        self.gpu_driver.as_mut()
    }

    /// Opens a synchronization pass on the driver.
    pub fn synchronize(&mut self) -> SyncScope<'_, dyn GpuDriver> {
        synchronize(self.gpu_driver.as_mut())
    }

    /// Gives the driver back.
    pub fn into_gpu_driver(self) -> Box<dyn GpuDriver> {
        self.gpu_driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::NullDriver;
    use crate::bitmap::Bitmap;

    #[test]
    fn build_requires_a_gpu_driver() {
        assert!(matches!(Platform::builder().build(), Err(PlatformError::MissingGpuDriver)));
    }

    #[test]
    fn driver_config_carries_the_policy() {
        let config = PlatformConfig { violation_policy: ViolationPolicy::Skip, logging: None };
        assert_eq!(config.driver_config().violation_policy, ViolationPolicy::Skip);
    }

    #[test]
    fn synchronize_drives_the_injected_driver() {
        let mut platform = Platform::builder()
            .gpu_driver(Box::new(NullDriver::new()))
            .build()
            .unwrap();

        {
            let mut pass = platform.synchronize();
            let a = pass.create_texture(&Bitmap::solid_bgra(1, 1, [0; 4]));
            let b = pass.create_render_target();
            assert!(b > a);
        }
        let id = platform.gpu_driver_mut().next_texture_id();
        assert_eq!(id.get(), 3);
    }
}
