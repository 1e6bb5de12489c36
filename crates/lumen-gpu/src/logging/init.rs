use std::sync::Once;

use log::LevelFilter;

/// Crates under the wgpu backend that log per-frame detail at info.
const GPU_STACK: [&str; 4] = ["wgpu", "wgpu_core", "wgpu_hal", "naga"];

/// Logger configuration for [`init_logging`].
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "lumen_gpu=trace") and
/// takes precedence over `RUST_LOG`. With neither set, `level` applies everywhere
/// except the GPU stack, which is held at `gpu_stack_level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub level: LevelFilter,
    pub gpu_stack_level: LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            level: LevelFilter::Info,
            gpu_stack_level: LevelFilter::Warn,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self { env_filter: Some(filter.into()), ..Self::default() }
    }

    /// Module filters used when no filter string is given. `None` is the global level.
    fn default_directives(&self) -> Vec<(Option<&'static str>, LevelFilter)> {
        let mut out = vec![(None, self.level)];
        // Never louder than the global level.
        let gpu = self.gpu_stack_level.min(self.level);
        out.extend(GPU_STACK.iter().map(|m| (Some(*m), gpu)));
        out
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` as the global logger, once.
///
/// Later calls are ignored. A host that installs its own logger with
/// [`install_platform_logger`](super::install_platform_logger) should not call this.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter.as_deref() {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            for (module, level) in config.default_directives() {
                builder.filter(module, level);
            }
        }

        builder.write_style(config.write_style);

        if builder.try_init().is_err() {
            // Someone else's logger is live; tell it.
            log::warn!("a global logger is already installed; env_logger not initialized");
            return;
        }

        log::debug!("logging initialized");
    });
}
