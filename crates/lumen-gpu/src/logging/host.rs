use std::sync::Arc;

/// Severity levels a host logger understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Info | log::Level::Debug | log::Level::Trace => LogLevel::Info,
        }
    }
}

/// Host-provided sink for library diagnostics.
pub trait Logger: Send + Sync {
    fn log_message(&self, level: LogLevel, message: &str);
}

impl<F> Logger for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn log_message(&self, level: LogLevel, message: &str) {
        self(level, message)
    }
}

struct HostBridge {
    host: Arc<dyn Logger>,
    max_level: log::LevelFilter,
}

impl log::Log for HostBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("[{}] {}", record.target(), record.args());
        self.host.log_message(record.level().into(), &message);
    }

    fn flush(&self) {}
}

/// Routes every `log` record at or above `max_level` to `host`.
///
/// Fails if a global logger (this bridge or `env_logger`) is already installed.
pub fn install_platform_logger(
    host: Arc<dyn Logger>,
    max_level: log::LevelFilter,
) -> Result<(), log::SetLoggerError> {
    let bridge: &'static HostBridge = Box::leak(Box::new(HostBridge { host, max_level }));
    log::set_logger(bridge)?;
    log::set_max_level(max_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use parking_lot::Mutex;

    #[test]
    fn levels_collapse_to_three() {
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warning);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Info);
    }

    #[test]
    fn bridge_forwards_enabled_records() {
        let seen: Arc<Mutex<Vec<(LogLevel, String)>>> = Arc::default();
        let sink = seen.clone();
        let bridge = HostBridge {
            host: Arc::new(move |level: LogLevel, msg: &str| sink.lock().push((level, msg.to_owned()))),
            max_level: log::LevelFilter::Warn,
        };

        bridge.log(
            &log::Record::builder()
                .level(log::Level::Error)
                .target("lumen_gpu")
                .args(format_args!("boom"))
                .build(),
        );
        bridge.log(
            &log::Record::builder()
                .level(log::Level::Info)
                .target("lumen_gpu")
                .args(format_args!("quiet"))
                .build(),
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (LogLevel::Error, "[lumen_gpu] boom".to_owned()));
    }
}
