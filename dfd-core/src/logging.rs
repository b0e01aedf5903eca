//! Logging utilities and configuration.
//!
//! The library only emits `tracing` events. Binaries decide where they go by
//! calling [`setup::init_logging`] once at startup.

/// Truncates a string to at most `max_length` bytes, on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for binaries and tests.
pub mod setup {
    use tracing::Level;

    use crate::error::{DatasheetError, Result};

    /// Configuration for the logging subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything outside this project
        pub level: Level,
        /// Log level for `dfd_core` and the `dfd` binary
        pub dfd_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Write to stderr so stdout stays clean for generated documents
        pub stderr: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                dfd_level: Level::INFO,
                json_format: false,
                stderr: true,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                dfd_level: Level::INFO,
                json_format: true,
                stderr: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::INFO,
                dfd_level: Level::DEBUG,
                json_format: false,
                stderr: true,
                env_filter: None,
            }
        }

        /// Sets the log level for third-party crates.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for this project's crates.
        pub fn with_dfd_level(mut self, level: Level) -> Self {
            self.dfd_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                let dfd = self.dfd_level.as_str().to_lowercase();
                format!(
                    "{},dfd_core={dfd},dfd={dfd}",
                    self.level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs the global subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter. Fails if a
    /// subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use dfd_core::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<()> {
        use tracing_subscriber::{
            layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = match (config.json_format, config.stderr) {
            (true, true) => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed(),
            (true, false) => tracing_subscriber::fmt::layer().json().boxed(),
            (false, true) => tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed(),
            (false, false) => tracing_subscriber::fmt::layer().boxed(),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| DatasheetError::configuration(format!("cannot install logger: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;
    use tracing::Level;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.dfd_level, Level::INFO);
        assert!(!config.json_format);
        assert!(config.stderr);
        assert_eq!(config.env_filter(), "warn,dfd_core=info,dfd=info");
    }

    #[test]
    fn test_logging_config_overrides() {
        let config = LoggingConfig::production().with_dfd_level(Level::TRACE);
        assert!(config.json_format);
        assert_eq!(config.env_filter(), "warn,dfd_core=trace,dfd=trace");

        let config = LoggingConfig::development().with_env_filter("off");
        assert_eq!(config.env_filter(), "off");
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text that should be truncated", 10),
            "this is a ...(truncated)"
        );
        // 'é' is two bytes; the cut falls back to the previous boundary.
        assert_eq!(truncate_field("aé", 2), "a...(truncated)");
    }
}
