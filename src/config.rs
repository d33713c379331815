//! Pipeline configuration and its builder.
//!
//! All bounds in the pipeline are fixed at construction: queue depths, the
//! reassembly table capacity and the watchdog timeout. The maximum outbound
//! chunk size is the one runtime-settable knob, mirroring the firmware
//! convention of tuning the split size to the transport's send buffer.

use std::time::Duration;

use thiserror::Error;

/// Default maximum size of a single outbound send, in bytes.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 256;

/// Errors rejected while building a [`Config`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A queue or table capacity was zero.
    #[error("invalid capacity for {name}; must be >= 1")]
    InvalidCapacity {
        /// Name of the offending setting.
        name: &'static str,
    },
    /// The maximum chunk size was zero.
    #[error("invalid max chunk size; must be >= 1")]
    InvalidChunkSize,
    /// The watchdog timeout was zero.
    #[error("invalid watchdog timeout; must be non-zero")]
    InvalidWatchdogTimeout,
}

/// Validated configuration for the HTTP pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    server_name: String,
    max_chunk_size: usize,
    pending_send_capacity: usize,
    split_send_capacity: usize,
    reassembly_capacity: usize,
    watchdog_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: concat!("espress/", env!("CARGO_PKG_VERSION")).to_owned(),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            pending_send_capacity: 8,
            split_send_capacity: 4,
            reassembly_capacity: 4,
            watchdog_timeout: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> ConfigBuilder { ConfigBuilder::default() }

    /// Value advertised in the `Server:` response header.
    #[must_use]
    pub fn server_name(&self) -> &str { &self.server_name }

    /// Maximum size of a single outbound send.
    #[must_use]
    pub const fn max_chunk_size(&self) -> usize { self.max_chunk_size }

    /// Adjust the maximum outbound chunk size at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidChunkSize`] for a zero size.
    pub fn set_max_chunk_size(&mut self, size: usize) -> Result<(), ConfigError> {
        if size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        self.max_chunk_size = size;
        Ok(())
    }

    /// Depth of the pending-send queue.
    #[must_use]
    pub const fn pending_send_capacity(&self) -> usize { self.pending_send_capacity }

    /// Depth of the pending split-send queue.
    #[must_use]
    pub const fn split_send_capacity(&self) -> usize { self.split_send_capacity }

    /// Number of concurrent in-progress reassemblies tracked per table.
    #[must_use]
    pub const fn reassembly_capacity(&self) -> usize { self.reassembly_capacity }

    /// Duration after which a missing send completion force-clears the gate.
    #[must_use]
    pub const fn watchdog_timeout(&self) -> Duration { self.watchdog_timeout }
}

/// Builder for [`Config`]; zero capacities are rejected at build time.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the `Server:` header value.
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    /// Set the maximum outbound chunk size.
    #[must_use]
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// Set the pending-send queue depth.
    #[must_use]
    pub fn pending_send_capacity(mut self, capacity: usize) -> Self {
        self.config.pending_send_capacity = capacity;
        self
    }

    /// Set the pending split-send queue depth.
    #[must_use]
    pub fn split_send_capacity(mut self, capacity: usize) -> Self {
        self.config.split_send_capacity = capacity;
        self
    }

    /// Set the reassembly table capacity.
    #[must_use]
    pub fn reassembly_capacity(mut self, capacity: usize) -> Self {
        self.config.reassembly_capacity = capacity;
        self
    }

    /// Set the send-gate watchdog timeout.
    #[must_use]
    pub fn watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.config.watchdog_timeout = timeout;
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a capacity, the chunk size or the
    /// watchdog timeout is zero.
    pub fn build(self) -> Result<Config, ConfigError> {
        let config = self.config;
        if config.max_chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        for (name, value) in [
            ("pending_send_capacity", config.pending_send_capacity),
            ("split_send_capacity", config.split_send_capacity),
            ("reassembly_capacity", config.reassembly_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCapacity { name });
            }
        }
        if config.watchdog_timeout.is_zero() {
            return Err(ConfigError::InvalidWatchdogTimeout);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::builder().build().expect("defaults build");
        assert_eq!(config.max_chunk_size(), DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(config.pending_send_capacity(), 8);
        assert_eq!(config.split_send_capacity(), 4);
        assert_eq!(config.reassembly_capacity(), 4);
        assert_eq!(config.watchdog_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Config::builder()
            .split_send_capacity(0)
            .build()
            .expect_err("zero capacity must fail");
        assert_eq!(
            err,
            ConfigError::InvalidCapacity {
                name: "split_send_capacity"
            }
        );
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert_eq!(
            Config::builder().max_chunk_size(0).build(),
            Err(ConfigError::InvalidChunkSize)
        );
    }

    #[test]
    fn chunk_size_is_runtime_settable() {
        let mut config = Config::default();
        config.set_max_chunk_size(512).expect("non-zero size");
        assert_eq!(config.max_chunk_size(), 512);
        assert_eq!(
            config.set_max_chunk_size(0),
            Err(ConfigError::InvalidChunkSize)
        );
    }
}
