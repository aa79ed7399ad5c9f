//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables of an [`UploadEngine`](crate::UploadEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bytes per resume call. The protocol expects 512 KiB; smaller values
    /// are only useful against test services.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Capacity of the event channel. Events are dropped when it is full.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_chunk_size() -> usize {
    docupload_transfer::UPLOAD_CHUNK_SIZE
}

fn default_event_buffer() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::ZeroEventBuffer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 512 * 1024);
        assert_eq!(config.event_buffer, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("event_buffer = 16").unwrap();
        assert_eq!(config.chunk_size, 512 * 1024);
        assert_eq!(config.event_buffer, 16);
    }

    #[test]
    fn zero_values_rejected() {
        let config = EngineConfig {
            event_buffer: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroEventBuffer)));
    }
}
