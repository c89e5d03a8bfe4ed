// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Writer configuration, loadable from JSON.

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of encoded tables held in memory at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A field holds an unusable value.
    #[error("invalid option `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Tuning knobs for [`serialize`](crate::serialize).
///
/// ```json
/// { "workers": 4, "max_in_flight": 32 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterOptions {
    /// Encoder threads. `None` uses the machine's available parallelism.
    pub workers: Option<usize>,
    /// Upper bound on encoded tables buffered before they are written out.
    pub max_in_flight: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            workers: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl WriterOptions {
    /// Options that encode every table on the calling thread.
    pub fn sequential() -> Self {
        Self {
            workers: Some(1),
            ..Self::default()
        }
    }

    /// Returns the options with a fixed worker count.
    pub fn with_workers(self, workers: usize) -> Self {
        Self {
            workers: Some(workers),
            ..self
        }
    }

    /// Returns the options with a different in-flight cap.
    pub fn with_max_in_flight(self, max_in_flight: usize) -> Self {
        Self {
            max_in_flight,
            ..self
        }
    }

    /// Parses and validates options from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_slice(bytes)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a JSON file. An empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Self::from_json_slice(&bytes)
    }

    /// Rejects zero worker counts and a zero in-flight cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be at least 1",
            });
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                field: "max_in_flight",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Worker count actually used, never zero.
    pub(crate) fn resolved_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
            })
            .max(1)
    }

    /// In-flight cap actually used, never zero.
    pub(crate) fn window(&self) -> usize {
        self.max_in_flight.max(1)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options = WriterOptions::from_json_slice(b"{}").unwrap();
        assert_eq!(options, WriterOptions::default());
        assert_eq!(options.max_in_flight, DEFAULT_MAX_IN_FLIGHT);

        let options = WriterOptions::from_json_slice(br#"{"workers": 3}"#).unwrap();
        assert_eq!(options.workers, Some(3));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = WriterOptions::from_json_slice(br#"{"threads": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Serde(_)));
    }

    #[test]
    fn zero_values_fail_validation() {
        let err = WriterOptions::from_json_slice(br#"{"max_in_flight": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_in_flight",
                ..
            }
        ));
        assert!(WriterOptions::default().with_workers(0).validate().is_err());
    }

    #[test]
    fn resolved_values_are_never_zero() {
        let options = WriterOptions {
            workers: Some(0),
            max_in_flight: 0,
        };
        assert_eq!(options.resolved_workers(), 1);
        assert_eq!(options.window(), 1);
        assert!(WriterOptions::default().resolved_workers() >= 1);
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.json");
        std::fs::write(&path, br#"{"workers": 2, "max_in_flight": 4}"#).unwrap();
        let options = WriterOptions::load(&path).unwrap();
        assert_eq!(options, WriterOptions::sequential().with_workers(2).with_max_in_flight(4));

        std::fs::write(&path, b"\n").unwrap();
        assert_eq!(WriterOptions::load(&path).unwrap(), WriterOptions::default());
    }
}
