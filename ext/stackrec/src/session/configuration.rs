use std::time::Duration;

use thiserror::Error;

use crate::sample::Metric;
use crate::stack_collector::MAX_FRAMES_LIMIT;

pub const DEFAULT_MAX_FRAMES: usize = 400;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub enabled_metrics: EnabledMetrics,
    pub max_frames: usize,
    #[serde(with = "duration_ms")]
    pub flush_interval: Duration,
}

/// Optional metrics. cpu-samples and wall-time are always recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledMetrics {
    pub cpu_time: bool,
    pub alloc_samples: bool,
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("max_frames must be between 0 and 10000, got {0}")]
    InvalidMaxFrames(usize),
    #[error("flush_interval must be at least 1ms, got {0:?}")]
    FlushIntervalTooShort(Duration),
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            enabled_metrics: EnabledMetrics::default(),
            max_frames: DEFAULT_MAX_FRAMES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl Default for EnabledMetrics {
    fn default() -> Self {
        EnabledMetrics {
            cpu_time: true,
            alloc_samples: true,
        }
    }
}

impl EnabledMetrics {
    /// Value types declared by every profile of a recorder, in order.
    pub fn value_types(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|metric| self.is_enabled(*metric))
            .collect()
    }

    pub fn is_enabled(&self, metric: Metric) -> bool {
        match metric {
            Metric::CpuTime => self.cpu_time,
            Metric::AllocSamples => self.alloc_samples,
            Metric::CpuSamples | Metric::WallTime => true,
        }
    }
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let configuration: Configuration = serde_json::from_str(json)?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_frames > MAX_FRAMES_LIMIT {
            return Err(ConfigurationError::InvalidMaxFrames(self.max_frames));
        }
        if self.flush_interval < Duration::from_millis(1) {
            return Err(ConfigurationError::FlushIntervalTooShort(
                self.flush_interval,
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        let all = EnabledMetrics {
            cpu_time: true,
            alloc_samples: true,
        };
        assert_eq!(all.value_types(), Metric::ALL.to_vec());

        let no_cpu = EnabledMetrics {
            cpu_time: false,
            alloc_samples: true,
        };
        assert_eq!(
            no_cpu.value_types(),
            vec![Metric::CpuSamples, Metric::WallTime, Metric::AllocSamples]
        );

        let no_alloc = EnabledMetrics {
            cpu_time: true,
            alloc_samples: false,
        };
        assert_eq!(
            no_alloc.value_types(),
            vec![Metric::CpuTime, Metric::CpuSamples, Metric::WallTime]
        );
    }

    #[test]
    fn test_from_json() {
        let configuration = Configuration::from_json(
            r#"{"enabled_metrics": {"cpu_time": false}, "max_frames": 64, "flush_interval": 1000}"#,
        )
        .unwrap();
        assert_eq!(configuration.max_frames, 64);
        assert_eq!(configuration.flush_interval, Duration::from_secs(1));
        assert!(!configuration.enabled_metrics.cpu_time);
        assert!(configuration.enabled_metrics.alloc_samples);
    }

    #[test]
    fn test_from_json_defaults() {
        assert_eq!(Configuration::from_json("{}").unwrap(), Configuration::default());
    }

    #[test]
    fn test_zero_max_frames_is_valid() {
        let configuration = Configuration::from_json(r#"{"max_frames": 0}"#).unwrap();
        assert_eq!(configuration.max_frames, 0);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(
            Configuration::from_json(r#"{"max_frames": 10001}"#),
            Err(ConfigurationError::InvalidMaxFrames(10001))
        ));
        assert!(matches!(
            Configuration::from_json(r#"{"flush_interval": 0}"#),
            Err(ConfigurationError::FlushIntervalTooShort(_))
        ));
        assert!(matches!(
            Configuration::from_json("not json"),
            Err(ConfigurationError::Parse(_))
        ));
    }
}
