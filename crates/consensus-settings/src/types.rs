//! Settings types. Keys are camelCase on disk.

use std::time::Duration;

use consensus_core::ConsensusDetection;
use consensus_telemetry::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/";
pub const DEFAULT_MAX_TURNS: u32 = 50;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Top-level settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsensusSettings {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Model for the first participant. Required.
    pub model1: String,
    /// Model for the second participant. Required.
    pub model2: String,
    /// Turn cap; 0 means unlimited.
    pub max_turns: u32,
    pub consensus_detection: ConsensusDetection,
    pub sentinel: String,
    /// Seconds without stream bytes before a turn fails; 0 disables.
    pub idle_timeout_secs: u64,
    pub logging: LoggingSettings,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model1: String::new(),
            model2: String::new(),
            max_turns: DEFAULT_MAX_TURNS,
            consensus_detection: ConsensusDetection::default(),
            sentinel: "CONSENSUS".to_string(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            logging: LoggingSettings::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl ConsensusSettings {
    pub fn max_turns_cap(&self) -> Option<u32> {
        (self.max_turns > 0).then_some(self.max_turns)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Check required keys and value shapes after all layers are applied.
    pub fn validate(&self) -> Result<()> {
        if self.model1.trim().is_empty() {
            return Err(SettingsError::MissingKey("model1"));
        }
        if self.model2.trim().is_empty() {
            return Err(SettingsError::MissingKey("model2"));
        }
        let url = self.ollama_url.trim();
        if url.is_empty() {
            return Err(SettingsError::MissingKey("ollamaUrl"));
        }
        let host = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .ok_or_else(|| {
                SettingsError::InvalidValue(format!("ollamaUrl must be http or https: {url}"))
            })?;
        if host.trim_matches('/').is_empty() {
            return Err(SettingsError::InvalidValue(format!("ollamaUrl has no host: {url}")));
        }
        if self.consensus_detection.uses_sentinel() && self.sentinel.split_whitespace().count() != 1 {
            return Err(SettingsError::InvalidValue(
                "sentinel must be a single word".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConsensusSettings {
        ConsensusSettings {
            model1: "llama3".into(),
            model2: "mistral".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let s = ConsensusSettings::default();
        assert_eq!(s.ollama_url, "http://localhost:11434/");
        assert_eq!(s.max_turns_cap(), Some(50));
        assert_eq!(s.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(s.consensus_detection, ConsensusDetection::Both);
        assert_eq!(s.logging.level, "warn");
    }

    #[test]
    fn zero_disables_caps() {
        let s = ConsensusSettings {
            max_turns: 0,
            idle_timeout_secs: 0,
            ..valid()
        };
        assert_eq!(s.max_turns_cap(), None);
        assert_eq!(s.idle_timeout(), None);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(valid()).unwrap();
        assert_eq!(json["ollamaUrl"], "http://localhost:11434/");
        assert_eq!(json["consensusDetection"], "both");
        assert_eq!(json["idleTimeoutSecs"], 300);
        assert_eq!(json["logging"]["format"], "pretty");
    }

    #[test]
    fn validate_requires_models() {
        assert!(valid().validate().is_ok());

        let s = ConsensusSettings {
            model2: "  ".into(),
            ..valid()
        };
        assert!(matches!(s.validate(), Err(SettingsError::MissingKey("model2"))));
        assert!(matches!(
            ConsensusSettings::default().validate(),
            Err(SettingsError::MissingKey("model1"))
        ));
    }

    #[test]
    fn validate_checks_url() {
        let bad_scheme = ConsensusSettings {
            ollama_url: "ftp://host/".into(),
            ..valid()
        };
        assert!(matches!(bad_scheme.validate(), Err(SettingsError::InvalidValue(_))));

        let no_host = ConsensusSettings {
            ollama_url: "http://".into(),
            ..valid()
        };
        assert!(matches!(no_host.validate(), Err(SettingsError::InvalidValue(_))));

        let empty = ConsensusSettings {
            ollama_url: String::new(),
            ..valid()
        };
        assert!(matches!(empty.validate(), Err(SettingsError::MissingKey("ollamaUrl"))));
    }

    #[test]
    fn sentinel_only_checked_when_used() {
        let s = ConsensusSettings {
            sentinel: "WE AGREE".into(),
            ..valid()
        };
        assert!(s.validate().is_err());

        let structured = ConsensusSettings {
            consensus_detection: ConsensusDetection::Structured,
            ..s
        };
        assert!(structured.validate().is_ok());
    }
}
