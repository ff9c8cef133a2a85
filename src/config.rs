//! Typed configuration for the two binaries, loaded from an optional
//! TOML file with field-level defaults (SPEC_FULL §2a). Mirrors the
//! teacher's `DatabaseConfig`/`Default` shape, but is actually parsed
//! from disk here instead of only being printed back out.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_prepare_timeout_ms() -> u64 {
    1_000
}

fn default_commit_timeout_ms() -> u64 {
    1_000
}

fn default_inactivity_threshold_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantEndpointConfig {
    pub account: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    pub participants: Vec<ParticipantEndpointConfig>,
    #[serde(default = "default_prepare_timeout_ms")]
    pub prepare_timeout_ms: u64,
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,
}

impl CoordinatorConfig {
    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.prepare_timeout_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 7700,
            participants: vec![
                ParticipantEndpointConfig {
                    account: "A".to_string(),
                    host: default_host(),
                    port: 7701,
                },
                ParticipantEndpointConfig {
                    account: "B".to_string(),
                    host: default_host(),
                    port: 7702,
                },
            ],
            prepare_timeout_ms: default_prepare_timeout_ms(),
            commit_timeout_ms: default_commit_timeout_ms(),
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    pub account: String,
    pub coordinator_host: String,
    pub coordinator_port: u16,
    pub balance_file: String,
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,
}

impl ParticipantConfig {
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn coordinator_addr(&self) -> String {
        format!("{}:{}", self.coordinator_host, self.coordinator_port)
    }
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 7701,
            account: "A".to_string(),
            coordinator_host: default_host(),
            coordinator_port: 7700,
            balance_file: "./data/a.balance".to_string(),
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
        }
    }
}

/// Loads a TOML config from `path` if it exists, falling back to
/// `Default` otherwise.
pub fn load_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match path {
        Some(path) if path.exists() => {
            let text = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&text)?)
        }
        _ => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_config_defaults() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.participants.len(), 2);
        assert_eq!(cfg.addr(), "127.0.0.1:7700");
    }

    #[test]
    fn load_or_default_falls_back_when_missing() {
        let cfg: CoordinatorConfig = load_or_default(Some(Path::new("/nonexistent/x.toml"))).unwrap();
        assert_eq!(cfg.port, 7700);
    }

    #[test]
    fn load_or_default_parses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordinator.toml");
        std::fs::write(
            &path,
            r#"
            port = 9000

            [[participants]]
            account = "A"
            host = "127.0.0.1"
            port = 9001

            [[participants]]
            account = "B"
            host = "127.0.0.1"
            port = 9002
            "#,
        )
        .unwrap();
        let cfg: CoordinatorConfig = load_or_default(Some(&path)).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.participants.len(), 2);
        assert_eq!(cfg.prepare_timeout_ms, default_prepare_timeout_ms());
    }
}
