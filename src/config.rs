// src/config.rs
//
// =============================================================================
// WORKSHOPNET: ENGINE CONFIGURATION (v 0.3 )
// =============================================================================
//
// Defaults, optionally overridden by a YAML file, then by CLI flags.
//
// Example file:
//
//   network_name: workshop-main
//   history_capacity: 50
//   recent_history: 10
//   db_path: workshop.db

use crate::error::{NetError, NetResult};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NETWORK: &str = "workshop-main";

/// Upper bound for `history_capacity`. The whole history is one JSON column.
pub const MAX_HISTORY_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Lookup key of the NetworkState record.
    pub network_name: String,
    /// Maximum firing records kept per network.
    pub history_capacity: usize,
    /// Entries shown by the current-state view.
    pub recent_history: usize,
    pub db_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network_name: DEFAULT_NETWORK.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            recent_history: 10,
            db_path: PathBuf::from("workshop.db"),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> NetResult<Self> {
        let cfg: EngineConfig =
            serde_yaml::from_str(text).map_err(|e| NetError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NetError::Config(format!("cannot read {:?}: {}", path, e)))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> NetResult<()> {
        if self.network_name.trim().is_empty() {
            return Err(NetError::Config("network_name must not be empty".into()));
        }
        if self.history_capacity == 0 {
            return Err(NetError::Config("history_capacity must be at least 1".into()));
        }
        if self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(NetError::Config(format!(
                "history_capacity {} exceeds the maximum of {}",
                self.history_capacity, MAX_HISTORY_CAPACITY
            )));
        }
        Ok(())
    }

    pub fn with_network(mut self, name: impl Into<String>) -> Self {
        self.network_name = name.into();
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = EngineConfig::from_yaml_str("history_capacity: 5\n").unwrap();
        assert_eq!(cfg.history_capacity, 5);
        assert_eq!(cfg.network_name, DEFAULT_NETWORK);
        assert_eq!(cfg.recent_history, 10);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = EngineConfig::from_yaml_str("history_capacity: 0\n").unwrap_err();
        assert!(matches!(err, NetError::Config(_)));
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        let err =
            EngineConfig::from_yaml_str("history_capacity: 18446744073709551615\n").unwrap_err();
        assert!(matches!(err, NetError::Config(ref m) if m.contains("exceeds")));

        let at_limit = format!("history_capacity: {}\n", MAX_HISTORY_CAPACITY);
        assert!(EngineConfig::from_yaml_str(&at_limit).is_ok());
        assert!(EngineConfig::default()
            .with_history_capacity(MAX_HISTORY_CAPACITY + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_yaml_str("history_capacity: [oops"),
            Err(NetError::Config(_))
        ));
    }

    #[test]
    fn builders_override() {
        let cfg = EngineConfig::default()
            .with_network("annex")
            .with_history_capacity(3)
            .with_db_path("/tmp/x.db");
        assert_eq!(cfg.network_name, "annex");
        assert_eq!(cfg.history_capacity, 3);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert!(cfg.validate().is_ok());
    }
}
