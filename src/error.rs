// src/error.rs
//
// =============================================================================
// WORKSHOPNET: ERROR TAXONOMY (v 0.3 )
// =============================================================================
//
// Every engine operation reports through `NetError`.
// Callers can tell "can't" (Validation / NotFound) apart from "won't"
// (NotEnabled) without parsing messages.

use thiserror::Error;

pub type NetResult<T> = Result<T, NetError>;

#[derive(Error, Debug)]
pub enum NetError {
    /// Malformed or unknown identity, missing field, bad status string.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The transition exists but its guard does not hold.
    #[error("transition {transition} is not enabled: {reason}")]
    NotEnabled { transition: String, reason: String },

    /// No NetworkState record under this name.
    #[error("network '{network}' not found (initialize it first)")]
    NotFound { network: String },

    /// Topology rejected before anything was persisted.
    #[error("invalid topology: {0}")]
    Topology(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A resource collaborator could not report its counts.
    #[error("resource census failed: {0:#}")]
    Census(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A stored value violates an engine invariant.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: lock poisoned")]
    StoreUnavailable,
}

impl NetError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(network: &str) -> Self {
        Self::NotFound {
            network: network.to_string(),
        }
    }

    /// True for errors that leave the store untouched by construction.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotEnabled { .. } | Self::NotFound { .. }
        )
    }
}
