// src/core.rs
//
// =============================================================================
// WORKSHOPNET: CORE SCHEMA (v 0.3 )
// =============================================================================
//
// The data contracts shared by the builder, the firer, the reconciler and
// the store.
//
// Design Principles:
// 1. Newtype Pattern: a Marking is not just any map.
// 2. Closed vocabularies: categories are enums, stored as kebab strings.
// 3. Identities are UUID strings generated at build time.

use crate::error::{NetError, NetResult};
use crate::history::BoundedHistory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// 1. VOCABULARIES
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceKind {
    Worker,
    Machine,
    Workshop,
    Task,
    GenericResource,
}

impl PlaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceKind::Worker => "worker",
            PlaceKind::Machine => "machine",
            PlaceKind::Workshop => "workshop",
            PlaceKind::Task => "task",
            PlaceKind::GenericResource => "generic-resource",
        }
    }

    pub fn parse(s: &str) -> NetResult<Self> {
        match s {
            "worker" => Ok(PlaceKind::Worker),
            "machine" => Ok(PlaceKind::Machine),
            "workshop" => Ok(PlaceKind::Workshop),
            "task" => Ok(PlaceKind::Task),
            "generic-resource" => Ok(PlaceKind::GenericResource),
            other => Err(NetError::Corrupt(format!("unknown place category '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Assign,
    Release,
    Maintenance,
    Production,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Assign => "assign",
            TransitionKind::Release => "release",
            TransitionKind::Maintenance => "maintenance",
            TransitionKind::Production => "production",
        }
    }

    pub fn parse(s: &str) -> NetResult<Self> {
        match s {
            "assign" => Ok(TransitionKind::Assign),
            "release" => Ok(TransitionKind::Release),
            "maintenance" => Ok(TransitionKind::Maintenance),
            "production" => Ok(TransitionKind::Production),
            other => Err(NetError::Corrupt(format!(
                "unknown transition category '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

impl ArcDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArcDirection::PlaceToTransition => "place-to-transition",
            ArcDirection::TransitionToPlace => "transition-to-place",
        }
    }

    pub fn parse(s: &str) -> NetResult<Self> {
        match s {
            "place-to-transition" => Ok(ArcDirection::PlaceToTransition),
            "transition-to-place" => Ok(ArcDirection::TransitionToPlace),
            other => Err(NetError::Corrupt(format!("unknown arc direction '{}'", other))),
        }
    }
}

// ============================================================================
// 2. NETWORK ELEMENTS
// ============================================================================

/// A token holder. `tokens` mirrors the marking entry for `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub id: String,
    pub network: String,
    pub name: String,
    pub kind: PlaceKind,
    pub tokens: u32,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub id: String,
    pub network: String,
    pub name: String,
    pub kind: TransitionKind,
    /// Administrative kill-switch, independent of the marking.
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub duration_min: Option<u32>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// A weighted edge. Never place->place or transition->transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetArc {
    pub id: String,
    pub network: String,
    pub source: String,
    pub target: String,
    pub weight: u32,
    pub direction: ArcDirection,
}

pub fn new_identity() -> String {
    Uuid::new_v4().to_string()
}

/// Rejects anything that is not a well-formed identity.
pub fn parse_identity(raw: &str) -> NetResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NetError::validation("transition id is required"));
    }
    Uuid::parse_str(trimmed)
        .map(|u| u.to_string())
        .map_err(|_| NetError::validation(format!("malformed transition id '{}'", trimmed)))
}

// ============================================================================
// 3. MARKING (The State)
// ============================================================================

/// Token count per place identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Marking(BTreeMap<String, u32>);

impl Marking {
    pub fn zero<'a>(place_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self(place_ids.into_iter().map(|id| (id.to_string(), 0)).collect())
    }

    /// Missing places hold zero tokens.
    pub fn tokens(&self, place_id: &str) -> u32 {
        self.0.get(place_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, place_id: &str, tokens: u32) {
        self.0.insert(place_id.to_string(), tokens);
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|&t| t as u64).sum()
    }

    pub fn occupied(&self) -> usize {
        self.0.values().filter(|&&t| t > 0).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-keys the marking by place display name.
    pub fn by_name(&self, places: &[Place]) -> BTreeMap<String, u32> {
        places
            .iter()
            .map(|p| (p.name.clone(), self.tokens(&p.id)))
            .collect()
    }
}

// ============================================================================
// 4. NETWORK STATE (The Aggregate)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub transition_id: String,
    pub transition_name: String,
    pub before: Marking,
    pub after: Marking,
}

/// One live network per name. Owns the marking and the firing history.
#[derive(Debug, Clone)]
pub struct NetworkState {
    pub id: String,
    pub name: String,
    pub place_ids: Vec<String>,
    pub transition_ids: Vec<String>,
    pub arc_ids: Vec<String>,
    pub marking: Marking,
    pub history: BoundedHistory<HistoryEntry>,
    /// Bumped on every committed write.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// 5. RESULTS
// ============================================================================

/// Transport-facing shape of a fire attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_marking: Option<Marking>,
}

impl From<NetResult<Marking>> for FireOutcome {
    fn from(res: NetResult<Marking>) -> Self {
        match res {
            Ok(marking) => FireOutcome {
                success: true,
                message: None,
                new_marking: Some(marking),
            },
            Err(e) => FireOutcome {
                success: false,
                message: Some(e.to_string()),
                new_marking: None,
            },
        }
    }
}

impl fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
