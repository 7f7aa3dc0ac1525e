// src/query.rs
//
// =============================================================================
// WORKSHOPNET: QUERY SURFACE (v 0.3 )
// =============================================================================
//
// Read-only views over one network. Nothing here writes the marking or the
// history; enablement is re-evaluated for reporting only.

use crate::census::ResourceCounts;
use crate::core::{HistoryEntry, NetworkState, Place, PlaceKind, TransitionKind};
use crate::enablement::{self, Verdict};
use crate::error::{NetError, NetResult};
use crate::reconcile;
use crate::store;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// 1. VIEW MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlaceView {
    pub id: String,
    pub name: String,
    pub category: PlaceKind,
    pub tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransitionView {
    pub id: String,
    pub name: String,
    pub category: TransitionKind,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransitionStatus {
    pub id: String,
    pub name: String,
    pub category: TransitionKind,
    pub administratively_enabled: bool,
    pub marking_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentState {
    pub network: String,
    pub network_id: String,
    pub version: i64,
    /// Marking keyed by place name.
    pub marking: BTreeMap<String, u32>,
    pub places: Vec<PlaceView>,
    pub enabled_transitions: Vec<TransitionView>,
    pub recent_history: Vec<HistoryEntry>,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NetworkInfo {
    pub total_places: usize,
    pub total_transitions: usize,
    pub total_arcs: usize,
    pub places_with_tokens: usize,
    pub enabled_transitions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSummary {
    pub network: NetworkInfo,
    pub total_tokens: u64,
    /// Tokens summed per place category.
    pub distribution: BTreeMap<String, u64>,
    pub external: ResourceCounts,
    pub synchronized: bool,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// 2. READERS
// ============================================================================

fn require_state(conn: &Connection, network: &str, cap: usize) -> NetResult<NetworkState> {
    store::load_state(conn, network, cap)?.ok_or_else(|| NetError::not_found(network))
}

fn place_views(places: Vec<Place>, state: &NetworkState) -> Vec<PlaceView> {
    places
        .into_iter()
        .map(|p| PlaceView {
            tokens: state.marking.tokens(&p.id),
            id: p.id,
            name: p.name,
            category: p.kind,
            capacity: p.capacity,
            resource_id: p.resource_id,
            usage: p.usage,
        })
        .collect()
}

/// Every transition with its administrative flag and current verdict.
fn statuses(conn: &Connection, state: &NetworkState) -> NetResult<Vec<TransitionStatus>> {
    let mut out = Vec::new();
    for t in store::load_transitions(conn, &state.name)? {
        let inputs = store::input_arcs(conn, &state.name, &t.id)?;
        let verdict = enablement::check(&t, &inputs, &state.marking);
        out.push(TransitionStatus {
            blocked_by: match &verdict {
                Verdict::Enabled => None,
                other => Some(other.to_string()),
            },
            marking_enabled: verdict.is_enabled(),
            administratively_enabled: t.enabled,
            id: t.id,
            name: t.name,
            category: t.kind,
        });
    }
    Ok(out)
}

fn enabled_only(statuses: Vec<TransitionStatus>) -> Vec<TransitionView> {
    statuses
        .into_iter()
        .filter(|s| s.marking_enabled)
        .map(|s| TransitionView {
            id: s.id,
            name: s.name,
            category: s.category,
        })
        .collect()
}

pub(crate) fn current_state(
    conn: &Connection,
    network: &str,
    cap: usize,
    recent: usize,
) -> NetResult<CurrentState> {
    let state = require_state(conn, network, cap)?;
    let places = store::load_places(conn, network)?;
    let marking = state.marking.by_name(&places);
    let enabled_transitions = enabled_only(statuses(conn, &state)?);

    Ok(CurrentState {
        network: state.name.clone(),
        network_id: state.id.clone(),
        version: state.version,
        marking,
        places: place_views(places, &state),
        enabled_transitions,
        recent_history: state.history.recent(recent).cloned().collect(),
        total_tokens: state.marking.total(),
    })
}

pub(crate) fn network_info(conn: &Connection, network: &str, cap: usize) -> NetResult<NetworkInfo> {
    let state = require_state(conn, network, cap)?;
    let (total_places, total_transitions, total_arcs) = store::count_elements(conn, network)?;

    Ok(NetworkInfo {
        total_places,
        total_transitions,
        total_arcs,
        places_with_tokens: state.marking.occupied(),
        enabled_transitions: enabled_only(statuses(conn, &state)?)
            .into_iter()
            .map(|t| t.name)
            .collect(),
    })
}

pub(crate) fn places(conn: &Connection, network: &str, cap: usize) -> NetResult<Vec<PlaceView>> {
    let state = require_state(conn, network, cap)?;
    Ok(place_views(store::load_places(conn, network)?, &state))
}

pub(crate) fn transitions(
    conn: &Connection,
    network: &str,
    cap: usize,
) -> NetResult<Vec<TransitionStatus>> {
    let state = require_state(conn, network, cap)?;
    statuses(conn, &state)
}

pub(crate) fn find_transition(
    conn: &Connection,
    network: &str,
    cap: usize,
    name: &str,
) -> NetResult<TransitionView> {
    require_state(conn, network, cap)?;
    store::find_transition_by_name(conn, network, name)?
        .map(|t| TransitionView {
            id: t.id,
            name: t.name,
            category: t.kind,
        })
        .ok_or_else(|| NetError::validation(format!("no transition named '{}'", name)))
}

pub(crate) fn summary(
    conn: &Connection,
    network: &str,
    cap: usize,
    external: ResourceCounts,
) -> NetResult<SystemSummary> {
    let info = network_info(conn, network, cap)?;
    let state = require_state(conn, network, cap)?;
    let places = store::load_places(conn, network)?;

    let mut distribution: BTreeMap<String, u64> = BTreeMap::new();
    for p in &places {
        *distribution.entry(p.kind.to_string()).or_insert(0) +=
            state.marking.tokens(&p.id) as u64;
    }

    Ok(SystemSummary {
        network: info,
        total_tokens: state.marking.total(),
        distribution,
        synchronized: reconcile::in_sync(&state.marking, &places, &external),
        external,
        generated_at: Utc::now(),
    })
}
