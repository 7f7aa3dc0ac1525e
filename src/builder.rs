// src/builder.rs
//
// =============================================================================
// WORKSHOPNET: NETWORK BUILDER (v 0.3 )
// =============================================================================
//
// Materializes a Topology under a network name.
//
// Always a full reset, never a merge: everything tagged with the name is
// deleted first, then places, transitions, arcs and a zero-marking state are
// inserted. Runs inside the caller's transaction, so an arc that cannot be
// resolved aborts the whole build and nothing is persisted.

use crate::core::{new_identity, ArcDirection, Marking, NetArc, NetworkState, Place, Transition};
use crate::error::{NetError, NetResult};
use crate::history::BoundedHistory;
use crate::store;
use crate::topology::Topology;
use chrono::Utc;
use rusqlite::Connection;
use std::collections::HashMap;

pub(crate) fn build(
    conn: &Connection,
    network: &str,
    topology: &Topology,
    history_capacity: usize,
) -> NetResult<NetworkState> {
    topology.validate()?;

    let removed = store::delete_network(conn, network)?;
    if removed > 0 {
        log::info!("discarded {} record(s) of previous network '{}'", removed, network);
    }

    // 1. Places
    let mut place_ids: HashMap<&str, String> = HashMap::new();
    let mut place_order = Vec::with_capacity(topology.places.len());
    for spec in &topology.places {
        let place = Place {
            id: new_identity(),
            network: network.to_string(),
            name: spec.name.clone(),
            kind: spec.kind,
            tokens: 0,
            capacity: spec.capacity,
            resource_id: None,
            usage: spec.usage.clone(),
        };
        store::insert_place(conn, &place)?;
        place_ids.insert(spec.name.as_str(), place.id.clone());
        place_order.push(place.id);
    }

    // 2. Transitions
    let mut transition_ids: HashMap<&str, String> = HashMap::new();
    let mut transition_order = Vec::with_capacity(topology.transitions.len());
    for spec in &topology.transitions {
        let transition = Transition {
            id: new_identity(),
            network: network.to_string(),
            name: spec.name.clone(),
            kind: spec.kind,
            enabled: spec.enabled,
            conditions: spec.conditions.clone(),
            duration_min: spec.duration_min,
            task_id: None,
        };
        store::insert_transition(conn, &transition)?;
        transition_ids.insert(spec.name.as_str(), transition.id.clone());
        transition_order.push(transition.id);
    }

    // 3. Arcs (names -> generated identities)
    let mut arc_order = Vec::with_capacity(topology.arcs.len());
    for spec in &topology.arcs {
        let (sources, targets) = match spec.direction {
            ArcDirection::PlaceToTransition => (&place_ids, &transition_ids),
            ArcDirection::TransitionToPlace => (&transition_ids, &place_ids),
        };
        let unresolved = |name: &str| {
            NetError::Topology(format!(
                "arc {} -> {} references unresolved '{}'",
                spec.from, spec.to, name
            ))
        };
        let source = sources
            .get(spec.from.as_str())
            .ok_or_else(|| unresolved(&spec.from))?;
        let target = targets
            .get(spec.to.as_str())
            .ok_or_else(|| unresolved(&spec.to))?;

        let arc = NetArc {
            id: new_identity(),
            network: network.to_string(),
            source: source.clone(),
            target: target.clone(),
            weight: spec.weight,
            direction: spec.direction,
        };
        store::insert_arc(conn, &arc)?;
        arc_order.push(arc.id);
    }

    // 4. Zero marking, empty history
    let state = NetworkState {
        id: new_identity(),
        name: network.to_string(),
        marking: Marking::zero(place_order.iter().map(String::as_str)),
        place_ids: place_order,
        transition_ids: transition_order,
        arc_ids: arc_order,
        history: BoundedHistory::new(history_capacity),
        version: 1,
        updated_at: Utc::now(),
    };
    store::insert_state(conn, &state)?;

    log::info!(
        "built network '{}': {} places, {} transitions, {} arcs",
        network,
        state.place_ids.len(),
        state.transition_ids.len(),
        state.arc_ids.len()
    );
    Ok(state)
}

/// Deletes the network without rebuilding. Idempotent.
pub(crate) fn reset(conn: &Connection, network: &str) -> NetResult<usize> {
    let removed = store::delete_network(conn, network)?;
    log::info!("reset network '{}' ({} record(s) removed)", network, removed);
    Ok(removed)
}
