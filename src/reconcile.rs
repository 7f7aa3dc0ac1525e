// src/reconcile.rs
//
// =============================================================================
// WORKSHOPNET: RECONCILER (v 0.3 )
// =============================================================================
//
// Overwrites the marking from the external resource counts.
//
// This is NOT a Petri-net firing:
// - it bypasses arcs and weights entirely,
// - it never appends a history entry,
// - token conservation therefore only holds between two synchronizations.
// The resource records are the source of truth; the net follows them.

use crate::census::ResourceCounts;
use crate::core::{Marking, Place};
use crate::error::{NetError, NetResult};
use crate::store;
use rusqlite::Connection;

/// Sets every mapped place to its external count. Unmapped places keep
/// their tokens. Returns the places whose count actually changed.
pub fn overwrite<'a>(
    marking: &mut Marking,
    places: &'a [Place],
    counts: &ResourceCounts,
) -> Vec<&'a Place> {
    let mut changed = Vec::new();
    for place in places {
        if let Some(tokens) = counts.tokens_for(&place.name) {
            if marking.tokens(&place.id) != tokens {
                changed.push(place);
            }
            marking.set(&place.id, tokens);
        }
    }
    changed
}

/// True when every mapped place already equals its external count.
pub fn in_sync(marking: &Marking, places: &[Place], counts: &ResourceCounts) -> bool {
    places.iter().all(|p| match counts.tokens_for(&p.name) {
        Some(tokens) => marking.tokens(&p.id) == tokens,
        None => true,
    })
}

/// Applies `counts` to the stored network inside the caller's transaction.
pub(crate) fn apply_counts(
    conn: &Connection,
    network: &str,
    counts: &ResourceCounts,
    history_capacity: usize,
) -> NetResult<Marking> {
    let mut state = store::load_state(conn, network, history_capacity)?
        .ok_or_else(|| NetError::not_found(network))?;
    let places = store::load_places(conn, network)?;

    let changed = overwrite(&mut state.marking, &places, counts);
    for place in &places {
        if counts.tokens_for(&place.name).is_some() {
            store::set_place_tokens(conn, &place.id, state.marking.tokens(&place.id))?;
        }
    }
    store::save_state(conn, &mut state)?;

    log::info!(
        "synchronized '{}' with resource records ({} place(s) changed)",
        network,
        changed.len()
    );
    Ok(state.marking)
}
