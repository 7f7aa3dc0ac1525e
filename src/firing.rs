// src/firing.rs
//
// =============================================================================
// WORKSHOPNET: TRANSITION FIRER (v 0.3 )
// =============================================================================
//
// Applies one transition to the marking.
//
// Lifecycle of a firing (all inside the caller's IMMEDIATE transaction):
// 1. Validate the identity.
// 2. Re-evaluate the guard against the latest committed marking.
// 3. Snapshot "before", consume inputs, produce outputs.
// 4. Mirror the touched places' token columns.
// 5. Append a history entry (bounded) and persist the state.

use crate::core::{parse_identity, HistoryEntry, Marking, NetArc};
use crate::enablement::{self, Verdict};
use crate::error::{NetError, NetResult};
use crate::store;
use chrono::Utc;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Consumes input weights and produces output weights.
///
/// Works on a copy: the marking is only replaced when every arc applied,
/// so a failure never leaves it half-updated.
pub fn apply(marking: &mut Marking, inputs: &[NetArc], outputs: &[NetArc]) -> NetResult<()> {
    let mut next = marking.clone();

    for arc in inputs {
        let held = next.tokens(&arc.source);
        let left = held.checked_sub(arc.weight).ok_or_else(|| {
            NetError::Corrupt(format!(
                "place {} would drop below zero ({} - {})",
                arc.source, held, arc.weight
            ))
        })?;
        next.set(&arc.source, left);
    }

    for arc in outputs {
        let held = next.tokens(&arc.target);
        let grown = held.checked_add(arc.weight).ok_or_else(|| {
            NetError::Corrupt(format!("place {} token count overflow", arc.target))
        })?;
        next.set(&arc.target, grown);
    }

    *marking = next;
    Ok(())
}

/// Fires `raw_id` on `network`. Returns the new marking.
pub(crate) fn fire(
    conn: &Connection,
    network: &str,
    raw_id: &str,
    history_capacity: usize,
) -> NetResult<Marking> {
    parse_identity(raw_id)?;

    let eval = enablement::evaluate(conn, network, raw_id, history_capacity)?;
    let name = eval
        .transition
        .as_ref()
        .map(|t| t.name.clone())
        .unwrap_or_else(|| raw_id.to_string());

    match eval.verdict {
        Verdict::Enabled => {}
        Verdict::Malformed => {
            return Err(NetError::validation(format!(
                "malformed transition id '{}'",
                raw_id
            )))
        }
        Verdict::NoNetwork => return Err(NetError::not_found(network)),
        Verdict::UnknownTransition => {
            return Err(NetError::validation(format!(
                "unknown transition id '{}'",
                raw_id
            )))
        }
        refused => {
            log::warn!("refused to fire {} on '{}': {}", name, network, refused);
            return Err(NetError::NotEnabled {
                transition: name,
                reason: refused.to_string(),
            });
        }
    }

    let (Some(transition), Some(mut state)) = (eval.transition, eval.state) else {
        return Err(NetError::Corrupt(format!(
            "enabled verdict for {} without loaded state",
            name
        )));
    };

    let outputs = store::output_arcs(conn, network, &transition.id)?;
    let before = state.marking.clone();
    apply(&mut state.marking, &eval.inputs, &outputs)?;

    let touched: BTreeSet<&str> = eval
        .inputs
        .iter()
        .map(|a| a.source.as_str())
        .chain(outputs.iter().map(|a| a.target.as_str()))
        .collect();
    for place_id in touched {
        store::set_place_tokens(conn, place_id, state.marking.tokens(place_id))?;
    }

    state.history.push(HistoryEntry {
        timestamp: Utc::now(),
        transition_id: transition.id.clone(),
        transition_name: transition.name.clone(),
        before,
        after: state.marking.clone(),
    });
    store::save_state(conn, &mut state)?;

    log::info!(
        "fired {} on '{}' (v{}, {} history entries)",
        transition.name,
        network,
        state.version,
        state.history.len()
    );
    Ok(state.marking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArcDirection;

    fn arc(source: &str, target: &str, weight: u32, direction: ArcDirection) -> NetArc {
        NetArc {
            id: format!("{}->{}", source, target),
            network: "net".into(),
            source: source.into(),
            target: target.into(),
            weight,
            direction,
        }
    }

    #[test]
    fn moves_exact_weights() {
        let mut m = Marking::default();
        m.set("in", 5);
        m.set("out", 1);
        let inputs = [arc("in", "t", 2, ArcDirection::PlaceToTransition)];
        let outputs = [arc("t", "out", 3, ArcDirection::TransitionToPlace)];

        apply(&mut m, &inputs, &outputs).unwrap();
        assert_eq!(m.tokens("in"), 3);
        assert_eq!(m.tokens("out"), 4);
    }

    #[test]
    fn underflow_leaves_marking_untouched() {
        let mut m = Marking::default();
        m.set("a", 1);
        m.set("b", 0);
        let inputs = [
            arc("a", "t", 1, ArcDirection::PlaceToTransition),
            arc("b", "t", 1, ArcDirection::PlaceToTransition),
        ];
        let before = m.clone();

        assert!(matches!(apply(&mut m, &inputs, &[]), Err(NetError::Corrupt(_))));
        assert_eq!(m, before);
    }

    #[test]
    fn output_to_fresh_place_creates_entry() {
        let mut m = Marking::default();
        let outputs = [arc("t", "new", 1, ArcDirection::TransitionToPlace)];
        apply(&mut m, &[], &outputs).unwrap();
        assert_eq!(m.tokens("new"), 1);
        assert_eq!(m.len(), 1);
    }
}
