// src/enablement.rs
//
// =============================================================================
// WORKSHOPNET: ENABLEMENT CHECKER (v 0.3 )
// =============================================================================
//
// Decides whether a transition can fire under the current marking.
//
// Rules:
// 1. Fails closed: malformed id, unknown transition, missing network state or
//    a cleared administrative flag all yield "not enabled".
// 2. Every input place must hold at least the summed weight of its arcs into
//    the transition.
// 3. A transition with no input arcs is enabled whenever its flag is set.
//
// No side effects. Arcs are re-read on every evaluation.

use crate::core::{parse_identity, Marking, NetArc, NetworkState, Transition};
use crate::error::NetResult;
use crate::store;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Enabled,
    Malformed,
    NoNetwork,
    UnknownTransition,
    AdministrativelyDisabled,
    Insufficient {
        place: String,
        held: u32,
        required: u32,
    },
}

impl Verdict {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Verdict::Enabled)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Enabled => write!(f, "enabled"),
            Verdict::Malformed => write!(f, "malformed transition id"),
            Verdict::NoNetwork => write!(f, "network state not found"),
            Verdict::UnknownTransition => write!(f, "unknown transition"),
            Verdict::AdministrativelyDisabled => write!(f, "transition is administratively disabled"),
            Verdict::Insufficient {
                place,
                held,
                required,
            } => write!(
                f,
                "place {} holds {} token(s), needs {}",
                place, held, required
            ),
        }
    }
}

/// The guard itself, over already-loaded data.
///
/// Demand is summed per place so two arcs drawing on the same place cannot
/// both pass against a single token.
pub fn check(transition: &Transition, inputs: &[NetArc], marking: &Marking) -> Verdict {
    if !transition.enabled {
        return Verdict::AdministrativelyDisabled;
    }

    let mut demand: BTreeMap<&str, u32> = BTreeMap::new();
    for arc in inputs {
        let need = demand.entry(arc.source.as_str()).or_insert(0);
        *need = need.saturating_add(arc.weight);
    }

    for (place, required) in demand {
        let held = marking.tokens(place);
        if held < required {
            return Verdict::Insufficient {
                place: place.to_string(),
                held,
                required,
            };
        }
    }

    Verdict::Enabled
}

/// Everything a firing needs, loaded in the caller's transaction.
#[derive(Debug)]
pub(crate) struct Evaluation {
    pub verdict: Verdict,
    pub transition: Option<Transition>,
    pub state: Option<NetworkState>,
    pub inputs: Vec<NetArc>,
}

impl Evaluation {
    fn closed(verdict: Verdict) -> Self {
        Self {
            verdict,
            transition: None,
            state: None,
            inputs: Vec::new(),
        }
    }
}

/// Loads the latest committed marking and evaluates the guard against it.
pub(crate) fn evaluate(
    conn: &Connection,
    network: &str,
    raw_id: &str,
    history_capacity: usize,
) -> NetResult<Evaluation> {
    let Ok(transition_id) = parse_identity(raw_id) else {
        return Ok(Evaluation::closed(Verdict::Malformed));
    };

    let Some(state) = store::load_state(conn, network, history_capacity)? else {
        return Ok(Evaluation::closed(Verdict::NoNetwork));
    };

    let Some(transition) = store::load_transition(conn, network, &transition_id)? else {
        return Ok(Evaluation::closed(Verdict::UnknownTransition));
    };

    let inputs = store::input_arcs(conn, network, &transition.id)?;
    let mut verdict = check(&transition, &inputs, &state.marking);

    // Report the place by name when we can.
    if let Verdict::Insufficient { place, .. } = &mut verdict {
        if let Some(p) = store::load_places(conn, network)?
            .into_iter()
            .find(|p| p.id == *place)
        {
            *place = p.name;
        }
    }

    log::debug!("enablement of {} on '{}': {}", transition.name, network, verdict);

    Ok(Evaluation {
        verdict,
        transition: Some(transition),
        state: Some(state),
        inputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArcDirection, TransitionKind};

    fn transition(enabled: bool) -> Transition {
        Transition {
            id: "t".into(),
            network: "net".into(),
            name: "assign-worker".into(),
            kind: TransitionKind::Assign,
            enabled,
            conditions: vec![],
            duration_min: None,
            task_id: None,
        }
    }

    fn input(place: &str, weight: u32) -> NetArc {
        NetArc {
            id: format!("arc-{}", place),
            network: "net".into(),
            source: place.into(),
            target: "t".into(),
            weight,
            direction: ArcDirection::PlaceToTransition,
        }
    }

    fn marking(entries: &[(&str, u32)]) -> Marking {
        let mut m = Marking::default();
        for (id, t) in entries {
            m.set(id, *t);
        }
        m
    }

    #[test]
    fn enabled_when_every_input_is_covered() {
        let m = marking(&[("p1", 2), ("p2", 1)]);
        let v = check(&transition(true), &[input("p1", 2), input("p2", 1)], &m);
        assert_eq!(v, Verdict::Enabled);
    }

    #[test]
    fn short_place_blocks() {
        let m = marking(&[("p1", 1)]);
        let v = check(&transition(true), &[input("p1", 2)], &m);
        assert_eq!(
            v,
            Verdict::Insufficient {
                place: "p1".into(),
                held: 1,
                required: 2
            }
        );
    }

    #[test]
    fn administrative_flag_wins_over_marking() {
        let m = marking(&[("p1", 5)]);
        let v = check(&transition(false), &[input("p1", 1)], &m);
        assert_eq!(v, Verdict::AdministrativelyDisabled);
    }

    #[test]
    fn no_inputs_is_vacuously_enabled() {
        assert!(check(&transition(true), &[], &Marking::default()).is_enabled());
        assert!(!check(&transition(false), &[], &Marking::default()).is_enabled());
    }

    #[test]
    fn parallel_arcs_from_one_place_are_summed() {
        let m = marking(&[("p1", 1)]);
        let v = check(&transition(true), &[input("p1", 1), input("p1", 1)], &m);
        assert!(matches!(v, Verdict::Insufficient { required: 2, .. }));
    }

    #[test]
    fn unknown_place_counts_as_empty() {
        let v = check(&transition(true), &[input("ghost", 1)], &Marking::default());
        assert!(matches!(v, Verdict::Insufficient { held: 0, .. }));
    }
}
