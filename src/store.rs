// src/store.rs
//
// =============================================================================
// WORKSHOPNET: NETWORK STORE (v 0.3 )
// =============================================================================
//
// The Persistence Layer.
//
// Architecture:
// - SQLite using the "Hybrid Relational" pattern.
// - Hot fields (network, name, tokens, enabled, arc endpoints) are columns.
// - Optional attributes, marking and history are JSON text.
// - Places/transitions/arcs are separate rows referenced by identity strings.
// - Every mutation runs inside one BEGIN IMMEDIATE transaction: either the
//   whole step commits or nothing does.

use crate::core::{
    ArcDirection, HistoryEntry, Marking, NetArc, NetworkState, Place, PlaceKind, Transition,
    TransitionKind,
};
use crate::error::{NetError, NetResult};
use crate::history::BoundedHistory;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

// -----------------------------------------------------------------------------
// Column payloads
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct PlaceDetail {
    capacity: Option<u32>,
    resource_id: Option<String>,
    usage: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TransitionDetail {
    #[serde(default)]
    conditions: Vec<String>,
    duration_min: Option<u32>,
    task_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Members {
    places: Vec<String>,
    transitions: Vec<String>,
    arcs: Vec<String>,
}

// -----------------------------------------------------------------------------
// NetStore
// -----------------------------------------------------------------------------

pub struct NetStore {
    conn: Mutex<Connection>,
}

impl NetStore {
    pub fn open(path: impl AsRef<Path>) -> NetResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> NetResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> NetResult<Self> {
        configure(&conn)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> NetResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| NetError::StoreUnavailable)
    }

    /// Runs `f` against a consistent snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> NetResult<T>) -> NetResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Runs `f` as one atomic unit. Any error rolls the whole unit back.
    pub fn write<T>(&self, f: impl FnOnce(&Connection) -> NetResult<T>) -> NetResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Journaling and contention pragmas shared by every connection we open.
pub(crate) fn configure(conn: &Connection) -> NetResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout=10000;",
    )?;
    Ok(())
}

fn init_schema(conn: &Connection) -> NetResult<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS places (
            id TEXT PRIMARY KEY,
            network TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            tokens INTEGER NOT NULL DEFAULT 0 CHECK (tokens >= 0),
            detail_json TEXT NOT NULL,
            UNIQUE (network, name)
        );

        CREATE TABLE IF NOT EXISTS transitions (
            id TEXT PRIMARY KEY,
            network TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            detail_json TEXT NOT NULL,
            UNIQUE (network, name)
        );

        CREATE TABLE IF NOT EXISTS arcs (
            id TEXT PRIMARY KEY,
            network TEXT NOT NULL,
            source TEXT NOT NULL,
            target TEXT NOT NULL,
            weight INTEGER NOT NULL CHECK (weight > 0),
            direction TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS network_states (
            network TEXT PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            members_json TEXT NOT NULL,
            marking_json TEXT NOT NULL,
            history_json TEXT NOT NULL,
            version INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL
        );

        -- Arc lookups by transition endpoint
        CREATE INDEX IF NOT EXISTS idx_arcs_target ON arcs(network, target, direction);
        CREATE INDEX IF NOT EXISTS idx_arcs_source ON arcs(network, source, direction);
        COMMIT;",
    )?;
    Ok(())
}

fn to_tokens(raw: i64, what: &str) -> NetResult<u32> {
    u32::try_from(raw).map_err(|_| NetError::Corrupt(format!("{} has token count {}", what, raw)))
}

// -------------------------------------------------------------------------
// WRITE API (Builder / Firer / Reconciler)
// -------------------------------------------------------------------------

/// Removes every record tagged with `network`. Returns the number of rows.
pub(crate) fn delete_network(conn: &Connection, network: &str) -> NetResult<usize> {
    let mut removed = 0;
    for table in ["arcs", "transitions", "places", "network_states"] {
        removed += conn.execute(
            &format!("DELETE FROM {} WHERE network = ?1", table),
            params![network],
        )?;
    }
    Ok(removed)
}

pub(crate) fn insert_place(conn: &Connection, place: &Place) -> NetResult<()> {
    let detail = PlaceDetail {
        capacity: place.capacity,
        resource_id: place.resource_id.clone(),
        usage: place.usage.clone(),
    };
    conn.execute(
        "INSERT INTO places (id, network, name, kind, tokens, detail_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            place.id,
            place.network,
            place.name,
            place.kind.as_str(),
            place.tokens,
            serde_json::to_string(&detail)?
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_transition(conn: &Connection, transition: &Transition) -> NetResult<()> {
    let detail = TransitionDetail {
        conditions: transition.conditions.clone(),
        duration_min: transition.duration_min,
        task_id: transition.task_id.clone(),
    };
    conn.execute(
        "INSERT INTO transitions (id, network, name, kind, enabled, detail_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            transition.id,
            transition.network,
            transition.name,
            transition.kind.as_str(),
            transition.enabled,
            serde_json::to_string(&detail)?
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_arc(conn: &Connection, arc: &NetArc) -> NetResult<()> {
    conn.execute(
        "INSERT INTO arcs (id, network, source, target, weight, direction)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            arc.id,
            arc.network,
            arc.source,
            arc.target,
            arc.weight,
            arc.direction.as_str()
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_state(conn: &Connection, state: &NetworkState) -> NetResult<()> {
    let members = Members {
        places: state.place_ids.clone(),
        transitions: state.transition_ids.clone(),
        arcs: state.arc_ids.clone(),
    };
    conn.execute(
        "INSERT INTO network_states
            (network, id, members_json, marking_json, history_json, version, updated_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            state.name,
            state.id,
            serde_json::to_string(&members)?,
            serde_json::to_string(&state.marking)?,
            serde_json::to_string(&state.history)?,
            state.version,
            state.updated_at.timestamp_millis()
        ],
    )?;
    Ok(())
}

/// Persists marking + history and bumps the version.
pub(crate) fn save_state(conn: &Connection, state: &mut NetworkState) -> NetResult<()> {
    state.version += 1;
    state.updated_at = Utc::now();
    let changed = conn.execute(
        "UPDATE network_states
         SET marking_json = ?1, history_json = ?2, version = ?3, updated_at_ms = ?4
         WHERE network = ?5",
        params![
            serde_json::to_string(&state.marking)?,
            serde_json::to_string(&state.history)?,
            state.version,
            state.updated_at.timestamp_millis(),
            state.name
        ],
    )?;
    if changed == 0 {
        return Err(NetError::not_found(&state.name));
    }
    Ok(())
}

pub(crate) fn set_place_tokens(conn: &Connection, place_id: &str, tokens: u32) -> NetResult<()> {
    conn.execute(
        "UPDATE places SET tokens = ?1 WHERE id = ?2",
        params![tokens, place_id],
    )?;
    Ok(())
}

/// Returns false when no such transition exists in `network`.
pub(crate) fn set_transition_enabled(
    conn: &Connection,
    network: &str,
    transition_id: &str,
    enabled: bool,
) -> NetResult<bool> {
    let changed = conn.execute(
        "UPDATE transitions SET enabled = ?1 WHERE id = ?2 AND network = ?3",
        params![enabled, transition_id, network],
    )?;
    Ok(changed > 0)
}

// -------------------------------------------------------------------------
// READ API
// -------------------------------------------------------------------------

pub(crate) fn load_state(
    conn: &Connection,
    network: &str,
    history_capacity: usize,
) -> NetResult<Option<NetworkState>> {
    let row = conn
        .query_row(
            "SELECT id, members_json, marking_json, history_json, version, updated_at_ms
             FROM network_states WHERE network = ?1",
            params![network],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, i64>(4)?,
                    r.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, members, marking, history, version, updated_ms)) = row else {
        return Ok(None);
    };

    let members: Members = serde_json::from_str(&members)?;
    let marking: Marking = serde_json::from_str(&marking)?;
    let entries: Vec<HistoryEntry> = serde_json::from_str(&history)?;
    let updated_at = DateTime::<Utc>::from_timestamp_millis(updated_ms)
        .ok_or_else(|| NetError::Corrupt(format!("bad timestamp {} on '{}'", updated_ms, network)))?;

    Ok(Some(NetworkState {
        id,
        name: network.to_string(),
        place_ids: members.places,
        transition_ids: members.transitions,
        arc_ids: members.arcs,
        marking,
        history: BoundedHistory::from_entries(history_capacity, entries),
        version,
        updated_at,
    }))
}

type PlaceRow = (String, String, String, i64, String);

fn place_row(r: &Row<'_>) -> rusqlite::Result<PlaceRow> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
}

fn place_from_row(network: &str, row: PlaceRow) -> NetResult<Place> {
    let (id, name, kind, tokens, detail) = row;
    let detail: PlaceDetail = serde_json::from_str(&detail)?;
    let tokens = to_tokens(tokens, &name)?;
    Ok(Place {
        id,
        network: network.to_string(),
        name,
        kind: PlaceKind::parse(&kind)?,
        tokens,
        capacity: detail.capacity,
        resource_id: detail.resource_id,
        usage: detail.usage,
    })
}

/// All places of a network in catalog order.
pub(crate) fn load_places(conn: &Connection, network: &str) -> NetResult<Vec<Place>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, kind, tokens, detail_json FROM places
         WHERE network = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![network], place_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(place_from_row(network, r?)?);
    }
    Ok(out)
}

type TransitionRow = (String, String, String, bool, String);

fn transition_row(r: &Row<'_>) -> rusqlite::Result<TransitionRow> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
}

fn transition_from_row(network: &str, row: TransitionRow) -> NetResult<Transition> {
    let (id, name, kind, enabled, detail) = row;
    let detail: TransitionDetail = serde_json::from_str(&detail)?;
    Ok(Transition {
        id,
        network: network.to_string(),
        name,
        kind: TransitionKind::parse(&kind)?,
        enabled,
        conditions: detail.conditions,
        duration_min: detail.duration_min,
        task_id: detail.task_id,
    })
}

pub(crate) fn load_transitions(conn: &Connection, network: &str) -> NetResult<Vec<Transition>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, kind, enabled, detail_json FROM transitions
         WHERE network = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![network], transition_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(transition_from_row(network, r?)?);
    }
    Ok(out)
}

pub(crate) fn load_transition(
    conn: &Connection,
    network: &str,
    transition_id: &str,
) -> NetResult<Option<Transition>> {
    let row: Option<TransitionRow> = conn
        .query_row(
            "SELECT id, name, kind, enabled, detail_json FROM transitions
             WHERE network = ?1 AND id = ?2",
            params![network, transition_id],
            transition_row,
        )
        .optional()?;
    row.map(|r| transition_from_row(network, r)).transpose()
}

pub(crate) fn find_transition_by_name(
    conn: &Connection,
    network: &str,
    name: &str,
) -> NetResult<Option<Transition>> {
    let row: Option<TransitionRow> = conn
        .query_row(
            "SELECT id, name, kind, enabled, detail_json FROM transitions
             WHERE network = ?1 AND name = ?2",
            params![network, name],
            transition_row,
        )
        .optional()?;
    row.map(|r| transition_from_row(network, r)).transpose()
}

fn query_arcs(conn: &Connection, sql: &str, network: &str, key: &str) -> NetResult<Vec<NetArc>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![network, key], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, u32>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for r in rows {
        let (id, source, target, weight, direction) = r?;
        out.push(NetArc {
            id,
            network: network.to_string(),
            source,
            target,
            weight,
            direction: ArcDirection::parse(&direction)?,
        });
    }
    Ok(out)
}

/// place -> transition arcs feeding `transition_id`.
pub(crate) fn input_arcs(
    conn: &Connection,
    network: &str,
    transition_id: &str,
) -> NetResult<Vec<NetArc>> {
    query_arcs(
        conn,
        "SELECT id, source, target, weight, direction FROM arcs
         WHERE network = ?1 AND target = ?2 AND direction = 'place-to-transition'
         ORDER BY rowid",
        network,
        transition_id,
    )
}

/// transition -> place arcs leaving `transition_id`.
pub(crate) fn output_arcs(
    conn: &Connection,
    network: &str,
    transition_id: &str,
) -> NetResult<Vec<NetArc>> {
    query_arcs(
        conn,
        "SELECT id, source, target, weight, direction FROM arcs
         WHERE network = ?1 AND source = ?2 AND direction = 'transition-to-place'
         ORDER BY rowid",
        network,
        transition_id,
    )
}

/// (places, transitions, arcs) stored under `network`.
pub(crate) fn count_elements(conn: &Connection, network: &str) -> NetResult<(usize, usize, usize)> {
    let count = |table: &str| -> NetResult<usize> {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE network = ?1", table),
            params![network],
            |r| r.get(0),
        )?;
        Ok(n.max(0) as usize)
    };
    Ok((count("places")?, count("transitions")?, count("arcs")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::new_identity;

    fn place(network: &str, name: &str, tokens: u32) -> Place {
        Place {
            id: new_identity(),
            network: network.into(),
            name: name.into(),
            kind: PlaceKind::Worker,
            tokens,
            capacity: Some(10),
            resource_id: None,
            usage: Some("welding".into()),
        }
    }

    #[test]
    fn failed_write_rolls_back() {
        let store = NetStore::open_in_memory().unwrap();
        let p = place("net", "workers:available", 3);

        let res: NetResult<()> = store.write(|conn| {
            insert_place(conn, &p)?;
            Err(NetError::validation("abort"))
        });
        assert!(res.is_err());

        let places = store.read(|conn| load_places(conn, "net")).unwrap();
        assert!(places.is_empty());
    }

    #[test]
    fn place_round_trips_detail_columns() {
        let store = NetStore::open_in_memory().unwrap();
        let p = place("net", "workers:available", 3);
        store.write(|conn| insert_place(conn, &p)).unwrap();

        let loaded = store.read(|conn| load_places(conn, "net")).unwrap();
        assert_eq!(loaded, vec![p]);
    }

    #[test]
    fn negative_tokens_are_rejected_by_schema() {
        let store = NetStore::open_in_memory().unwrap();
        let p = place("net", "workers:available", 0);
        store.write(|conn| insert_place(conn, &p)).unwrap();

        let res = store.write(|conn| {
            conn.execute("UPDATE places SET tokens = -1 WHERE id = ?1", params![p.id])?;
            Ok(())
        });
        assert!(matches!(res, Err(NetError::Persistence(_))));
    }

    #[test]
    fn delete_network_is_scoped_by_name() {
        let store = NetStore::open_in_memory().unwrap();
        store
            .write(|conn| {
                insert_place(conn, &place("a", "workers:busy", 1))?;
                insert_place(conn, &place("b", "workers:busy", 1))
            })
            .unwrap();

        let removed = store.write(|conn| delete_network(conn, "a")).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.read(|conn| count_elements(conn, "b")).unwrap(), (1, 0, 0));
    }
}
