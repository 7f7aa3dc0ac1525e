// src/resources.rs
//
// =============================================================================
// WORKSHOPNET: RESOURCE REGISTRY (v 0.3 )
// =============================================================================
//
// The Inventory.
//
// A small SQLite-backed record of workers, machines, workshops and tasks,
// each carrying one status string. It is the default `ResourceCensus`
// adapter: synchronization asks it how many records sit in each status.
//
// Responsibilities:
// 1. Enforce the status vocabulary per resource kind.
// 2. Add / re-status / remove records.
// 3. Report per-status counts (zero-filled).

use crate::census::{MachineCounts, ResourceCensus, WorkerCounts, WorkshopCounts};
use crate::core::{new_identity, parse_identity};
use crate::error::{NetError, NetResult};
use crate::store;
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

// ============================================================================
// 1. KINDS & VOCABULARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Worker,
    Machine,
    Workshop,
    Task,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [Self::Worker, Self::Machine, Self::Workshop, Self::Task];

    fn table(self) -> &'static str {
        match self {
            Self::Worker => "workers",
            Self::Machine => "machines",
            Self::Workshop => "workshops",
            Self::Task => "tasks",
        }
    }

    /// Allowed status strings, in reporting order.
    pub fn statuses(self) -> &'static [&'static str] {
        match self {
            Self::Worker => &["available", "busy", "absent"],
            Self::Machine => &["active", "broken", "in-maintenance"],
            Self::Workshop => &["active", "closed", "in-maintenance"],
            Self::Task => &["pending", "in-progress", "done", "cancelled"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Machine => "machine",
            Self::Workshop => "workshop",
            Self::Task => "task",
        }
    }

    pub fn parse(raw: &str) -> NetResult<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == raw || k.table() == raw)
            .ok_or_else(|| NetError::validation(format!("unknown resource kind '{}'", raw)))
    }

    fn check_status(self, status: &str) -> NetResult<()> {
        if self.statuses().contains(&status) {
            Ok(())
        } else {
            Err(NetError::validation(format!(
                "'{}' is not a {} status (expected one of: {})",
                status,
                self,
                self.statuses().join(", ")
            )))
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceRecord {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub status: String,
}

// ============================================================================
// 2. THE REGISTRY
// ============================================================================

pub struct ResourceRegistry {
    conn: Mutex<Connection>,
}

impl ResourceRegistry {
    pub fn open(path: impl AsRef<Path>) -> NetResult<Self> {
        Self::with_connection(Connection::open(path.as_ref())?)
    }

    pub fn open_in_memory() -> NetResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> NetResult<Self> {
        store::configure(&conn)?;
        for kind in ResourceKind::ALL {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    status TEXT NOT NULL
                );",
                kind.table()
            ))?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> NetResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| NetError::StoreUnavailable)
    }

    /// Registers a record and returns its generated id.
    pub fn add(&self, kind: ResourceKind, name: &str, status: &str) -> NetResult<String> {
        if name.trim().is_empty() {
            return Err(NetError::validation(format!("{} name must not be empty", kind)));
        }
        kind.check_status(status)?;

        let id = new_identity();
        self.lock()?.execute(
            &format!("INSERT INTO {} (id, name, status) VALUES (?1, ?2, ?3)", kind.table()),
            params![id, name, status],
        )?;
        log::debug!("registered {} '{}' ({}) as {}", kind, name, status, id);
        Ok(id)
    }

    pub fn set_status(&self, kind: ResourceKind, id: &str, status: &str) -> NetResult<()> {
        let id = parse_identity(id)?;
        kind.check_status(status)?;
        let updated = self.lock()?.execute(
            &format!("UPDATE {} SET status = ?2 WHERE id = ?1", kind.table()),
            params![id, status],
        )?;
        if updated == 0 {
            return Err(NetError::validation(format!("unknown {} id '{}'", kind, id)));
        }
        Ok(())
    }

    pub fn remove(&self, kind: ResourceKind, id: &str) -> NetResult<()> {
        let id = parse_identity(id)?;
        let removed = self.lock()?.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;
        if removed == 0 {
            return Err(NetError::validation(format!("unknown {} id '{}'", kind, id)));
        }
        Ok(())
    }

    pub fn get(&self, kind: ResourceKind, id: &str) -> NetResult<Option<ResourceRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT id, name, status FROM {} WHERE id = ?1", kind.table()),
                params![id],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?)),
            )
            .optional()?;
        Ok(row.map(|(id, name, status)| ResourceRecord {
            id,
            kind,
            name,
            status,
        }))
    }

    pub fn list(&self, kind: ResourceKind) -> NetResult<Vec<ResourceRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, status FROM {} ORDER BY name, id",
            kind.table()
        ))?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, name, status) = row?;
            out.push(ResourceRecord {
                id,
                kind,
                name,
                status,
            });
        }
        Ok(out)
    }

    /// Records per status. Every allowed status is present, zero if unused.
    pub fn count_by_status(&self, kind: ResourceKind) -> NetResult<BTreeMap<String, u32>> {
        let mut counts: BTreeMap<String, u32> = kind
            .statuses()
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT status, COUNT(*) FROM {} GROUP BY status",
            kind.table()
        ))?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, n) = row?;
            let n = u32::try_from(n)
                .map_err(|_| NetError::Corrupt(format!("{} count {} out of range", kind, n)))?;
            match counts.get_mut(&status) {
                Some(slot) => *slot = n,
                None => log::warn!("{} table holds unknown status '{}' ({} row(s))", kind, status, n),
            }
        }
        Ok(counts)
    }
}

// ============================================================================
// 3. CENSUS ADAPTER
// ============================================================================

fn tally(counts: &BTreeMap<String, u32>, status: &str) -> u32 {
    counts.get(status).copied().unwrap_or(0)
}

#[async_trait]
impl ResourceCensus for ResourceRegistry {
    async fn workers(&self) -> Result<WorkerCounts> {
        let c = self.count_by_status(ResourceKind::Worker)?;
        Ok(WorkerCounts {
            available: tally(&c, "available"),
            busy: tally(&c, "busy"),
            absent: tally(&c, "absent"),
        })
    }

    async fn machines(&self) -> Result<MachineCounts> {
        let c = self.count_by_status(ResourceKind::Machine)?;
        Ok(MachineCounts {
            active: tally(&c, "active"),
            broken: tally(&c, "broken"),
            in_maintenance: tally(&c, "in-maintenance"),
        })
    }

    async fn workshops(&self) -> Result<WorkshopCounts> {
        let c = self.count_by_status(ResourceKind::Workshop)?;
        Ok(WorkshopCounts {
            active: tally(&c, "active"),
            closed: tally(&c, "closed"),
            in_maintenance: tally(&c, "in-maintenance"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census;

    #[test]
    fn status_vocabulary_is_enforced() {
        let reg = ResourceRegistry::open_in_memory().unwrap();
        assert!(reg.add(ResourceKind::Worker, "ana", "available").is_ok());
        assert!(matches!(
            reg.add(ResourceKind::Worker, "bo", "broken"),
            Err(NetError::Validation(_))
        ));
        assert!(matches!(
            reg.add(ResourceKind::Machine, "  ", "active"),
            Err(NetError::Validation(_))
        ));
    }

    #[test]
    fn counts_are_zero_filled() {
        let reg = ResourceRegistry::open_in_memory().unwrap();
        reg.add(ResourceKind::Task, "cut", "pending").unwrap();
        let counts = reg.count_by_status(ResourceKind::Task).unwrap();
        assert_eq!(counts.len(), 4);
        assert_eq!(counts["pending"], 1);
        assert_eq!(counts["done"], 0);
    }

    #[test]
    fn set_status_and_remove_need_a_known_id() {
        let reg = ResourceRegistry::open_in_memory().unwrap();
        let id = reg.add(ResourceKind::Machine, "lathe", "active").unwrap();

        reg.set_status(ResourceKind::Machine, &id, "broken").unwrap();
        assert_eq!(
            reg.get(ResourceKind::Machine, &id).unwrap().unwrap().status,
            "broken"
        );

        let stranger = new_identity();
        assert!(matches!(
            reg.set_status(ResourceKind::Machine, &stranger, "active"),
            Err(NetError::Validation(_))
        ));
        assert!(matches!(
            reg.remove(ResourceKind::Machine, "not-a-uuid"),
            Err(NetError::Validation(_))
        ));

        reg.remove(ResourceKind::Machine, &id).unwrap();
        assert!(reg.list(ResourceKind::Machine).unwrap().is_empty());
    }

    #[test]
    fn kind_parses_singular_and_plural() {
        assert_eq!(ResourceKind::parse("worker").unwrap(), ResourceKind::Worker);
        assert_eq!(ResourceKind::parse("workshops").unwrap(), ResourceKind::Workshop);
        assert!(ResourceKind::parse("robot").is_err());
    }

    #[tokio::test]
    async fn registry_reports_as_census() {
        let reg = ResourceRegistry::open_in_memory().unwrap();
        for name in ["a", "b", "c"] {
            reg.add(ResourceKind::Worker, name, "available").unwrap();
        }
        reg.add(ResourceKind::Worker, "d", "absent").unwrap();
        reg.add(ResourceKind::Machine, "press", "in-maintenance").unwrap();
        reg.add(ResourceKind::Workshop, "north", "active").unwrap();

        let counts = census::collect(&reg).await.unwrap();
        assert_eq!(counts.workers.available, 3);
        assert_eq!(counts.workers.absent, 1);
        assert_eq!(counts.workers.busy, 0);
        assert_eq!(counts.machines.in_maintenance, 1);
        assert_eq!(counts.workshops.active, 1);
    }
}
