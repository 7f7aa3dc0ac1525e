// src/census.rs
//
// =============================================================================
// WORKSHOPNET: RESOURCE CENSUS PORT (v 0.3 )
// =============================================================================
//
// The Hexagonal Port toward the resource subsystems.
//
// The engine never owns workers, machines or workshops. It only asks the
// collaborators how many of each sit in each status, and the reconciler
// writes those numbers into the marking.

use crate::error::{NetError, NetResult};
use crate::topology::{
    MACHINES_ACTIVE, MACHINES_BROKEN, MACHINES_IN_MAINTENANCE, WORKERS_ABSENT, WORKERS_AVAILABLE,
    WORKERS_BUSY, WORKSHOPS_ACTIVE, WORKSHOPS_CLOSED, WORKSHOPS_IN_MAINTENANCE,
};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

// ============================================================================
// 1. COUNTS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerCounts {
    pub available: u32,
    pub busy: u32,
    pub absent: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineCounts {
    pub active: u32,
    pub broken: u32,
    pub in_maintenance: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkshopCounts {
    pub active: u32,
    pub closed: u32,
    pub in_maintenance: u32,
}

/// The categorized counts a synchronization used.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceCounts {
    pub workers: WorkerCounts,
    pub machines: MachineCounts,
    pub workshops: WorkshopCounts,
}

impl ResourceCounts {
    /// Token count for a place name, or None when the place has no
    /// external counterpart (tasks, generic resources).
    pub fn tokens_for(&self, place_name: &str) -> Option<u32> {
        let n = match place_name {
            WORKERS_AVAILABLE => self.workers.available,
            WORKERS_BUSY => self.workers.busy,
            WORKERS_ABSENT => self.workers.absent,
            MACHINES_ACTIVE => self.machines.active,
            MACHINES_BROKEN => self.machines.broken,
            MACHINES_IN_MAINTENANCE => self.machines.in_maintenance,
            WORKSHOPS_ACTIVE => self.workshops.active,
            WORKSHOPS_CLOSED => self.workshops.closed,
            WORKSHOPS_IN_MAINTENANCE => self.workshops.in_maintenance,
            _ => return None,
        };
        Some(n)
    }
}

// ============================================================================
// 2. THE PORT
// ============================================================================

#[async_trait]
pub trait ResourceCensus: Send + Sync {
    async fn workers(&self) -> Result<WorkerCounts>;
    async fn machines(&self) -> Result<MachineCounts>;
    async fn workshops(&self) -> Result<WorkshopCounts>;
}

/// Asks all three collaborators at once.
pub async fn collect(census: &dyn ResourceCensus) -> NetResult<ResourceCounts> {
    let (workers, machines, workshops) =
        tokio::try_join!(census.workers(), census.machines(), census.workshops())
            .map_err(NetError::Census)?;
    Ok(ResourceCounts {
        workers,
        machines,
        workshops,
    })
}

// ============================================================================
// 3. FIXED COUNTS
// ============================================================================

/// A census answering from counts held in memory.
/// Used by tests and for running the engine detached from a registry.
#[derive(Default)]
pub struct StaticCensus {
    counts: Mutex<ResourceCounts>,
}

impl StaticCensus {
    pub fn new(counts: ResourceCounts) -> Self {
        Self {
            counts: Mutex::new(counts),
        }
    }

    pub fn set(&self, counts: ResourceCounts) {
        match self.counts.lock() {
            Ok(mut guard) => *guard = counts,
            Err(poisoned) => *poisoned.into_inner() = counts,
        }
    }

    fn snapshot(&self) -> ResourceCounts {
        match self.counts.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ResourceCensus for StaticCensus {
    async fn workers(&self) -> Result<WorkerCounts> {
        Ok(self.snapshot().workers)
    }

    async fn machines(&self) -> Result<MachineCounts> {
        Ok(self.snapshot().machines)
    }

    async fn workshops(&self) -> Result<WorkshopCounts> {
        Ok(self.snapshot().workshops)
    }
}
