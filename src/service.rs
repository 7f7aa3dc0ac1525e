// src/service.rs
//
// =============================================================================
// WORKSHOPNET: ENGINE SERVICE (v 0.3 )
// =============================================================================
//
// The operation set exposed to callers (CLI, HTTP layer, tests).
//
// Responsibilities:
// 1. Keyed registry: every operation names its network; independent
//    networks coexist in one store.
// 2. Exclusive access: mutating operations on one network are serialized
//    by a per-name async lock, and each commits as one IMMEDIATE
//    transaction (read-check-mutate-persist).
// 3. Reads run against a consistent snapshot and never take the lock.

use crate::builder;
use crate::census::{self, ResourceCensus, ResourceCounts};
use crate::config::EngineConfig;
use crate::core::{parse_identity, FireOutcome, Marking};
use crate::enablement;
use crate::error::{NetError, NetResult};
use crate::firing;
use crate::query::{
    self, CurrentState, NetworkInfo, PlaceView, SystemSummary, TransitionStatus, TransitionView,
};
use crate::reconcile;
use crate::store::{self, NetStore};
use crate::topology::Topology;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

// ============================================================================
// 1. PER-NETWORK LOCKS
// ============================================================================

#[derive(Default)]
struct NetworkLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl NetworkLocks {
    async fn acquire(&self, network: &str) -> NetResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = self.inner.lock().map_err(|_| NetError::StoreUnavailable)?;
            map.entry(network.to_string()).or_default().clone()
        };
        Ok(lock.lock_owned().await)
    }

    /// Forgets the lock of `network` when nobody else holds or awaits it.
    fn release(&self, network: &str) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        if map
            .get(network)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(network);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }
}

// ============================================================================
// 2. THE SERVICE
// ============================================================================

#[derive(Clone)]
pub struct WorkshopNet {
    store: Arc<NetStore>,
    census: Arc<dyn ResourceCensus>,
    topology: Arc<Topology>,
    config: Arc<EngineConfig>,
    locks: Arc<NetworkLocks>,
}

impl WorkshopNet {
    pub fn new(store: NetStore, census: Arc<dyn ResourceCensus>, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            census,
            topology: Arc::new(Topology::workshop()),
            config: Arc::new(config),
            locks: Arc::new(NetworkLocks::default()),
        }
    }

    /// Opens (or creates) the store at `config.db_path`.
    pub fn open(config: EngineConfig, census: Arc<dyn ResourceCensus>) -> NetResult<Self> {
        config.validate()?;
        let store = NetStore::open(&config.db_path)?;
        Ok(Self::new(store, census, config))
    }

    /// Replaces the catalog used by future initializations.
    pub fn with_topology(mut self, topology: Topology) -> NetResult<Self> {
        topology.validate()?;
        self.topology = Arc::new(topology);
        Ok(self)
    }

    /// The configured network name.
    pub fn default_network(&self) -> &str {
        &self.config.network_name
    }

    fn cap(&self) -> usize {
        self.config.history_capacity
    }

    // -------------------------------------------------------------------------
    // LIFECYCLE
    // -------------------------------------------------------------------------

    /// Rebuilds `network` from scratch and seeds it from the resource counts.
    /// Any previous network of that name is discarded. Returns the state id.
    pub async fn initialize_network(&self, network: &str) -> NetResult<String> {
        let _guard = self.locks.acquire(network).await?;

        // Counts first: a collaborator failure must not cost us the old network.
        let counts = census::collect(self.census.as_ref()).await?;
        let cap = self.cap();
        let topology = Arc::clone(&self.topology);

        let state_id = self.store.write(|conn| {
            let state = builder::build(conn, network, &topology, cap)?;
            reconcile::apply_counts(conn, network, &counts, cap)?;
            Ok(state.id)
        })?;

        let sourceless = topology.sourceless_transitions()?;
        if !sourceless.is_empty() {
            log::warn!(
                "network '{}': transitions without input arcs are always enabled: {}",
                network,
                sourceless.join(", ")
            );
        }
        Ok(state_id)
    }

    /// Deletes everything stored under `network`. Idempotent.
    pub async fn reset_network(&self, network: &str) -> NetResult<()> {
        let guard = self.locks.acquire(network).await?;
        let outcome = self.store.write(|conn| builder::reset(conn, network));
        drop(guard);
        self.locks.release(network);
        outcome.map(|_| ())
    }

    // -------------------------------------------------------------------------
    // STATE CHANGES
    // -------------------------------------------------------------------------

    /// Fires one transition. `NotEnabled` means the guard failed; nothing
    /// was written in that case.
    pub async fn fire_transition(&self, network: &str, transition_id: &str) -> NetResult<Marking> {
        let _guard = self.locks.acquire(network).await?;
        let cap = self.cap();
        self.store
            .write(|conn| firing::fire(conn, network, transition_id, cap))
    }

    /// Same as `fire_transition`, folded into the transport-facing shape.
    pub async fn fire(&self, network: &str, transition_id: &str) -> FireOutcome {
        self.fire_transition(network, transition_id).await.into()
    }

    /// Overwrites mapped places from the resource records. No history entry.
    pub async fn synchronize(&self, network: &str) -> NetResult<ResourceCounts> {
        let _guard = self.locks.acquire(network).await?;
        let counts = census::collect(self.census.as_ref()).await?;
        let cap = self.cap();
        self.store
            .write(|conn| reconcile::apply_counts(conn, network, &counts, cap))?;
        Ok(counts)
    }

    /// Flips the administrative kill-switch. Marking and history untouched.
    pub async fn set_transition_enabled(
        &self,
        network: &str,
        transition_id: &str,
        enabled: bool,
    ) -> NetResult<()> {
        let id = parse_identity(transition_id)?;
        let _guard = self.locks.acquire(network).await?;
        let cap = self.cap();
        self.store.write(|conn| {
            store::load_state(conn, network, cap)?.ok_or_else(|| NetError::not_found(network))?;
            if !store::set_transition_enabled(conn, network, &id, enabled)? {
                return Err(NetError::validation(format!("unknown transition id '{}'", id)));
            }
            Ok(())
        })?;
        log::info!(
            "transition {} on '{}' administratively {}",
            id,
            network,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // READS
    // -------------------------------------------------------------------------

    /// Fails closed: malformed or unknown ids and missing networks give false.
    pub async fn is_transition_enabled(&self, network: &str, transition_id: &str) -> NetResult<bool> {
        let cap = self.cap();
        let eval = self
            .store
            .read(|conn| enablement::evaluate(conn, network, transition_id, cap))?;
        Ok(eval.verdict.is_enabled())
    }

    pub async fn current_state(&self, network: &str) -> NetResult<CurrentState> {
        let (cap, recent) = (self.cap(), self.config.recent_history);
        self.store
            .read(|conn| query::current_state(conn, network, cap, recent))
    }

    pub async fn network_info(&self, network: &str) -> NetResult<NetworkInfo> {
        let cap = self.cap();
        self.store.read(|conn| query::network_info(conn, network, cap))
    }

    pub async fn places(&self, network: &str) -> NetResult<Vec<PlaceView>> {
        let cap = self.cap();
        self.store.read(|conn| query::places(conn, network, cap))
    }

    pub async fn transitions(&self, network: &str) -> NetResult<Vec<TransitionStatus>> {
        let cap = self.cap();
        self.store.read(|conn| query::transitions(conn, network, cap))
    }

    pub async fn find_transition(&self, network: &str, name: &str) -> NetResult<TransitionView> {
        let cap = self.cap();
        self.store
            .read(|conn| query::find_transition(conn, network, cap, name))
    }

    /// Marking totals next to the live resource counts. Does not synchronize.
    pub async fn system_summary(&self, network: &str) -> NetResult<SystemSummary> {
        let counts = census::collect(self.census.as_ref()).await?;
        let cap = self.cap();
        self.store
            .read(|conn| query::summary(conn, network, cap, counts))
    }

    /// Full firing history, oldest first.
    pub async fn history(&self, network: &str) -> NetResult<Vec<crate::core::HistoryEntry>> {
        let cap = self.cap();
        let state = self
            .store
            .read(|conn| store::load_state(conn, network, cap))?
            .ok_or_else(|| NetError::not_found(network))?;
        Ok(state.history.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::StaticCensus;

    fn engine() -> WorkshopNet {
        WorkshopNet::new(
            NetStore::open_in_memory().unwrap(),
            Arc::new(StaticCensus::default()),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn reset_forgets_the_network_lock() {
        let engine = engine();
        for name in ["north", "south", "east"] {
            engine.initialize_network(name).await.unwrap();
        }
        assert_eq!(engine.locks.tracked(), 3);

        engine.reset_network("north").await.unwrap();
        engine.reset_network("never-built").await.unwrap();
        assert_eq!(engine.locks.tracked(), 2);

        // A held lock is not dropped from under its owner.
        let held = engine.locks.acquire("south").await.unwrap();
        engine.locks.release("south");
        assert_eq!(engine.locks.tracked(), 2);
        drop(held);
        engine.locks.release("south");
        assert_eq!(engine.locks.tracked(), 1);
    }
}
