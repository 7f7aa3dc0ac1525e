// src/lib.rs
//
// =============================================================================
// WORKSHOPNET: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports public types.

// 1. Declare Modules
pub mod builder;
pub mod census;
pub mod config;
pub mod core;
pub mod enablement;
pub mod error;
pub mod firing;
pub mod history;
pub mod query;
pub mod reconcile;
pub mod resources;
pub mod service;
pub mod store;
pub mod topology;

// 2. Re-exports (The Public API)

pub use census::{ResourceCensus, ResourceCounts, StaticCensus};
pub use config::EngineConfig;
pub use core::{FireOutcome, Marking, NetworkState, Place, Transition};
pub use error::{NetError, NetResult};
pub use history::BoundedHistory;
pub use query::{CurrentState, NetworkInfo, SystemSummary};
pub use resources::{ResourceKind, ResourceRegistry};
pub use service::WorkshopNet;
pub use store::NetStore;
pub use topology::Topology;
