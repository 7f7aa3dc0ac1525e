use std::sync::Arc;
use workshopnet::topology::{
    ASSIGN_WORKER, MACHINES_ACTIVE, MACHINES_BROKEN, WORKERS_AVAILABLE, WORKERS_BUSY,
    WORKSHOPS_ACTIVE,
};
use workshopnet::{EngineConfig, NetError, NetStore, ResourceKind, ResourceRegistry, WorkshopNet};

const NET: &str = "workshop-main";

fn setup() -> (WorkshopNet, Arc<ResourceRegistry>) {
    let registry = Arc::new(ResourceRegistry::open_in_memory().expect("registry"));
    let engine = WorkshopNet::new(
        NetStore::open_in_memory().expect("store"),
        registry.clone(),
        EngineConfig::default(),
    );
    (engine, registry)
}

#[tokio::test]
async fn registry_counts_become_tokens() {
    let (engine, registry) = setup();
    let mut workers = Vec::new();
    for name in ["ana", "bo", "cy"] {
        workers.push(registry.add(ResourceKind::Worker, name, "available").unwrap());
    }
    let lathe = registry.add(ResourceKind::Machine, "lathe", "active").unwrap();
    registry.add(ResourceKind::Machine, "press", "active").unwrap();
    registry.add(ResourceKind::Workshop, "north", "active").unwrap();

    engine.initialize_network(NET).await.unwrap();
    let state = engine.current_state(NET).await.unwrap();
    assert_eq!(state.marking[WORKERS_AVAILABLE], 3);
    assert_eq!(state.marking[MACHINES_ACTIVE], 2);
    assert_eq!(state.marking[WORKSHOPS_ACTIVE], 1);

    registry
        .set_status(ResourceKind::Worker, &workers[0], "busy")
        .unwrap();
    registry
        .set_status(ResourceKind::Machine, &lathe, "broken")
        .unwrap();
    registry.remove(ResourceKind::Worker, &workers[2]).unwrap();

    let counts = engine.synchronize(NET).await.unwrap();
    assert_eq!(counts.workers.available, 1);
    assert_eq!(counts.workers.busy, 1);

    let state = engine.current_state(NET).await.unwrap();
    assert_eq!(state.marking[WORKERS_AVAILABLE], 1);
    assert_eq!(state.marking[WORKERS_BUSY], 1);
    assert_eq!(state.marking[MACHINES_ACTIVE], 1);
    assert_eq!(state.marking[MACHINES_BROKEN], 1);
    assert!(state.recent_history.is_empty());
}

#[tokio::test]
async fn firing_does_not_touch_the_registry() {
    let (engine, registry) = setup();
    registry.add(ResourceKind::Worker, "ana", "available").unwrap();
    engine.initialize_network(NET).await.unwrap();

    let assign = engine.find_transition(NET, ASSIGN_WORKER).await.unwrap().id;
    engine.fire_transition(NET, &assign).await.unwrap();

    let counts = registry.count_by_status(ResourceKind::Worker).unwrap();
    assert_eq!(counts["available"], 1);
    assert_eq!(counts["busy"], 0);
    assert!(!engine.system_summary(NET).await.unwrap().synchronized);
}

#[tokio::test]
async fn find_transition_by_unknown_name_is_a_validation_error() {
    let (engine, _) = setup();
    engine.initialize_network(NET).await.unwrap();
    assert!(matches!(
        engine.find_transition(NET, "teleport-worker").await,
        Err(NetError::Validation(_))
    ));
    assert_eq!(engine.places(NET).await.unwrap().len(), 12);
    assert_eq!(engine.transitions(NET).await.unwrap().len(), 9);
}
