use std::sync::Arc;
use workshopnet::census::WorkerCounts;
use workshopnet::topology::{ASSIGN_WORKER, RELEASE_WORKER, WORKERS_AVAILABLE, WORKERS_BUSY};
use workshopnet::{EngineConfig, NetError, NetStore, ResourceCounts, StaticCensus, WorkshopNet};

const NET: &str = "workshop-main";

fn engine(available: u32) -> WorkshopNet {
    let census = Arc::new(StaticCensus::new(ResourceCounts {
        workers: WorkerCounts {
            available,
            busy: 0,
            absent: 0,
        },
        ..Default::default()
    }));
    WorkshopNet::new(
        NetStore::open_in_memory().expect("store"),
        census,
        EngineConfig::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fires_never_overdraw() {
    let engine = engine(5);
    engine.initialize_network(NET).await.unwrap();
    let assign = engine.find_transition(NET, ASSIGN_WORKER).await.unwrap().id;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        let assign = assign.clone();
        handles.push(tokio::spawn(async move {
            engine.fire_transition(NET, &assign).await
        }));
    }

    let (mut fired, mut refused) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => fired += 1,
            Err(NetError::NotEnabled { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(fired, 5);
    assert_eq!(refused, 15);

    let state = engine.current_state(NET).await.unwrap();
    assert_eq!(state.marking[WORKERS_AVAILABLE], 0);
    assert_eq!(state.marking[WORKERS_BUSY], 5);
    assert_eq!(engine.history(NET).await.unwrap().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_assign_and_release_conserve_workers() {
    let engine = engine(3);
    engine.initialize_network(NET).await.unwrap();
    let assign = engine.find_transition(NET, ASSIGN_WORKER).await.unwrap().id;
    let release = engine.find_transition(NET, RELEASE_WORKER).await.unwrap().id;

    let mut handles = Vec::new();
    for i in 0..30 {
        let engine = engine.clone();
        let id = if i % 2 == 0 { assign.clone() } else { release.clone() };
        handles.push(tokio::spawn(async move {
            let _ = engine.fire_transition(NET, &id).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let state = engine.current_state(NET).await.unwrap();
    assert_eq!(
        state.marking[WORKERS_AVAILABLE] + state.marking[WORKERS_BUSY],
        3
    );
    // Every successful fire bumped the version exactly once.
    let fires = engine.history(NET).await.unwrap().len() as i64;
    assert_eq!(state.version, 2 + fires);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sync_and_fire_race_leaves_a_consistent_marking() {
    let engine = engine(4);
    engine.initialize_network(NET).await.unwrap();
    let assign = engine.find_transition(NET, ASSIGN_WORKER).await.unwrap().id;

    let firer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for _ in 0..4 {
                let _ = engine.fire_transition(NET, &assign).await;
            }
        })
    };
    let syncer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for _ in 0..4 {
                engine.synchronize(NET).await.unwrap();
            }
        })
    };
    firer.await.unwrap();
    syncer.await.unwrap();

    let state = engine.current_state(NET).await.unwrap();
    let total = state.marking[WORKERS_AVAILABLE] + state.marking[WORKERS_BUSY];
    assert_eq!(total, 4);
}
