mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use cast_keeper_rs::{
    KeeperError, MemoryStore, NetworkClass, NetworkStatus, PreferenceStore, SessionKeeper,
    Settings, TaskId, Trigger,
};
use common::{keeper, keeper_with, wait_until, FakeFacade, TestNetwork};

const PROBE_TRIGGER: Trigger = Trigger::NetworkAvailable(NetworkClass::Unmetered);

#[tokio::test(start_paused = true)]
async fn test_start_records_reachability_and_arms_probe() {
    let facade = FakeFacade::new(true);
    let network = TestNetwork::new(NetworkStatus::wifi("home"));
    let keeper = keeper(facade.clone(), network, Arc::new(MemoryStore::new()));

    keeper.start_reconnect_probe().await;

    assert_eq!(keeper.persisted().wifi_status(), Some(true));
    assert_eq!(keeper.scheduler().pending(TaskId::Reconnect), Some(PROBE_TRIGGER));
    assert!(facade.reconnect_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_network_return_triggers_reconnection() {
    let facade = FakeFacade::new(false);
    let network = TestNetwork::new(NetworkStatus::unreachable());
    let keeper = keeper(facade.clone(), network.clone(), Arc::new(MemoryStore::new()));

    keeper.start_reconnect_probe().await;
    assert_eq!(keeper.persisted().wifi_status(), Some(false));

    sleep(Duration::from_secs(1)).await;
    assert!(facade.reconnect_calls().is_empty());

    network.set(NetworkStatus::wifi("home"));
    assert!(wait_until(|| facade.reconnect_calls().len() == 1).await);
    assert_eq!(
        facade.reconnect_calls()[0],
        (Duration::from_secs(15), Some("home".to_string()))
    );
    assert_eq!(keeper.persisted().wifi_status(), Some(true));

    // Always re-armed for the next network change
    assert!(wait_until(|| !keeper.scheduler().is_running(TaskId::Reconnect)).await);
    assert_eq!(keeper.scheduler().pending(TaskId::Reconnect), Some(PROBE_TRIGGER));
}

#[tokio::test(start_paused = true)]
async fn test_no_reconnection_while_connected_or_connecting() {
    let facade = FakeFacade::new(true);
    let network = TestNetwork::new(NetworkStatus::wifi("home"));
    let keeper = keeper(facade.clone(), network.clone(), Arc::new(MemoryStore::new()));

    keeper.on_job_triggered(1).unwrap();
    assert!(wait_until(|| keeper.persisted().wifi_status() == Some(true)).await);
    assert!(wait_until(|| keeper.scheduler().pending(TaskId::Reconnect) == Some(PROBE_TRIGGER)).await);

    facade.set_connected(false);
    facade.set_connecting(true);
    keeper.on_job_triggered(1).unwrap();
    assert!(wait_until(|| network.probe_count() == 2).await);
    assert!(wait_until(|| keeper.scheduler().pending(TaskId::Reconnect) == Some(PROBE_TRIGGER)).await);

    assert!(facade.reconnect_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_metered_network_is_recorded_but_not_used() {
    let facade = FakeFacade::new(false);
    let network = TestNetwork::new(NetworkStatus {
        reachable: true,
        network_key: Some("phone-hotspot".to_string()),
        metered: true,
    });
    let keeper = keeper(facade.clone(), network, Arc::new(MemoryStore::new()));

    keeper.on_job_triggered(1).unwrap();
    // A named network is joined even though it is the wrong class
    assert!(wait_until(|| keeper.persisted().wifi_status() == Some(true)).await);
    assert!(wait_until(|| keeper.scheduler().pending(TaskId::Reconnect) == Some(PROBE_TRIGGER)).await);
    assert!(facade.reconnect_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_any_network_class_accepts_metered() {
    let facade = FakeFacade::new(false);
    let network = TestNetwork::new(NetworkStatus {
        reachable: true,
        network_key: None,
        metered: true,
    });
    let settings = Settings {
        required_network: NetworkClass::Any,
        ..Settings::default()
    };
    let keeper = keeper_with(
        facade.clone(),
        network,
        Arc::new(MemoryStore::new()),
        settings,
    );

    keeper.on_job_triggered(1).unwrap();
    assert!(wait_until(|| facade.reconnect_calls().len() == 1).await);
    assert_eq!(facade.reconnect_calls()[0], (Duration::from_secs(15), None));
    // Reachable but unnamed
    assert_eq!(keeper.persisted().wifi_status(), Some(false));
    assert!(wait_until(|| {
        keeper.scheduler().pending(TaskId::Reconnect)
            == Some(Trigger::NetworkAvailable(NetworkClass::Any))
    })
    .await);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_probe_leaves_no_trace() {
    let facade = FakeFacade::new(false);
    let network = TestNetwork::new(NetworkStatus::wifi("home"));
    let store = Arc::new(MemoryStore::new());
    let keeper = keeper(facade.clone(), network.clone(), store.clone());

    let gate = network.hold_probes();
    keeper.on_job_triggered(1).unwrap();
    assert!(wait_until(|| keeper.scheduler().is_running(TaskId::Reconnect)).await);

    keeper.stop();
    gate.notify_one();

    assert!(wait_until(|| !keeper.scheduler().is_running(TaskId::Reconnect)).await);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(store.load("wifiStatus"), None);
    assert!(facade.reconnect_calls().is_empty());
    assert_eq!(keeper.scheduler().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_job_id_is_rejected() {
    let keeper = keeper(
        FakeFacade::new(true),
        TestNetwork::new(NetworkStatus::unreachable()),
        Arc::new(MemoryStore::new()),
    );

    let result = keeper.on_job_triggered(42);

    assert!(matches!(result, Err(KeeperError::NotConfigured(_))));
    assert_eq!(keeper.scheduler().pending_count(), 0);
}

#[tokio::test]
async fn test_builder_requires_facade_and_network() {
    let missing_facade = SessionKeeper::builder()
        .network(TestNetwork::new(NetworkStatus::unreachable()))
        .build();
    assert!(matches!(missing_facade, Err(KeeperError::NotConfigured(_))));

    let missing_network = SessionKeeper::builder()
        .facade(FakeFacade::new(true))
        .build();
    assert!(matches!(missing_network, Err(KeeperError::NotConfigured(_))));
}
