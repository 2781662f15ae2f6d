//! Provisioning, readiness and teardown against an in-memory host.

use delegatio::{DelegatioError, Infrastructure, NodeId};
use delegatio_test_utils::{AgentBehavior, CallLog, FakeDialer, FakeHost, test_options};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn infrastructure(home: &TempDir) -> (CallLog, Arc<FakeHost>, Arc<Infrastructure>) {
    let log = CallLog::new();
    let host = Arc::new(FakeHost::new(log.clone()));
    let infra = Infrastructure::new(host.clone(), test_options(home.path())).unwrap();
    (log, host, Arc::new(infra))
}

async fn provision_and_launch(infra: &Arc<Infrastructure>) {
    let cancel = CancellationToken::new();
    infra.initialize_infrastructure(&cancel).await.unwrap();
    infra.launch_instances(&cancel).await.unwrap();
}

// ============================================================================
// PROVISIONING
// ============================================================================

#[tokio::test]
async fn initialize_creates_pool_base_image_and_network() {
    let home = TempDir::new().unwrap();
    let (log, host, infra) = infrastructure(&home);

    infra
        .initialize_infrastructure(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(host.pools(), vec!["delegatio-pool"]);
    assert_eq!(host.volumes(), vec!["delegatio-base"]);
    assert_eq!(host.networks(), vec!["delegatio"]);

    let resources = infra.resources();
    assert_eq!(resources.pools(), ["delegatio-pool"]);
    assert_eq!(resources.disks(), ["delegatio-base"]);
    assert_eq!(resources.networks(), ["delegatio"]);
    assert!(resources.domains().is_empty());

    let pool = log.first("create_pool").unwrap();
    let base = log.first("create_volume delegatio-base").unwrap();
    let upload = log.first("upload_volume delegatio-base").unwrap();
    let network = log.first("create_network").unwrap();
    assert!(pool < base && base < upload && upload < network);
}

#[tokio::test]
async fn launch_registers_every_node() {
    let home = TempDir::new().unwrap();
    let (_log, host, infra) = infrastructure(&home);

    provision_and_launch(&infra).await;

    assert_eq!(
        host.domains(),
        vec!["delegatio-0", "delegatio-1", "delegatio-2"]
    );
    assert_eq!(infra.domain_names(), host.domains());
    assert_eq!(infra.resources().disks().len(), 4);
    for name in infra.domain_names() {
        assert!(!infra.domain_info(&name).unwrap().guest_agent_ready);
    }
}

#[tokio::test]
async fn failed_boot_volume_skips_its_domain() {
    let home = TempDir::new().unwrap();
    let (log, host, infra) = infrastructure(&home);
    host.fail("create_volume", "delegatio-2");

    let cancel = CancellationToken::new();
    infra.initialize_infrastructure(&cancel).await.unwrap();
    let err = infra.launch_instances(&cancel).await.unwrap_err();

    assert!(matches!(err, DelegatioError::FanOut { .. }));
    assert_eq!(log.count("create_domain delegatio-2"), 0);
    assert!(infra.domain_info("delegatio-2").is_none());
}

#[tokio::test]
async fn missing_base_image_is_config_error() {
    let home = TempDir::new().unwrap();
    let (log, _host, infra) = infrastructure(&home);
    std::fs::remove_file(&infra.options().image_path).unwrap();

    let err = infra
        .initialize_infrastructure(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DelegatioError::Config(_)));
    assert_eq!(log.count("create_volume"), 0);
}

#[tokio::test]
async fn cancel_during_pool_creation_returns_promptly() {
    let home = TempDir::new().unwrap();
    let (log, host, infra) = infrastructure(&home);
    host.delay("create_pool", Duration::from_secs(3));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = infra.initialize_infrastructure(&cancel).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1));
    match err.root_cause() {
        DelegatioError::Cancelled(msg) => assert!(msg.contains("storage pool"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(host.pools().is_empty());
    assert!(infra.resources().pools().is_empty());
    assert_eq!(log.count("create_volume"), 0);
    assert_eq!(log.count("create_network"), 0);
}

#[tokio::test]
async fn cancel_before_provisioning_touches_nothing() {
    let home = TempDir::new().unwrap();
    let (log, _host, infra) = infrastructure(&home);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = infra.initialize_infrastructure(&cancel).await.unwrap_err();

    assert!(matches!(err, DelegatioError::Cancelled(_)));
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn create_instance_builds_volume_then_domain() {
    let home = TempDir::new().unwrap();
    let (log, _host, infra) = infrastructure(&home);
    infra
        .initialize_infrastructure(&CancellationToken::new())
        .await
        .unwrap();

    infra.create_instance(NodeId(1)).await.unwrap();

    let volume = log.first("create_volume delegatio-1").unwrap();
    let domain = log.first("create_domain delegatio-1").unwrap();
    assert!(volume < domain);
    assert_eq!(infra.domain_names(), vec!["delegatio-1"]);
}

// ============================================================================
// READINESS
// ============================================================================

#[tokio::test]
async fn network_gate_waits_for_activation() {
    let home = TempDir::new().unwrap();
    let (log, host, infra) = infrastructure(&home);
    host.activate_network_after(3);
    infra
        .initialize_infrastructure(&CancellationToken::new())
        .await
        .unwrap();

    infra
        .wait_for_network_ready(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(log.count("network_active"), 4);
}

#[tokio::test]
async fn network_gate_times_out() {
    let home = TempDir::new().unwrap();
    let (_log, host, infra) = infrastructure(&home);
    host.never_activate_network();
    infra
        .initialize_infrastructure(&CancellationToken::new())
        .await
        .unwrap();

    let err = infra
        .wait_for_network_ready(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DelegatioError::Timeout(_)));
}

#[tokio::test]
async fn agent_gate_marks_nodes_ready() {
    let home = TempDir::new().unwrap();
    let (log, _host, infra) = infrastructure(&home);
    provision_and_launch(&infra).await;
    let dialer = FakeDialer::with_behavior(
        log.clone(),
        AgentBehavior {
            failing_pings: 2,
            ..AgentBehavior::default()
        },
    );

    infra
        .wait_for_agents_ready(&dialer, &CancellationToken::new())
        .await
        .unwrap();

    assert!(infra.pending_agents().is_empty());
    assert_eq!(log.count("ping delegatio-1"), 3);
}

#[tokio::test]
async fn agent_gate_times_out_naming_pending_nodes() {
    let home = TempDir::new().unwrap();
    let (log, _host, infra) = infrastructure(&home);
    provision_and_launch(&infra).await;
    let dialer = FakeDialer::with_behavior(
        log,
        AgentBehavior {
            failing_pings: usize::MAX,
            ..AgentBehavior::default()
        },
    );

    let err = infra
        .wait_for_agents_ready(&dialer, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        DelegatioError::Timeout(msg) => assert!(msg.contains("delegatio-0")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn agent_gate_with_no_domains_is_immediate() {
    let home = TempDir::new().unwrap();
    let (log, _host, infra) = infrastructure(&home);
    let dialer = FakeDialer::new(log.clone());

    infra
        .wait_for_agents_ready(&dialer, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(log.count("ping "), 0);
}

// ============================================================================
// TEARDOWN
// ============================================================================

#[tokio::test]
async fn teardown_runs_in_dependency_order() {
    let home = TempDir::new().unwrap();
    let (log, host, infra) = infrastructure(&home);
    provision_and_launch(&infra).await;
    log.clear();

    infra.terminate_infrastructure().await.unwrap();

    let last_domain = log.last("destroy_domain").unwrap();
    let first_volume = log.first("delete_volume").unwrap();
    let last_volume = log.last("delete_volume").unwrap();
    let network = log.first("destroy_network").unwrap();
    let pool = log.first("destroy_pool").unwrap();
    assert!(last_domain < first_volume);
    assert!(last_volume < network);
    assert!(network < pool);

    assert!(host.domains().is_empty());
    assert!(host.volumes().is_empty());
    assert!(host.networks().is_empty());
    assert!(host.pools().is_empty());
    assert!(infra.resources().is_empty());
    assert!(infra.domain_names().is_empty());
}

#[tokio::test]
async fn teardown_on_empty_host_succeeds_repeatedly() {
    let home = TempDir::new().unwrap();
    let (log, _host, infra) = infrastructure(&home);

    infra.terminate_infrastructure().await.unwrap();
    infra.terminate_infrastructure().await.unwrap();

    assert_eq!(log.count("destroy_domain"), 6);
}

#[tokio::test]
async fn teardown_removes_leftovers_from_earlier_run() {
    let home = TempDir::new().unwrap();
    let (_log, host, infra) = infrastructure(&home);
    host.seed_pool("delegatio-pool");
    host.seed_volume("delegatio-pool", "delegatio-base");
    host.seed_volume("delegatio-pool", "delegatio-1");
    host.seed_network("delegatio");
    host.seed_domain("delegatio-1");

    infra.terminate_infrastructure().await.unwrap();

    assert!(host.domains().is_empty());
    assert!(host.volumes().is_empty());
    assert!(host.networks().is_empty());
    assert!(host.pools().is_empty());
}

#[tokio::test]
async fn teardown_failure_keeps_registration() {
    let home = TempDir::new().unwrap();
    let (log, host, infra) = infrastructure(&home);
    provision_and_launch(&infra).await;
    host.fail("destroy_network", "delegatio");

    let err = infra.terminate_infrastructure().await.unwrap_err();

    assert!(matches!(err, DelegatioError::Provision(_)));
    assert_eq!(log.count("destroy_pool"), 0);
    assert_eq!(infra.resources().networks(), ["delegatio"]);
}
