//! Cluster formation against an in-memory host and scripted agents.

use delegatio::bootstrap::{JoinCredentials, KubeadmOutputParser};
use delegatio::{BootstrapStage, ClusterBootstrap, Delegatio, DelegatioError, Infrastructure};
use delegatio_test_utils::{
    AgentBehavior, CallLog, FakeDialer, FakeHost, RecordingParser, SAMPLE_ENDPOINT, SAMPLE_HASH,
    SAMPLE_KUBECONFIG, SAMPLE_TOKEN, test_options,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ============================================================================
// TEST FIXTURES
// ============================================================================

struct Harness {
    home: TempDir,
    log: CallLog,
    host: Arc<FakeHost>,
    dialer: Arc<FakeDialer>,
    orchestrator: Delegatio,
}

fn harness(behavior: AgentBehavior) -> Harness {
    harness_with(behavior, |_| {})
}

fn harness_with(
    behavior: AgentBehavior,
    configure: impl FnOnce(&mut delegatio::DelegatioOptions),
) -> Harness {
    let home = TempDir::new().unwrap();
    let mut options = test_options(home.path());
    configure(&mut options);

    let log = CallLog::new();
    let host = Arc::new(FakeHost::new(log.clone()));
    let dialer = Arc::new(FakeDialer::with_behavior(log.clone(), behavior));
    let orchestrator = Delegatio::with_backends(options, host.clone(), dialer.clone()).unwrap();

    Harness {
        home,
        log,
        host,
        dialer,
        orchestrator,
    }
}

fn expected_join_args() -> String {
    format!(
        "kubeadm join {} --token {} --discovery-token-ca-cert-hash {}",
        SAMPLE_ENDPOINT, SAMPLE_TOKEN, SAMPLE_HASH
    )
}

fn stage_of(err: &DelegatioError) -> &str {
    match err {
        DelegatioError::Bootstrap { stage, .. } => stage,
        other => panic!("expected bootstrap error, got {other:?}"),
    }
}

// ============================================================================
// HAPPY PATH
// ============================================================================

#[tokio::test]
async fn bootstrap_forms_three_node_cluster() {
    let h = harness(AgentBehavior::default());

    let creds = h
        .orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        *creds,
        JoinCredentials::new(SAMPLE_ENDPOINT, SAMPLE_TOKEN, SAMPLE_HASH).unwrap()
    );
    assert_eq!(h.orchestrator.stage(), BootstrapStage::Ready);
    assert_eq!(
        h.host.domains(),
        vec!["delegatio-0", "delegatio-1", "delegatio-2"]
    );

    // Exactly one init, on the initializer.
    assert_eq!(h.log.count("stream "), 1);
    assert_eq!(h.log.count("stream delegatio-0 "), 1);

    // Exactly two joins, one per worker, with identical arguments.
    let joins = h.log.matching("exec ");
    assert_eq!(joins.len(), 2);
    assert!(joins.contains(&format!("exec delegatio-1 {}", expected_join_args())));
    assert!(joins.contains(&format!("exec delegatio-2 {}", expected_join_args())));

    let kubeconfig = std::fs::read(h.home.path().join("admin.conf")).unwrap();
    assert_eq!(kubeconfig, SAMPLE_KUBECONFIG.as_bytes());

    for name in h.orchestrator.infrastructure().domain_names() {
        let info = h.orchestrator.infrastructure().domain_info(&name).unwrap();
        assert!(info.guest_agent_ready, "{name} should be ready");
    }
}

#[tokio::test]
async fn bootstrap_twice_registers_same_resources() {
    let h = harness(AgentBehavior::default());
    let cancel = CancellationToken::new();

    h.orchestrator.bootstrap(&cancel).await.unwrap();
    let first = h.orchestrator.infrastructure().resources();

    h.orchestrator.bootstrap(&cancel).await.unwrap();
    let second = h.orchestrator.infrastructure().resources();

    assert_eq!(first.pools(), second.pools());
    assert_eq!(first.networks(), second.networks());

    let sorted = |names: &[String]| {
        let mut names = names.to_vec();
        names.sort();
        names
    };
    assert_eq!(sorted(first.disks()), sorted(second.disks()));
    assert_eq!(sorted(first.domains()), sorted(second.domains()));
    assert_eq!(h.host.domains().len(), 3);
}

#[tokio::test]
async fn kubeadm_config_is_uploaded_before_init() {
    let config_dir = TempDir::new().unwrap();
    let config_path = config_dir.path().join("kubeadm.yaml");
    std::fs::write(&config_path, b"kind: ClusterConfiguration\n").unwrap();

    let h = harness_with(AgentBehavior::default(), |options| {
        options.kubeadm_config = Some(config_path.clone());
    });

    h.orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        h.dialer.file("delegatio-0", "/tmp/kubeadmconf.yaml").unwrap(),
        b"kind: ClusterConfiguration\n"
    );
    let write = h.log.first("write delegatio-0").unwrap();
    let init = h.log.first("stream delegatio-0").unwrap();
    assert!(write < init);
}

#[tokio::test]
async fn agents_become_ready_after_failed_pings() {
    let h = harness(AgentBehavior {
        failing_pings: 3,
        ..AgentBehavior::default()
    });

    h.orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap();

    for node in ["delegatio-0", "delegatio-1", "delegatio-2"] {
        assert_eq!(h.log.count(&format!("ping {node}")), 4);
    }
}

// ============================================================================
// ORDERING
// ============================================================================

#[tokio::test]
async fn joins_start_only_after_init_completes() {
    let home = TempDir::new().unwrap();
    let options = test_options(home.path());
    let log = CallLog::new();
    let host = Arc::new(FakeHost::new(log.clone()));
    let dialer = Arc::new(FakeDialer::with_behavior(
        log.clone(),
        AgentBehavior {
            init_delay: Duration::from_millis(200),
            ..AgentBehavior::default()
        },
    ));
    let infra = Arc::new(Infrastructure::new(host, options.clone()).unwrap());
    let cluster = ClusterBootstrap::new(infra, dialer, &options).with_parser(
        Arc::new(RecordingParser::new(log.clone())),
        KubeadmOutputParser::init_command(None),
    );

    cluster.bootstrap(&CancellationToken::new()).await.unwrap();

    let drained = log.first("stream-done delegatio-0").unwrap();
    let parsed = log.first("parsed join-credentials").unwrap();
    assert!(drained < parsed);

    let entries = log.entries();
    let joins: Vec<usize> = (0..entries.len())
        .filter(|&i| entries[i].starts_with("exec "))
        .collect();
    assert_eq!(joins.len(), 2);
    assert!(joins.iter().all(|&i| i > parsed), "{entries:#?}");
}

#[tokio::test]
async fn readiness_follows_launch() {
    let h = harness(AgentBehavior::default());

    h.orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap();

    let last_domain = h.log.last("create_domain").unwrap();
    let first_network_poll = h.log.first("network_active").unwrap();
    let last_network_poll = h.log.last("network_active").unwrap();
    let first_ping = h.log.first("ping ").unwrap();
    let init = h.log.first("stream ").unwrap();

    assert!(last_domain < first_network_poll);
    assert!(last_network_poll < first_ping);
    assert!(h.log.last("ping ").unwrap() < init);
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn failing_domain_aborts_before_readiness() {
    let h = harness(AgentBehavior::default());
    h.host.fail("create_domain", "delegatio-1");

    let err = h
        .orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(stage_of(&err), "launching");
    match &err {
        DelegatioError::Bootstrap { source, .. } => match source.as_ref() {
            DelegatioError::FanOut { task, .. } => assert_eq!(task, "create instance delegatio-1"),
            other => panic!("expected fan-out error, got {other:?}"),
        },
        _ => unreachable!(),
    }
    assert!(matches!(err.root_cause(), DelegatioError::Provision(_)));
    assert_eq!(h.orchestrator.stage(), BootstrapStage::Failed);

    assert_eq!(h.log.count("network_active"), 0);
    assert_eq!(h.log.count("ping "), 0);
    assert_eq!(h.log.count("stream "), 0);
    assert_eq!(h.log.count("exec "), 0);
}

#[tokio::test]
async fn missing_markers_fail_without_joins() {
    let h = harness(AgentBehavior {
        init_output: "Your Kubernetes control-plane has initialized successfully!\n".to_string(),
        ..AgentBehavior::default()
    });

    let err = h
        .orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(stage_of(&err), "initializing");
    assert!(matches!(err.root_cause(), DelegatioError::ProtocolParse(_)));
    assert_eq!(h.log.count("exec "), 0);
    assert!(!h.home.path().join("admin.conf").exists());
}

#[tokio::test]
async fn missing_join_command_fails_after_persisting_kubeconfig() {
    let output = format!(
        "{}\n{}{}\n",
        delegatio::bootstrap::ADMIN_CONFIG_BEGIN,
        SAMPLE_KUBECONFIG,
        delegatio::bootstrap::ADMIN_CONFIG_END
    );
    let h = harness(AgentBehavior {
        init_output: output,
        ..AgentBehavior::default()
    });

    let err = h
        .orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), DelegatioError::ProtocolParse(_)));
    assert_eq!(h.log.count("exec "), 0);
    assert!(h.home.path().join("admin.conf").exists());
}

#[tokio::test]
async fn failing_init_stream_is_remote_error() {
    let h = harness(AgentBehavior {
        init_fails: true,
        ..AgentBehavior::default()
    });

    let err = h
        .orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(stage_of(&err), "initializing");
    assert!(matches!(err.root_cause(), DelegatioError::Internal(_)));
    assert_eq!(h.log.count("exec "), 0);
}

#[tokio::test]
async fn failing_join_names_the_node() {
    let h = harness(AgentBehavior {
        failing_exec: HashSet::from(["delegatio-2".to_string()]),
        ..AgentBehavior::default()
    });

    let err = h
        .orchestrator
        .bootstrap(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(stage_of(&err), "joining");
    match &err {
        DelegatioError::Bootstrap { source, .. } => match source.as_ref() {
            DelegatioError::FanOut { task, .. } => assert_eq!(task, "join delegatio-2"),
            other => panic!("expected fan-out error, got {other:?}"),
        },
        _ => unreachable!(),
    }
    assert!(matches!(err.root_cause(), DelegatioError::Internal(_)));
}

#[tokio::test]
async fn cancelled_token_stops_bootstrap() {
    let h = harness(AgentBehavior::default());
    h.host.never_activate_network();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = h.orchestrator.bootstrap(&cancel).await.unwrap_err();

    assert_eq!(stage_of(&err), "awaiting readiness");
    assert!(matches!(err.root_cause(), DelegatioError::Cancelled(_)));
    assert_eq!(h.log.count("stream "), 0);
}

#[tokio::test]
async fn cancel_during_network_creation_fails_provisioning() {
    let h = harness(AgentBehavior::default());
    h.host.delay("create_network", Duration::from_secs(3));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(1), h.orchestrator.bootstrap(&cancel))
        .await
        .expect("cancellation must interrupt network creation")
        .unwrap_err();

    assert_eq!(stage_of(&err), "provisioning");
    assert!(matches!(err.root_cause(), DelegatioError::Cancelled(_)));
    assert!(h.host.networks().is_empty());
    assert_eq!(h.log.count("create_domain"), 0);
}

#[tokio::test]
async fn second_orchestrator_on_same_home_is_rejected() {
    let h = harness(AgentBehavior::default());

    let log = CallLog::new();
    let result = Delegatio::with_backends(
        h.orchestrator.options().clone(),
        Arc::new(FakeHost::new(log.clone())),
        Arc::new(FakeDialer::new(log)),
    );

    let err = result.err().unwrap();
    assert!(err.to_string().contains("Another delegatio orchestrator"));
}
