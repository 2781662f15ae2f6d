//! Address resolution and session caching in the host-backed dialer.

use delegatio::{AgentDialer, DelegatioError, HostDialer};
use delegatio_test_utils::{CallLog, FakeHost, spawn_agent};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

const NODE: &str = "delegatio-0";

/// Loopback address the test agent does not listen on.
const DEAD: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 9));
const LIVE: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

async fn dialer() -> (Arc<FakeHost>, HostDialer) {
    let port = spawn_agent().await.port();
    let host = Arc::new(FakeHost::new(CallLog::new()));
    host.seed_domain(NODE);
    let dialer = HostDialer::new(host.clone(), port, Duration::from_millis(200));
    (host, dialer)
}

async fn ping(dialer: &HostDialer) -> Result<(), DelegatioError> {
    let agent = dialer.dial(NODE).await?;
    tokio::time::timeout(Duration::from_secs(2), agent.ping())
        .await
        .map_err(|_| DelegatioError::Timeout("ping".into()))?
}

#[tokio::test]
async fn changed_address_is_dialed_afresh() {
    let (host, dialer) = dialer().await;
    ping(&dialer).await.unwrap();

    host.set_address(DEAD);

    assert!(ping(&dialer).await.is_err());
}

#[tokio::test]
async fn unreachable_first_address_recovers_after_change() {
    let (host, dialer) = dialer().await;
    host.set_address(DEAD);
    assert!(ping(&dialer).await.is_err());

    host.set_address(LIVE);

    ping(&dialer).await.unwrap();
    assert_eq!(dialer.cached(), 1);
}

#[tokio::test]
async fn transport_failure_evicts_session() {
    let (host, dialer) = dialer().await;
    host.set_address(DEAD);

    let err = ping(&dialer).await.unwrap_err();

    assert!(matches!(err, DelegatioError::Rpc(_)), "{err:?}");
    assert_eq!(dialer.cached(), 0);
}

#[tokio::test]
async fn session_is_reused_while_address_holds() {
    let (_host, dialer) = dialer().await;
    ping(&dialer).await.unwrap();
    ping(&dialer).await.unwrap();
    assert_eq!(dialer.cached(), 1);

    dialer.reset();

    assert_eq!(dialer.cached(), 0);
    ping(&dialer).await.unwrap();
}

#[tokio::test]
async fn node_without_address_is_not_dialable() {
    let (_host, dialer) = dialer().await;

    let err = dialer.dial("delegatio-7").await.err().unwrap();

    assert!(matches!(err, DelegatioError::Rpc(ref msg) if msg.contains("no network address")));
}
