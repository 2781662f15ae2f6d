use std::time::Duration;

use anyhow::Context;
use clap::Args;
use delegatio::{Delegatio, DelegatioOptions};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Give up after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

pub async fn execute(args: InitArgs, options: DelegatioOptions) -> anyhow::Result<()> {
    let kubeconfig = options.kubeconfig_path();
    let orchestrator = Delegatio::new(options)?;

    let cancel = CancellationToken::new();
    spawn_cancel_on_ctrl_c(cancel.clone());
    if let Some(secs) = args.timeout {
        spawn_cancel_after(cancel.clone(), Duration::from_secs(secs));
    }

    let creds = orchestrator
        .bootstrap(&cancel)
        .await
        .context("cluster bootstrap failed")?;

    println!("Cluster ready. API server: {}", creds.api_endpoint());
    println!("Admin kubeconfig: {}", kubeconfig.display());
    Ok(())
}

fn spawn_cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling bootstrap");
            cancel.cancel();
        }
    });
}

fn spawn_cancel_after(cancel: CancellationToken, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        tracing::warn!(?after, "deadline reached, cancelling bootstrap");
        cancel.cancel();
    });
}
