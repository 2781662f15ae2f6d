use anyhow::Context;
use clap::Args;
use delegatio::{Delegatio, DelegatioOptions};

#[derive(Args, Debug)]
pub struct TerminateArgs {}

pub async fn execute(_args: TerminateArgs, options: DelegatioOptions) -> anyhow::Result<()> {
    let orchestrator = Delegatio::new(options)?;
    orchestrator
        .terminate()
        .await
        .context("failed to terminate infrastructure")?;
    println!("Infrastructure terminated");
    Ok(())
}
