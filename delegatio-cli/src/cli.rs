use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use delegatio::DelegatioOptions;

use crate::commands::{init::InitArgs, terminate::TerminateArgs};

#[derive(Parser, Debug)]
#[command(name = "delegatio", author, version, about = "Provision a virtual Kubernetes cluster on libvirt")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision the nodes and bootstrap the cluster
    Init(InitArgs),
    /// Destroy every node, volume, network and pool
    Terminate(TerminateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// State directory (lock, logs, admin kubeconfig)
    #[arg(long, global = true, env = "DELEGATIO_HOME")]
    pub home: Option<PathBuf>,

    /// JSON options file; unset fields keep their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl GlobalFlags {
    /// Resolve options from the config file and flags, then validate them.
    pub fn options(&self) -> anyhow::Result<DelegatioOptions> {
        let mut options = match &self.config {
            Some(path) => DelegatioOptions::from_file(path)?,
            None => DelegatioOptions::default(),
        };
        if let Some(home) = &self.home {
            options.home_dir = home.clone();
        }
        options.validate().context("invalid options")?;
        Ok(options)
    }
}
