mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.global.options()?;
    let _log_guard = delegatio::init_logging_for(&options.home_dir)?;

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, options).await,
        Commands::Terminate(args) => commands::terminate::execute(args, options).await,
    }
}
