// main.rs
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use weightpilot::cli::{self, App, Args};
use weightpilot::config::{Config, Overrides};

fn init_logging(verbose: bool) {
    let default = if verbose { "weightpilot=debug" } else { "weightpilot=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(Overrides {
        data_dir: args.data_dir,
        cache_dir: args.cache_dir,
        backend_url: args.backend_url,
        api_key: args.api_key,
        timeout_secs: args.timeout,
    })?;
    let app = App::new(config)?;
    cli::dispatch(&app, args.command).await
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("❌ {}", format!("{:#}", e).red());
        std::process::exit(1);
    }
}
