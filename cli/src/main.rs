//! branchfarm CLI - per-branch development environments

use clap::Parser;
use tracing_subscriber::EnvFilter;

use branchfarm_cli::cli::Cli;
use branchfarm_cli::output::json;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let as_json = cli.wants_json();
    if let Err(e) = cli.run().await {
        match json::format_error(&format!("{e:#}"), json::error_code(&e)) {
            Ok(obj) if as_json => println!("{obj}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}
