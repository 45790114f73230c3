use cater_schema::{
    cli::Cli,
    commands,
    config::settings::Settings,
    errors::Result,
};
use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // 1. Load .env first so RUST_LOG and DATABASE_URL from it apply
    let dotenv_loaded = dotenv().is_ok(); // Non-fatal, env vars can be set externally

    // 2. Initialize tracing; stdout is reserved for reports
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    debug!("Loaded .env file: {}", dotenv_loaded);

    // 3. Parse arguments and resolve settings
    let cli = Cli::parse();
    let settings = Settings::from_env(cli.overrides())
        .inspect_err(|e| error!("Invalid configuration: {}", e))?;
    info!(
        "Running {:?} against {} database(s)",
        cli.command,
        settings.databases.len()
    );

    // 4. Run the command
    let output = commands::run(cli.command, &settings, cli.format)
        .await
        .inspect_err(|e| error!("Command failed: {}", e))?;

    print!("{}", output.stdout);
    Ok(ExitCode::from(output.exit_code))
}
