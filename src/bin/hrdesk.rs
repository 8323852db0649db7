use clap::Parser;
use hrdesk::cli::utils::ReportedError;
use hrdesk::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so HRDESK_API_URL and friends can live there
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hrdesk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = hrdesk::config::config();
    tracing::debug!("Using {:?} config against {}", config.environment, config.api.base_url);

    if let Err(e) = hrdesk::cli::run(cli, config).await {
        // Commands print their own failures; everything else is reported here
        if e.downcast_ref::<ReportedError>().is_none() {
            match std::env::var("CLI_VERBOSE").as_deref() {
                Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
                _ => eprintln!("Error: {e}"),
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
