use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use docqa::cli::commands::{handle_ask, handle_config, handle_ingest, handle_status};
use docqa::cli::output::get_formatter;
use docqa::cli::{Cli, Commands};
use docqa::models::{Config, OutputFormat};

fn init_tracing(verbose: bool) {
    let default = if verbose { "docqa=debug" } else { "docqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        // `config init` must work even when the current file is broken
        Err(e) if matches!(cli.command, Commands::Config(_)) => {
            tracing::warn!(error = %e, "using default configuration");
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };
    let format = cli.format.unwrap_or(config.query.default_format);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::warn!("shutdown requested, finishing the current batch");
        signal_token.cancel();
    });

    let result = run_command(cli, &config, format, cancel).await;

    if let Err(ref e) = result {
        eprint!("{}", get_formatter(format).format_error(&format!("{:#}", e)));
        std::process::exit(1);
    }

    Ok(())
}

async fn run_command(
    cli: Cli,
    config: &Config,
    format: OutputFormat,
    cancel: CancellationToken,
) -> Result<()> {
    match cli.command {
        Commands::Ingest(args) => {
            handle_ingest(args, config, format, cancel).await?;
        }
        Commands::Ask(args) => {
            tokio::select! {
                result = handle_ask(args, config, format) => result?,
                _ = cancel.cancelled() => anyhow::bail!("cancelled"),
            }
        }
        Commands::Status => {
            handle_status(config, format).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, config, cli.config.as_deref(), format)?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
