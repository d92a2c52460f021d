use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Show configuration file path")]
    Path,
}

pub fn handle_config(
    cmd: ConfigCommand,
    config: &Config,
    explicit_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(explicit_path, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(config, format),
        ConfigCommand::Path => handle_path(explicit_path, formatter.as_ref()),
    }
}

fn resolve_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    match explicit_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory")),
    }
}

fn handle_init(explicit_path: Option<&Path>, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = resolve_path(explicit_path)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save_to(&path)
        .with_context(|| format!("failed to write config to {}", path.display()))?;

    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

/// Secrets are never printed.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    };
    mask(&mut config.embedding.api_key);
    mask(&mut config.language_model.api_key);
    mask(&mut config.vector_store.api_key);
    config
}

fn handle_show(config: &Config, format: OutputFormat) -> Result<()> {
    let config = redacted(config);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}

fn handle_path(explicit_path: Option<&Path>, formatter: &dyn Formatter) -> Result<()> {
    let path = resolve_path(explicit_path)?;
    let state = if path.exists() { "exists" } else { "not created" };
    print!(
        "{}",
        formatter.format_message(&format!("{} ({})", path.display(), state))
    );
    Ok(())
}
