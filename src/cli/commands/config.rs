use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::error::ConfigError;
use crate::models::{Config, EMBEDDING_URL_ENV, LLM_URL_ENV, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show the configuration file path")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(force, format, config_path),
        ConfigCommand::Show => handle_show(format, config_path),
        ConfigCommand::Path => handle_path(config_path),
    }
}

fn target_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string()).into()
        }),
    }
}

fn handle_init(force: bool, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let formatter = get_formatter(format);
    let path = target_path(config_path)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save(&path)
        .context("failed to write config")?;
    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Ok(path) = target_path(config_path)
        && path.exists()
    {
        println!("# Config file: {}", path.display());
    }
    println!("# {EMBEDDING_URL_ENV} and {LLM_URL_ENV} from the environment override the file");
    println!();
    print!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

fn handle_path(config_path: Option<&Path>) -> Result<()> {
    let path = target_path(config_path)?;
    let state = if path.exists() { "exists" } else { "not created" };
    println!("{} ({})", path.display(), state);
    Ok(())
}
