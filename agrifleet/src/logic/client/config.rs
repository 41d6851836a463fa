use crate::logic::config::{default_config_file, ClientConfig};
use colored::*;
use std::path::{Path, PathBuf};

fn resolve_path(config_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match config_path {
        Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).into_owned())),
        None => Ok(default_config_file()?),
    }
}

/// Show the effective configuration and where it came from
pub fn show(config_path: Option<&str>, effective: &ClientConfig) -> anyhow::Result<()> {
    let path = resolve_path(config_path)?;
    println!("{}", "Current Configuration:".bright_blue().bold());
    if path.exists() {
        println!("  {} {}", "Config file:".cyan(), path.display());
    } else {
        println!("  {} {} {}", "Config file:".cyan(), path.display(), "(not created yet)".dimmed());
    }
    display_config(effective)?;
    Ok(())
}

fn display_config(config: &ClientConfig) -> anyhow::Result<()> {
    println!();
    println!("{}", "Fleet Service:".bright_green().bold());
    println!("  {} {}", "Base URL:".cyan(), config.base_url.bright_white());
    println!(
        "  {} {} seconds",
        "Poll interval:".cyan(),
        config.poll_interval_seconds.to_string().bright_white()
    );
    println!(
        "  {} {} seconds",
        "Request timeout:".cyan(),
        config.request_timeout_seconds.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Session file:".cyan(),
        config.session_path()?.display().to_string().bright_white()
    );
    Ok(())
}

/// Apply the given values on top of the stored file and write it back
pub fn update_file(
    path: &Path,
    base_url: Option<String>,
    poll_interval: Option<u64>,
    request_timeout: Option<u64>,
    session_file: Option<String>,
) -> anyhow::Result<ClientConfig> {
    let mut config = if path.exists() {
        ClientConfig::from_file(&path.to_string_lossy())?
    } else {
        ClientConfig::default()
    };
    if let Some(url) = base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = poll_interval {
        config.poll_interval_seconds = secs;
    }
    if let Some(secs) = request_timeout {
        config.request_timeout_seconds = secs;
    }
    if let Some(file) = session_file {
        config.session_file = Some(file);
    }
    config.validate()?;
    config.save(path)?;
    Ok(config)
}

/// Persist settings to the config file
pub fn set(
    config_path: Option<&str>,
    base_url: Option<String>,
    poll_interval: Option<u64>,
    request_timeout: Option<u64>,
    session_file: Option<String>,
) -> anyhow::Result<()> {
    if base_url.is_none() && poll_interval.is_none() && request_timeout.is_none() && session_file.is_none() {
        eprintln!("{}", "Error: At least one setting must be specified".red().bold());
        eprintln!("Use one or more of: --base-url, --poll-interval, --request-timeout, --session-file");
        return Ok(());
    }

    let path = resolve_path(config_path)?;
    let config = update_file(&path, base_url, poll_interval, request_timeout, session_file)?;

    println!("{} {}", "Configuration saved to".bright_green().bold(), path.display());
    display_config(&config)?;
    Ok(())
}
