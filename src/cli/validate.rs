use std::path::Path;

use console::style;

use crate::cli::commands::ValidateArgs;
use crate::config::{self, paths, HarborTuiConfig};
use crate::errors::HarborError;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), HarborError> {
    let config = config::parse_config(&args.config).await?;
    println!("Configuration is valid: {}", args.config.display());
    if !config.harbor.can_authenticate() {
        println!(
            "  {}",
            style("No complete login configured; the browser will ask for credentials.").dim()
        );
    }
    Ok(())
}

/// Prints the config file in use (or the default location) and its
/// effective settings, secrets redacted.
pub fn handle_config_path(config: &HarborTuiConfig, requested: Option<&Path>) {
    let path = config
        .config_file
        .clone()
        .or_else(|| requested.map(Path::to_path_buf))
        .unwrap_or_else(paths::default_config_file);
    let state = if config.config_file.is_some() {
        style("loaded").green()
    } else if path.exists() {
        style("not loaded").red()
    } else {
        style("not found, using defaults").yellow()
    };
    println!("{} ({})", path.display(), state);
    println!("{} {}", style("Logs:").dim(), paths::logs_dir().display());
    println!();
    for (key, value) in config.summary_rows() {
        println!("  {:<28} {}", key, value);
    }
}
