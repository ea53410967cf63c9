use std::path::Path;

use tracing::warn;

use crate::errors::HarborError;
use super::paths::{config_dir, default_config_file};
use super::schema::CONFIG_SCHEMA;
use super::types::HarborTuiConfig;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<HarborTuiConfig, HarborError> {
    if !path.exists() {
        return Err(HarborError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(HarborError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    let mut config = if yaml.is_null() {
        HarborTuiConfig::default()
    } else {
        for msg in schema_warnings(&yaml)? {
            warn!(file = %path.display(), validation_error = %msg, "Config schema warning");
        }
        serde_yaml::from_value(yaml)?
    };

    validate_settings(&config)?;
    config.config_file = Some(path.to_path_buf());
    Ok(config)
}

/// Load `path`, or the default config file when none is given. An explicit
/// path must exist; a missing default file yields the defaults so the
/// browser can start at the login prompt.
pub async fn load_config(path: Option<&Path>) -> Result<HarborTuiConfig, HarborError> {
    match path {
        Some(path) => parse_config(path).await,
        None => {
            let default_path = default_config_file();
            if default_path.exists() {
                parse_config(&default_path).await
            } else {
                Ok(HarborTuiConfig::default())
            }
        }
    }
}

pub async fn init_config_dir() -> Result<(), HarborError> {
    tokio::fs::create_dir_all(config_dir()).await?;
    Ok(())
}

/// Schema violations, one message per problem. Advisory: unknown keys are
/// ignored by deserialization, so they are only reported.
fn schema_warnings(yaml: &serde_yaml::Value) -> Result<Vec<String>, HarborError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| HarborError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| HarborError::Config(format!("Schema compilation error: {}", e)))?;

    let messages = match compiled.validate(&json_value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect(),
    };
    Ok(messages)
}

fn validate_settings(config: &HarborTuiConfig) -> Result<(), HarborError> {
    let url = config.harbor.url.trim();
    if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(HarborError::Config(format!(
            "harbor.url must start with http:// or https://, got '{}'",
            url
        )));
    }

    if !url.is_empty() && !config.harbor.can_authenticate() {
        warn!("harbor.url is set but no complete credentials are configured");
    }

    if config.harbor.page_size == 0 {
        return Err(HarborError::Config("harbor.page_size must be at least 1".into()));
    }

    Ok(())
}
