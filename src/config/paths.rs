use std::path::PathBuf;

const APP_NAME: &str = "harbortui";

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

pub fn logs_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("logs")
}

pub fn history_file() -> PathBuf {
    config_dir().join("history.txt")
}
