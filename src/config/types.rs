use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

use crate::errors::HarborError;
use super::credentials::{redact_credentials, resolve_credential};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HarborTuiConfig {
    #[serde(default)]
    pub harbor: HarborSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub session: SessionSettings,
    /// Set by the parser when the config was loaded from disk.
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl HarborTuiConfig {
    /// Setting/value rows for display, with secrets redacted.
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let h = &self.harbor;
        let secrets: Vec<&str> = [h.secret.as_deref(), h.credentials_base64.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let rows = vec![
            ("harbor.url", h.url.clone()),
            ("harbor.username", opt(&h.username)),
            ("harbor.secret", if h.secret.is_some() { "[REDACTED]".into() } else { "-".into() }),
            (
                "harbor.credentials_file",
                h.credentials_file.as_ref().map_or("-".to_string(), |p| p.display().to_string()),
            ),
            (
                "harbor.credentials_base64",
                if h.credentials_base64.is_some() { "[REDACTED]".into() } else { "-".into() },
            ),
            ("harbor.timeout_secs", h.timeout_secs.to_string()),
            ("harbor.auth_timeout_secs", h.auth_timeout_secs.to_string()),
            ("harbor.page_size", h.page_size.to_string()),
            ("logging.enabled", self.logging.enabled.to_string()),
            ("logging.structured", self.logging.structured.to_string()),
            ("logging.level", self.logging.level.to_string()),
            ("session.history_size", self.session.history_size.to_string()),
            ("session.call_log_capacity", self.session.call_log_capacity.to_string()),
        ];
        rows.into_iter()
            .map(|(k, v)| (k, redact_credentials(&v, &secrets)))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarborSettings {
    #[serde(default)]
    pub url: String,
    pub username: Option<String>,
    pub secret: Option<String>,
    /// Robot account JSON file (`{"name": ..., "secret": ...}`).
    pub credentials_file: Option<PathBuf>,
    /// base64 of "username:secret".
    pub credentials_base64: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_auth_timeout_secs() -> u64 {
    5
}

fn default_page_size() -> u32 {
    100
}

impl Default for HarborSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: None,
            secret: None,
            credentials_file: None,
            credentials_base64: None,
            timeout_secs: default_timeout_secs(),
            auth_timeout_secs: default_auth_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl HarborSettings {
    /// A URL plus one complete authentication method.
    pub fn can_authenticate(&self) -> bool {
        if self.url.trim().is_empty() {
            return false;
        }
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        (filled(&self.username) && filled(&self.secret))
            || filled(&self.credentials_base64)
            || self.credentials_file.is_some()
    }

    /// Resolve whichever authentication method is configured into a plain
    /// credentials record. Username/secret wins over base64, which wins over
    /// the credentials file.
    pub fn credentials(&self) -> Result<Credentials, HarborError> {
        if !self.can_authenticate() {
            return Err(HarborError::Config(
                "harbor.url and one of username/secret, credentials_base64 or credentials_file are required".into(),
            ));
        }

        if let (Some(user), Some(secret)) = (&self.username, &self.secret) {
            if !user.is_empty() && !secret.is_empty() {
                return Ok(Credentials::new(
                    &self.url,
                    resolve_credential(user),
                    resolve_credential(secret),
                ));
            }
        }

        if let Some(encoded) = self.credentials_base64.as_deref().filter(|s| !s.is_empty()) {
            let encoded = resolve_credential(encoded);
            let decoded = BASE64
                .decode(encoded.trim().as_bytes())
                .map_err(|e| HarborError::Config(format!("credentials_base64 is not valid base64: {}", e)))?;
            let decoded = String::from_utf8(decoded)
                .map_err(|_| HarborError::Config("credentials_base64 is not valid UTF-8".into()))?;
            let (user, secret) = decoded
                .split_once(':')
                .ok_or_else(|| HarborError::Config("credentials_base64 must encode 'username:secret'".into()))?;
            return Ok(Credentials::new(&self.url, user.to_string(), secret.to_string()));
        }

        if let Some(path) = &self.credentials_file {
            let content = std::fs::read_to_string(path).map_err(|e| {
                HarborError::Config(format!("Cannot read credentials file {}: {}", path.display(), e))
            })?;
            let file: CredentialsFile = serde_json::from_str(&content)?;
            return Ok(Credentials::new(&self.url, file.name, file.secret));
        }

        Err(HarborError::Internal("no credentials method resolved".into()))
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    name: String,
    secret: String,
}

/// The plain `{url, username, secret}` record handed to the gateway.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(url: &str, username: String, secret: String) -> Self {
        Self {
            url: url.trim().to_string(),
            username,
            secret,
        }
    }

    /// Fields the login prompt has left blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.trim().is_empty() {
            missing.push("url");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.secret.is_empty() {
            missing.push("secret");
        }
        missing
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Write JSON lines instead of plain text.
    #[serde(default)]
    pub structured: bool,
    #[serde(default)]
    pub level: LogLevel,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            structured: false,
            level: LogLevel::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" | "success" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "critical" => Ok(Self::Error),
            other => Err(format!("{} is not a valid log level", other)),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(value: LogLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_call_log_capacity")]
    pub call_log_capacity: usize,
}

fn default_history_size() -> usize {
    200
}

fn default_call_log_capacity() -> usize {
    100
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            call_log_capacity: default_call_log_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> HarborSettings {
        HarborSettings {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_can_authenticate_requires_url() {
        let mut s = settings("");
        s.username = Some("admin".into());
        s.secret = Some("Harbor12345".into());
        assert!(!s.can_authenticate());
        s.url = "https://harbor.example.com".into();
        assert!(s.can_authenticate());
    }

    #[test]
    fn test_can_authenticate_requires_full_method() {
        let mut s = settings("https://harbor.example.com");
        assert!(!s.can_authenticate());
        s.username = Some("admin".into());
        assert!(!s.can_authenticate());
        s.credentials_base64 = Some("YWRtaW46c2VjcmV0".into());
        assert!(s.can_authenticate());
    }

    #[test]
    fn test_credentials_from_username_secret() {
        let mut s = settings("https://harbor.example.com ");
        s.username = Some("admin".into());
        s.secret = Some("Harbor12345".into());
        let creds = s.credentials().unwrap();
        assert_eq!(creds.url, "https://harbor.example.com");
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.secret, "Harbor12345");
    }

    #[test]
    fn test_credentials_from_base64() {
        let mut s = settings("https://harbor.example.com");
        s.credentials_base64 = Some(BASE64.encode(b"robot$ci:s3cr3t"));
        let creds = s.credentials().unwrap();
        assert_eq!(creds.username, "robot$ci");
        assert_eq!(creds.secret, "s3cr3t");
    }

    #[test]
    fn test_credentials_base64_without_colon_rejected() {
        let mut s = settings("https://harbor.example.com");
        s.credentials_base64 = Some(BASE64.encode(b"nocolon"));
        assert!(matches!(s.credentials(), Err(HarborError::Config(_))));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("https://h", "admin".into(), "hunter22".into());
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter22"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_missing_fields() {
        let creds = Credentials::new("", "admin".into(), String::new());
        assert_eq!(creds.missing_fields(), vec!["url", "secret"]);
    }

    #[test]
    fn test_log_level_aliases() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("success".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_summary_rows_redact_secret() {
        let mut config = HarborTuiConfig::default();
        config.harbor.url = "https://harbor.example.com".into();
        config.harbor.secret = Some("Harbor12345".into());
        let rows = config.summary_rows();
        assert!(rows.iter().all(|(_, v)| !v.contains("Harbor12345")));
        assert!(rows.iter().any(|(k, v)| *k == "harbor.secret" && v == "[REDACTED]"));
    }

    #[test]
    fn test_config_defaults() {
        let config = HarborTuiConfig::default();
        assert!(config.logging.enabled);
        assert!(!config.logging.structured);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.harbor.auth_timeout_secs, 5);
        assert_eq!(config.session.call_log_capacity, 100);
    }
}
