use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity level reported by the registry's vulnerability scanner,
/// ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Negligible,
    Unknown,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Negligible,
        Severity::Unknown,
    ];

    /// Returns a numeric rank where lower values indicate higher severity.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Negligible => 4,
            Severity::Unknown => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Negligible => "Negligible",
            Severity::Unknown => "Unknown",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .iter()
            .copied()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown severity '{}'", s))
    }
}

// Harbor also reports "None" for clean artifacts; anything unrecognised is Unknown.
impl From<String> for Severity {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Severity::Unknown)
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single vulnerability attached to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// CVE (or scanner-specific) identifier, e.g. "CVE-2023-1111".
    #[serde(rename = "id")]
    pub cve_id: String,
    pub severity: Severity,
    pub package: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub fix_version: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl Finding {
    pub fn is_fixable(&self) -> bool {
        self.fix_version.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}
