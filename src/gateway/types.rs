use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// The registry operations the browser uses. Also the operation half of a
/// cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListProjects,
    ListRepositories,
    ListArtifacts,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::ListProjects,
        Operation::ListRepositories,
        Operation::ListArtifacts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListProjects => "list_projects",
            Operation::ListRepositories => "list_repositories",
            Operation::ListArtifacts => "list_artifacts",
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == wanted || op.as_str().trim_start_matches("list_") == wanted)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the gateway saw on its most recent HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDiagnostics {
    pub method: String,
    pub url: String,
    /// `None` when the request never produced a response.
    pub status_code: Option<u16>,
}

tokio::task_local! {
    static CAPTURED: RefCell<Option<CallDiagnostics>>;
}

impl CallDiagnostics {
    /// Hands this exchange to the enclosing [`CallDiagnostics::capture`], if
    /// there is one. Gateways call this for every request they make.
    pub fn note(&self) {
        let _ = CAPTURED.try_with(|slot| *slot.borrow_mut() = Some(self.clone()));
    }

    /// Runs `fut` and returns the last exchange noted while it ran. Only
    /// requests made by `fut` itself are seen, not those of other tasks.
    pub async fn capture<F: Future>(fut: F) -> (F::Output, Option<CallDiagnostics>) {
        CAPTURED
            .scope(RefCell::new(None), async move {
                let output = fut.await;
                let last = CAPTURED.with(|slot| slot.borrow_mut().take());
                (output, last)
            })
            .await
    }
}

impl fmt::Display for CallDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} {}: {}", self.method, self.url, code),
            None => write!(f, "{} {}: no response", self.method, self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_accepts_short_names() {
        assert_eq!("projects".parse::<Operation>().unwrap(), Operation::ListProjects);
        assert_eq!("list-artifacts".parse::<Operation>().unwrap(), Operation::ListArtifacts);
        assert_eq!("list_repositories".parse::<Operation>().unwrap(), Operation::ListRepositories);
        assert!("tags".parse::<Operation>().is_err());
    }

    #[test]
    fn test_diagnostics_display() {
        let diag = CallDiagnostics {
            method: "GET".into(),
            url: "https://h/api/v2.0/projects".into(),
            status_code: Some(200),
        };
        assert_eq!(diag.to_string(), "GET https://h/api/v2.0/projects: 200");
    }

    fn diag(url: &str) -> CallDiagnostics {
        CallDiagnostics {
            method: "GET".into(),
            url: url.into(),
            status_code: Some(200),
        }
    }

    #[tokio::test]
    async fn test_capture_sees_only_its_own_requests() {
        let slow = CallDiagnostics::capture(async {
            diag("https://h/slow").note();
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        });
        let fast = CallDiagnostics::capture(async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            diag("https://h/fast").note();
        });
        let ((_, slow), (_, fast)) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap().url, "https://h/slow");
        assert_eq!(fast.unwrap().url, "https://h/fast");
    }

    #[test]
    fn test_note_outside_capture_is_ignored() {
        diag("https://h/none").note();
    }
}
