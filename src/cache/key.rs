use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::HarborError;
use crate::gateway::Operation;

/// `(operation, canonical arguments)` identifying one memoized result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub operation: Operation,
    pub args: Vec<String>,
}

impl CacheKey {
    /// Arguments are trimmed, stripped of trailing slashes and lowercased;
    /// Harbor project and repository names are lowercase.
    pub fn new<I, S>(operation: Operation, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            operation,
            args: args.into_iter().map(|a| Self::canonical_arg(a.as_ref())).collect(),
        }
    }

    /// Canonical form of one argument. Screen ids use the same form.
    pub fn canonical_arg(arg: &str) -> String {
        arg.trim().trim_end_matches('/').to_lowercase()
    }

    pub fn projects() -> Self {
        Self::new(Operation::ListProjects, std::iter::empty::<&str>())
    }

    pub fn repositories(project: &str) -> Self {
        Self::new(Operation::ListRepositories, [project])
    }

    pub fn artifacts(repository: &str) -> Self {
        Self::new(Operation::ListArtifacts, [repository])
    }

    /// Comma-joined arguments, as shown in diagnostics.
    pub fn args_summary(&self) -> String {
        self.args.join(",")
    }

    /// Checks the argument count matches the operation.
    pub fn validate(&self) -> Result<(), HarborError> {
        let expected = match self.operation {
            Operation::ListProjects => 0,
            Operation::ListRepositories | Operation::ListArtifacts => 1,
        };
        if self.args.len() != expected {
            return Err(HarborError::Validation(format!(
                "{} takes {} argument(s), got {}",
                self.operation,
                expected,
                self.args.len()
            )));
        }
        if self.args.iter().any(|a| a.is_empty()) {
            return Err(HarborError::Validation(format!("{} called with a blank argument", self.operation)));
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.args_summary())
    }
}
