use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::filters::default_filters;
use crate::repl::commands::COMMAND_NAMES;

pub struct ReplHelper {
    filter_names: Vec<String>,
}

impl Default for ReplHelper {
    fn default() -> Self {
        Self {
            filter_names: default_filters()
                .iter()
                .map(|f| f.name().to_lowercase())
                .collect(),
        }
    }
}

impl Helper for ReplHelper {}
impl Validator for ReplHelper {}
impl Highlighter for ReplHelper {}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        let trimmed = line.trim();
        if !trimmed.starts_with('/') || trimmed.contains(' ') {
            return None;
        }
        for name in COMMAND_NAMES {
            if name.starts_with(trimmed) && *name != trimmed {
                return Some(name[trimmed.len()..].to_string());
            }
        }
        None
    }
}

impl ReplHelper {
    fn arguments(&self, cmd: &str, args_before: &[&str]) -> Vec<String> {
        let fixed: &[&str] = match (cmd, args_before) {
            ("/filter" | "/unfilter", []) => return self.filter_names.clone(),
            ("/filter", [name]) if name.eq_ignore_ascii_case("fixable") => &["on", "off"],
            ("/filter", [name]) if name.eq_ignore_ascii_case("severity") => {
                &["critical", "high", "medium", "low", "negligible", "unknown"]
            }
            ("/sort", []) => &["none", "severity", "date", "name"],
            ("/cache", []) => &["clear"],
            ("/cache", ["clear"]) => &["projects", "repositories", "artifacts"],
            ("/open", []) => &["projects", "project:", "repository:"],
            ("/help", []) => &[
                "login", "logout", "open", "back", "next", "prev", "enter", "refresh", "filter", "filters",
                "unfilter", "sort", "report", "cache", "log", "status", "version", "clear", "exit",
            ],
            _ => &[],
        };
        fixed.iter().map(|s| s.to_string()).collect()
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        let trimmed = prefix.trim_start();

        if !trimmed.starts_with('/') {
            return Ok((0, vec![]));
        }

        // Past the command name: complete its arguments
        if trimmed.contains(' ') {
            let mut words: Vec<&str> = trimmed.split_whitespace().collect();
            let partial = if trimmed.ends_with(' ') { "" } else { words.pop().unwrap_or("") };
            let cmd = words.first().copied().unwrap_or("");
            let start = pos - partial.len();

            let matches: Vec<Pair> = self
                .arguments(cmd, words.get(1..).unwrap_or(&[]))
                .into_iter()
                .filter(|candidate| candidate.starts_with(&partial.to_lowercase()))
                .map(|candidate| Pair {
                    display: candidate.clone(),
                    replacement: candidate,
                })
                .collect();

            return Ok((start, matches));
        }

        // Complete command names
        let start = pos - trimmed.len();
        let matches: Vec<Pair> = COMMAND_NAMES
            .iter()
            .filter(|name| name.starts_with(trimmed))
            .map(|name| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect();

        Ok((start, matches))
    }
}
