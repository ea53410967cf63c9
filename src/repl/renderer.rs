use chrono::{DateTime, Utc};
use console::style;

use crate::cache::CacheKey;
use crate::filters::{FilterPipeline, FilterReport};
use crate::models::{ArtifactRecord, Project, Repository, Severity};
use crate::navigation::{ScreenState, SessionNavigator, SessionState};
use crate::repl::commands::{CommandHelp, COMMAND_HELP};

pub fn render_severity_badge(severity: &Severity) -> String {
    match severity {
        Severity::Critical => style(" CRITICAL ").on_red().white().bold().to_string(),
        Severity::High => style(" HIGH ").red().bold().to_string(),
        Severity::Medium => style(" MEDIUM ").yellow().bold().to_string(),
        Severity::Low => style(" LOW ").blue().to_string(),
        Severity::Negligible => style(" NEGLIGIBLE ").dim().to_string(),
        Severity::Unknown => style(" UNKNOWN ").dim().to_string(),
    }
}

/// Render the help listing for all commands.
pub fn render_help(specific_command: Option<&str>) -> String {
    if let Some(cmd_name) = specific_command {
        if let Some(cmd) = COMMAND_HELP.iter().find(|c| c.name == cmd_name) {
            return format_command_detail(cmd);
        } else {
            return format!("{} Unknown command: /{}", style("✗").red(), cmd_name);
        }
    }

    let mut out = String::new();
    out.push_str(&format!("\n{}\n\n", style("Available commands:").white().bold()));
    for cmd in COMMAND_HELP {
        out.push_str(&format!(
            "  {:<16} {}\n",
            style(format!("/{}", cmd.name)).cyan().bold(),
            style(cmd.description).dim(),
        ));
    }
    out.push_str(&format!("\n  {}\n", style("A bare number opens that row.").dim()));
    out
}

fn format_command_detail(cmd: &CommandHelp) -> String {
    format!(
        "\n{}\n  {}\n\n  {}\n",
        style(format!("/{}", cmd.name)).cyan().bold(),
        style(cmd.description).dim(),
        style(cmd.usage).white(),
    )
}

/// Render the version info.
pub fn render_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("dev");
    let build_ts = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");

    format!(
        "\n  {} {}\n  {} {}\n  {} {}\n",
        style("Version:").dim(),
        style(version).white().bold(),
        style("Commit:").dim(),
        style(git_hash).white(),
        style("Built:").dim(),
        style(build_ts).white(),
    )
}

pub fn render_error(msg: &str) -> String {
    format!("{} {}", style("✗").red(), style(msg).red())
}

pub fn render_warning(msg: &str) -> String {
    format!("{} {}", style("⚠").yellow(), style(msg).yellow())
}

pub fn render_success(msg: &str) -> String {
    format!("{} {}", style("✓").green(), msg)
}

pub fn render_info(msg: &str) -> String {
    format!("{}", style(msg).dim())
}

/// The current screen: title, notice, numbered rows with a focus marker.
pub fn render_screen(screen: &ScreenState) -> String {
    let mut out = String::new();
    let source = if screen.data.is_none() {
        String::new()
    } else if screen.from_cache {
        format!(" {}", style("(cached)").dim())
    } else {
        String::new()
    };
    out.push_str(&format!(
        "\n{}{}  {}\n",
        style(screen.title()).white().bold(),
        source,
        style(screen.id.as_str()).dim(),
    ));

    if let Some(notice) = &screen.notice {
        out.push_str(&format!("  {}\n", render_warning(notice)));
    }
    if let Some(pipeline) = &screen.pipeline {
        let active: Vec<String> = pipeline
            .active()
            .map(|f| format!("{}={}", f.name(), f.value()))
            .collect();
        if !active.is_empty() {
            out.push_str(&format!("  {} {}\n", style("Filters:").dim(), active.join(" ")));
        }
    }
    out.push('\n');

    if screen.loading && screen.data.is_none() {
        out.push_str(&format!("  {}\n", style("Loading...").dim()));
        return out;
    }
    if screen.options.is_empty() {
        let msg = if screen.data.is_some() { "Nothing to show." } else { "Not loaded yet." };
        out.push_str(&format!("  {}\n", style(msg).dim()));
        return out;
    }

    let focused = screen.options.selected_index();
    for (i, option) in screen.options.items().iter().enumerate() {
        let marker = if Some(i) == focused { style("›").cyan().bold().to_string() } else { " ".to_string() };
        let label = if Some(i) == focused {
            style(option.label.as_str()).cyan().to_string()
        } else {
            option.label.clone()
        };
        out.push_str(&format!("{} {} {}\n", marker, style(format!("[{:>2}]", i + 1)).dim(), label));
    }
    out
}

pub fn render_filters(pipeline: &FilterPipeline) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{}  {} {}\n\n",
        style("Filters").white().bold(),
        style("sort:").dim(),
        pipeline.sort_order(),
    ));
    for spec in pipeline.filters() {
        let value = if spec.is_active() {
            style(spec.value().to_string()).green().to_string()
        } else {
            style("-").dim().to_string()
        };
        out.push_str(&format!(
            "  {} {} {}\n",
            style(format!("{:<12}", spec.name())).cyan(),
            style(format!("{:<10}", spec.kind().label())).dim(),
            value,
        ));
    }
    out
}

/// The filtered report with every finding listed under its artifact.
pub fn render_report(report: &FilterReport) -> String {
    let mut out = String::new();
    let applied = if report.applied.is_empty() {
        "none".to_string()
    } else {
        report.applied.join(", ")
    };
    out.push_str(&format!(
        "\n{}  {} {}  {} {}\n",
        style(format!("Report: {} artifacts", report.count)).white().bold(),
        style("filters:").dim(),
        applied,
        style("sort:").dim(),
        report.sort,
    ));

    let counts = report.severity_counts();
    if !counts.is_empty() {
        let summary: Vec<String> = counts
            .iter()
            .map(|(severity, n)| format!("{} {}", render_severity_badge(severity), n))
            .collect();
        out.push_str(&format!("  {}\n", summary.join("  ")));
    }

    for record in report.artifacts.iter() {
        out.push_str(&render_artifact(record));
    }
    out
}

pub fn render_artifact(record: &ArtifactRecord) -> String {
    let mut out = format!(
        "\n  {} {}\n",
        style(record.name_with_digest()).white().bold(),
        style(format_time(record.push_time)).dim(),
    );
    if !record.tags.is_empty() {
        out.push_str(&format!("    {} {}\n", style("tags:").dim(), record.tags.join(", ")));
    }
    if record.findings.is_empty() {
        out.push_str(&format!("    {}\n", style("No findings.").dim()));
    }
    for finding in &record.findings {
        let fix = finding
            .fix_version
            .as_deref()
            .map(|v| format!(" -> {}", style(v).green()))
            .unwrap_or_default();
        out.push_str(&format!(
            "    {} {} {} {}{}\n",
            render_severity_badge(&finding.severity),
            style(&finding.cve_id).white(),
            style(&finding.package).cyan(),
            style(&finding.version).dim(),
            fix,
        ));
    }
    out
}

pub fn render_projects(projects: &[Project]) -> String {
    let mut out = String::new();
    for project in projects {
        out.push_str(&format!(
            "  {:<30} {:>6} {}\n",
            project.name.as_deref().unwrap_or("?"),
            project.repo_count.map_or("-".to_string(), |n| n.to_string()),
            style(format_time(project.creation_time)).dim(),
        ));
    }
    out
}

pub fn render_repositories(repositories: &[Repository]) -> String {
    let mut out = String::new();
    for repository in repositories {
        out.push_str(&format!(
            "  {:<40} {:>6} {:>8} {}\n",
            repository.name,
            repository.artifact_count.map_or("-".to_string(), |n| n.to_string()),
            repository.pull_count.map_or("-".to_string(), |n| n.to_string()),
            style(format_time(repository.update_time)).dim(),
        ));
    }
    out
}

pub fn render_cache(keys: &[(CacheKey, Option<DateTime<Utc>>)], gateway: &str) -> String {
    let mut out = format!(
        "\n{}  {} {}\n\n",
        style(format!("Cache: {} entries", keys.len())).white().bold(),
        style("gateway:").dim(),
        gateway,
    );
    if keys.is_empty() {
        out.push_str(&format!("  {}\n", style("Empty.").dim()));
    }
    for (key, fetched_at) in keys {
        out.push_str(&format!("  {:<44} {}\n", key.to_string(), style(format_time(*fetched_at)).dim()));
    }
    out
}

pub fn render_log(lines: &[String]) -> String {
    if lines.is_empty() {
        return format!("\n  {}\n", style("No registry calls yet.").dim());
    }
    let mut out = format!("\n{}\n\n", style("Recent calls:").white().bold());
    for line in lines {
        out.push_str(&format!("  {}\n", line));
    }
    out
}

pub fn render_status(navigator: &SessionNavigator) -> String {
    let state = navigator.state();
    let mut out = format!("\n  {} {}\n", style("Session:").dim(), style(state.name()).white().bold());
    match state {
        SessionState::LoggedOut {
            failed_attempts,
            last_error,
        } => {
            if *failed_attempts > 0 {
                out.push_str(&format!("  {} {}\n", style("Failed logins:").dim(), failed_attempts));
            }
            if let Some(error) = last_error {
                out.push_str(&format!("  {} {}\n", style("Last error:").dim(), style(error).red()));
            }
        }
        SessionState::Authenticating { credentials, attempt } => {
            out.push_str(&format!(
                "  {} {}@{} (attempt {})\n",
                style("Login:").dim(),
                credentials.username,
                credentials.url,
                attempt
            ));
        }
        SessionState::Browsing { stack } => {
            let path: Vec<&str> = stack.ids().iter().map(|id| id.as_str()).collect();
            out.push_str(&format!("  {} {}\n", style("Stack:").dim(), path.join(" › ")));
            out.push_str(&format!("  {} {}\n", style("Screens:").dim(), navigator.installed_count()));
            if let Some(gateway) = navigator.gateway_name() {
                out.push_str(&format!(
                    "  {} {} ({} cached)\n",
                    style("Gateway:").dim(),
                    gateway,
                    navigator.cached_keys().len()
                ));
                if let Some(last) = navigator.last_call() {
                    out.push_str(&format!("  {} {}\n", style("Last call:").dim(), last.log_line()));
                }
            }
        }
    }
    out
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}
