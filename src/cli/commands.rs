use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "harbortui", version, about = "Terminal browser for Harbor container registries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// YAML configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Browse a saved registry snapshot (JSON) instead of a live registry
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive browser (default)
    Browse,
    /// List projects
    Projects(ListArgs),
    /// List the repositories of a project
    Repositories(RepositoriesArgs),
    /// List the artifacts of a repository with their findings
    Artifacts(ArtifactsArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
    /// Show where the configuration is read from and what it contains
    ConfigPath,
}

#[derive(Args, Clone)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct RepositoriesArgs {
    /// Project name
    pub project: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ArtifactsArgs {
    /// Full repository name, e.g. library/nginx
    pub repository: String,

    /// Keep artifacts with a CVE id starting with this text
    #[arg(long)]
    pub cve: Option<String>,

    /// Keep artifacts with an affected package starting with this text
    #[arg(long)]
    pub package: Option<String>,

    /// Keep artifacts with a finding description containing this text
    #[arg(long)]
    pub description: Option<String>,

    /// Severities to keep, comma separated (e.g. critical,high)
    #[arg(long)]
    pub severity: Option<String>,

    /// Only artifacts with at least one fixable finding
    #[arg(long)]
    pub fixable: bool,

    /// Sort order: none, severity, date, name
    #[arg(long, default_value = "none")]
    pub sort: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: PathBuf,
}
