use crate::gateway::Operation;

/// All slash commands supported by the REPL.
#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    Login {
        url: Option<String>,
        username: Option<String>,
    },
    Logout,
    /// Row number (1-based) on the current screen, or a screen id.
    Open {
        target: OpenTarget,
    },
    Back,
    Next,
    Prev,
    Enter,
    Refresh,
    Filter {
        name: String,
        value: String,
    },
    Filters,
    Unfilter {
        name: Option<String>,
    },
    Sort {
        order: String,
    },
    Report,
    Cache {
        action: CacheAction,
    },
    Log,
    Status,
    Version,
    Clear,
    Help {
        command: Option<String>,
    },
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenTarget {
    Row(usize),
    Screen(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheAction {
    Show,
    Clear { operation: Option<Operation> },
}

/// Description of a command for help display.
pub struct CommandHelp {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

pub static COMMAND_HELP: &[CommandHelp] = &[
    CommandHelp {
        name: "login",
        usage: "/login [url] [username]",
        description: "Log in to a Harbor registry. Missing fields, including the secret, are prompted for.",
    },
    CommandHelp {
        name: "logout",
        usage: "/logout",
        description: "Log out and drop all cached data",
    },
    CommandHelp {
        name: "open",
        usage: "/open <row|screen-id>",
        description: "Open a row of the current screen, or a screen such as project:library or repository:library/nginx",
    },
    CommandHelp {
        name: "back",
        usage: "/back",
        description: "Return to the previous screen",
    },
    CommandHelp {
        name: "next",
        usage: "/next",
        description: "Move focus to the next row (wraps)",
    },
    CommandHelp {
        name: "prev",
        usage: "/prev",
        description: "Move focus to the previous row (wraps)",
    },
    CommandHelp {
        name: "enter",
        usage: "/enter",
        description: "Open the focused row",
    },
    CommandHelp {
        name: "refresh",
        usage: "/refresh",
        description: "Refetch the current screen, bypassing the cache",
    },
    CommandHelp {
        name: "filter",
        usage: "/filter <name> <value>",
        description: "Set a filter on the artifact screen, e.g. /filter severity high,critical or /filter fixable on",
    },
    CommandHelp {
        name: "filters",
        usage: "/filters",
        description: "List the filters of the artifact screen and their values",
    },
    CommandHelp {
        name: "unfilter",
        usage: "/unfilter [name]",
        description: "Reset one filter, or all of them",
    },
    CommandHelp {
        name: "sort",
        usage: "/sort none|severity|date|name",
        description: "Order the artifact report",
    },
    CommandHelp {
        name: "report",
        usage: "/report",
        description: "Show the filtered artifact report with findings",
    },
    CommandHelp {
        name: "cache",
        usage: "/cache [clear [projects|repositories|artifacts]]",
        description: "List cached keys, or clear the cache",
    },
    CommandHelp {
        name: "log",
        usage: "/log",
        description: "Show recent registry calls",
    },
    CommandHelp {
        name: "status",
        usage: "/status",
        description: "Show session state and the navigation stack",
    },
    CommandHelp {
        name: "version",
        usage: "/version",
        description: "Show version and build info",
    },
    CommandHelp {
        name: "clear",
        usage: "/clear",
        description: "Clear the terminal screen",
    },
    CommandHelp {
        name: "help",
        usage: "/help [command]",
        description: "Show help for all or a specific command",
    },
    CommandHelp {
        name: "exit",
        usage: "/exit",
        description: "Quit",
    },
];

/// All command names for tab completion.
pub static COMMAND_NAMES: &[&str] = &[
    "/login",
    "/logout",
    "/open",
    "/back",
    "/next",
    "/prev",
    "/enter",
    "/refresh",
    "/filter",
    "/filters",
    "/unfilter",
    "/sort",
    "/report",
    "/cache",
    "/log",
    "/status",
    "/version",
    "/clear",
    "/help",
    "/exit",
];

/// Parse a raw input line into a SlashCommand, or return an error message.
/// A bare number opens that row.
pub fn parse_command(input: &str) -> Result<SlashCommand, String> {
    let input = input.trim();
    if input.parse::<usize>().is_ok() {
        return parse_open(&[input]);
    }
    if !input.starts_with('/') {
        return Err("Commands must start with /. Type /help for available commands.".into());
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.is_empty() {
        return Err("Empty command".into());
    }

    let cmd = parts[0];
    let args = &parts[1..];

    match cmd {
        "/login" => Ok(SlashCommand::Login {
            url: args.first().map(|s| s.to_string()),
            username: args.get(1).map(|s| s.to_string()),
        }),
        "/logout" => Ok(SlashCommand::Logout),
        "/open" | "/o" => parse_open(args),
        "/back" | "/b" => Ok(SlashCommand::Back),
        "/next" | "/n" => Ok(SlashCommand::Next),
        "/prev" | "/p" => Ok(SlashCommand::Prev),
        "/enter" | "/e" => Ok(SlashCommand::Enter),
        "/refresh" | "/r" => Ok(SlashCommand::Refresh),
        "/filter" => parse_filter(args),
        "/filters" => Ok(SlashCommand::Filters),
        "/unfilter" => Ok(SlashCommand::Unfilter {
            name: args.first().map(|s| s.to_string()),
        }),
        "/sort" => match args.first() {
            Some(order) => Ok(SlashCommand::Sort {
                order: order.to_string(),
            }),
            None => Err("Usage: /sort none|severity|date|name".into()),
        },
        "/report" => Ok(SlashCommand::Report),
        "/cache" => parse_cache(args),
        "/log" => Ok(SlashCommand::Log),
        "/status" => Ok(SlashCommand::Status),
        "/version" => Ok(SlashCommand::Version),
        "/clear" => Ok(SlashCommand::Clear),
        "/help" => Ok(SlashCommand::Help {
            command: args.first().map(|s| s.trim_start_matches('/').to_string()),
        }),
        "/exit" | "/quit" | "/q" => Ok(SlashCommand::Exit),
        other => Err(format!("Unknown command: {}. Type /help for available commands.", other)),
    }
}

fn parse_open(args: &[&str]) -> Result<SlashCommand, String> {
    let Some(arg) = args.first() else {
        return Err("Usage: /open <row|screen-id>".into());
    };
    let target = match arg.parse::<usize>() {
        Ok(0) => return Err("Rows are numbered from 1".into()),
        Ok(row) => OpenTarget::Row(row),
        Err(_) => OpenTarget::Screen(arg.to_string()),
    };
    Ok(SlashCommand::Open { target })
}

fn parse_filter(args: &[&str]) -> Result<SlashCommand, String> {
    match args {
        [] => Err("Usage: /filter <name> <value>".into()),
        [name, value @ ..] => Ok(SlashCommand::Filter {
            name: name.to_string(),
            value: value.join(" "),
        }),
    }
}

fn parse_cache(args: &[&str]) -> Result<SlashCommand, String> {
    match args {
        [] => Ok(SlashCommand::Cache {
            action: CacheAction::Show,
        }),
        ["clear"] => Ok(SlashCommand::Cache {
            action: CacheAction::Clear { operation: None },
        }),
        ["clear", op] => {
            let operation = op.parse::<Operation>().map_err(|e| e.to_string())?;
            Ok(SlashCommand::Cache {
                action: CacheAction::Clear {
                    operation: Some(operation),
                },
            })
        }
        _ => Err("Usage: /cache [clear [projects|repositories|artifacts]]".into()),
    }
}
