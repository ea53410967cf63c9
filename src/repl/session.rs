use console::{style, Term};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing::{info, warn};

use crate::config::{paths, Credentials, HarborTuiConfig};
use crate::errors::HarborError;
use crate::filters::SortOrder;
use crate::navigation::{FetchTicket, ScreenId, ScreenKind, SessionNavigator, SessionState};
use crate::repl::banner;
use crate::repl::commands::{self, CacheAction, OpenTarget, SlashCommand};
use crate::repl::completer::ReplHelper;
use crate::repl::progress::FetchSpinner;
use crate::repl::renderer;

type ReplEditor = Editor<ReplHelper, DefaultHistory>;

/// Interactive front end over a [`SessionNavigator`].
pub struct ReplSession {
    navigator: SessionNavigator,
    config: HarborTuiConfig,
}

impl ReplSession {
    pub fn new(navigator: SessionNavigator, config: HarborTuiConfig) -> Self {
        Self { navigator, config }
    }

    pub async fn run(mut self) -> Result<(), HarborError> {
        let target = match self.navigator.state() {
            SessionState::Authenticating { credentials, .. } => Some(credentials.url.clone()),
            _ => None,
        };
        banner::show_banner(target.as_deref());

        let config = Config::builder()
            .max_history_size(self.config.session.history_size)
            .map_err(|e| HarborError::Internal(format!("Invalid history size: {}", e)))?
            .auto_add_history(true)
            .build();
        let mut editor: ReplEditor = Editor::with_config(config)
            .map_err(|e| HarborError::Internal(format!("Failed to initialize REPL: {}", e)))?;
        editor.set_helper(Some(ReplHelper::default()));
        let history = paths::history_file();
        if editor.load_history(&history).is_err() {
            info!(path = %history.display(), "No REPL history yet");
        }

        if matches!(self.navigator.state(), SessionState::Authenticating { .. }) {
            self.finish_login().await;
        }

        loop {
            let readline = {
                let prompt = self.prompt();
                // rustyline is blocking, so use spawn_blocking
                let result = tokio::task::spawn_blocking(move || {
                    let result = editor.readline(&prompt);
                    (editor, result)
                })
                .await
                .map_err(|e| HarborError::Internal(format!("Readline task failed: {}", e)))?;

                editor = result.0;
                result.1
            };

            match readline {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match commands::parse_command(trimmed) {
                        Ok(cmd) => match self.handle_command(cmd).await {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(e) => report_error(&e),
                        },
                        Err(msg) => println!("{}", renderer::render_error(&msg)),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    println!("{}", renderer::render_error(&format!("Input error: {}", err)));
                    break;
                }
            }
        }

        if let Err(e) = editor.save_history(&history) {
            warn!(error = %e, "Failed to save REPL history");
        }
        println!("{}", renderer::render_info("Goodbye."));
        Ok(())
    }

    fn prompt(&self) -> String {
        let location = match self.navigator.current() {
            Some(screen) => screen.id.to_string(),
            None => self.navigator.state().name().replace(' ', "-"),
        };
        format!("{} {} ", style(location).dim(), style("harbor>").cyan().bold())
    }

    /// Returns true when the REPL should exit.
    async fn handle_command(&mut self, cmd: SlashCommand) -> Result<bool, HarborError> {
        match cmd {
            SlashCommand::Exit => return Ok(true),

            SlashCommand::Clear => {
                let _ = Term::stdout().clear_screen();
            }

            SlashCommand::Help { command } => {
                println!("{}", renderer::render_help(command.as_deref()));
            }

            SlashCommand::Version => {
                println!("{}", renderer::render_version());
            }

            SlashCommand::Status => {
                println!("{}", renderer::render_status(&self.navigator));
            }

            SlashCommand::Login { url, username } => {
                if self.navigator.is_browsing() {
                    println!("{}", renderer::render_info("Already logged in. Use /logout first."));
                    return Ok(false);
                }
                let credentials = self.prompt_credentials(url, username).await?;
                self.navigator.submit_credentials(credentials)?;
                self.finish_login().await;
            }

            SlashCommand::Logout => {
                self.navigator.logout();
                println!("{}", renderer::render_success("Logged out."));
            }

            SlashCommand::Open { target } => match target {
                OpenTarget::Row(row) => {
                    if self.navigator.select(row - 1)?.is_none() {
                        return Err(HarborError::Navigation(format!("There is no row {}", row)));
                    }
                    self.enter(row - 1).await?;
                }
                OpenTarget::Screen(id) => {
                    self.navigator.push(&ScreenId::new(id))?;
                    self.show_current().await;
                }
            },

            SlashCommand::Enter => {
                let index = self
                    .navigator
                    .current()
                    .and_then(|s| s.options.selected_index())
                    .ok_or_else(|| HarborError::Navigation("Nothing is focused".into()))?;
                self.enter(index).await?;
            }

            SlashCommand::Back => {
                if self.navigator.pop().is_none() {
                    println!("{}", renderer::render_info("Already at the top screen."));
                }
                self.show_current().await;
            }

            SlashCommand::Next => {
                self.navigator.select_next()?;
                self.print_current();
            }

            SlashCommand::Prev => {
                self.navigator.select_prev()?;
                self.print_current();
            }

            SlashCommand::Refresh => {
                let id = self.current_id()?;
                let ticket = self.navigator.refresh(&id)?;
                self.fetch(ticket).await;
                self.print_current();
            }

            SlashCommand::Filter { name, value } => {
                let parsed = self
                    .navigator
                    .current()
                    .and_then(|s| s.pipeline.as_ref())
                    .ok_or_else(|| HarborError::Navigation("This screen has no filters".into()))?
                    .get(&name)
                    .ok_or_else(|| HarborError::Validation(format!("No filter named '{}'", name)))?
                    .parse_value(&value)?;
                self.navigator.set_filter(&name, parsed).await?;
                self.print_current();
            }

            SlashCommand::Filters => {
                let pipeline = self
                    .navigator
                    .current()
                    .and_then(|s| s.pipeline.as_ref())
                    .ok_or_else(|| HarborError::Navigation("This screen has no filters".into()))?;
                println!("{}", renderer::render_filters(pipeline));
            }

            SlashCommand::Unfilter { name } => {
                self.navigator.clear_filters(name.as_deref()).await?;
                self.print_current();
            }

            SlashCommand::Sort { order } => {
                let order: SortOrder = order.parse()?;
                self.navigator.set_sort(order).await?;
                self.print_current();
            }

            SlashCommand::Report => {
                let report = self.navigator.report()?;
                println!("{}", renderer::render_report(report));
            }

            SlashCommand::Cache { action } => {
                let gateway = self
                    .navigator
                    .gateway_name()
                    .ok_or_else(|| HarborError::Navigation("Not logged in".into()))?;
                match action {
                    CacheAction::Show => {
                        let keys = self.navigator.cached_keys();
                        println!("{}", renderer::render_cache(&keys, gateway));
                    }
                    CacheAction::Clear { operation } => {
                        self.navigator.invalidate_cache(operation)?;
                        let what = operation.map_or("everything".to_string(), |op| op.to_string());
                        println!("{}", renderer::render_success(&format!("Cache cleared: {}", what)));
                    }
                }
            }

            SlashCommand::Log => {
                println!("{}", renderer::render_log(&self.navigator.call_log()));
            }
        }
        Ok(false)
    }

    /// Opens row `index` of the current screen. Artifact rows show the
    /// artifact's findings instead.
    async fn enter(&mut self, index: usize) -> Result<(), HarborError> {
        let is_artifacts = matches!(
            self.navigator.current().map(|s| &s.kind),
            Some(ScreenKind::ArtifactList { .. })
        );
        if is_artifacts {
            let report = self.navigator.report()?;
            if let Some(record) = report.artifacts.records().get(index) {
                println!("{}", renderer::render_artifact(record));
            }
            return Ok(());
        }
        if self.navigator.activate_selected()?.is_some() {
            self.show_current().await;
        }
        Ok(())
    }

    fn current_id(&self) -> Result<ScreenId, HarborError> {
        self.navigator
            .current()
            .map(|s| s.id.clone())
            .ok_or_else(|| HarborError::Navigation("Not logged in".into()))
    }

    async fn prompt_credentials(
        &self,
        url: Option<String>,
        username: Option<String>,
    ) -> Result<Credentials, HarborError> {
        let default_url = self.config.harbor.url.clone();
        let default_user = self.config.harbor.username.clone().unwrap_or_default();
        tokio::task::spawn_blocking(move || -> Result<Credentials, HarborError> {
            let term = Term::stdout();
            let url = match url {
                Some(url) => url,
                None => ask(&term, "URL", &default_url)?,
            };
            let username = match username {
                Some(username) => username,
                None => ask(&term, "Username", &default_user)?,
            };
            term.write_str(&format!("  {} ", style("Secret:").dim()))?;
            let secret = term.read_secure_line()?;
            Ok(Credentials::new(&url, username, secret))
        })
        .await
        .map_err(|e| HarborError::Internal(format!("Login prompt failed: {}", e)))?
    }

    /// Runs the pending authentication. Failures leave the session logged
    /// out; the user retries with /login.
    async fn finish_login(&mut self) {
        let spinner = FetchSpinner::start("Logging in...");
        match self.navigator.authenticate().await {
            Ok(()) => {
                spinner.finish("Logged in");
                self.show_current().await;
            }
            Err(e) => {
                spinner.fail();
                report_error(&e);
            }
        }
    }

    /// Loads the current screen if it has never been loaded, then prints it.
    async fn show_current(&mut self) {
        if let Some(id) = self.navigator.current().map(|s| s.id.clone()) {
            if self.navigator.needs_load(&id) {
                match self.navigator.begin_fetch(&id) {
                    Ok(ticket) => self.fetch(ticket).await,
                    Err(e) => report_error(&e),
                }
            }
        }
        self.print_current();
    }

    async fn fetch(&mut self, ticket: FetchTicket) {
        let spinner = FetchSpinner::start(format!("Fetching {}", ticket.key()));
        let outcome = ticket.run().await;
        match self.navigator.complete_fetch(outcome).await {
            Ok(true) => spinner.finish("Loaded"),
            Ok(false) => spinner.fail(),
            Err(e) => {
                spinner.fail();
                report_error(&e);
            }
        }
    }

    fn print_current(&self) {
        if let Some(screen) = self.navigator.current() {
            println!("{}", renderer::render_screen(screen));
        }
    }
}

fn ask(term: &Term, label: &str, default: &str) -> Result<String, HarborError> {
    if default.is_empty() {
        term.write_str(&format!("  {} ", style(format!("{}:", label)).dim()))?;
    } else {
        term.write_str(&format!("  {} [{}] ", style(format!("{}:", label)).dim(), default))?;
    }
    let answer = term.read_line()?;
    Ok(if answer.trim().is_empty() {
        default.to_string()
    } else {
        answer.trim().to_string()
    })
}

/// Recoverable errors are transient notices; the session continues either way.
fn report_error(error: &HarborError) {
    let classification = error.classify();
    if classification.recoverable {
        println!("{}", renderer::render_warning(&error.to_string()));
    } else {
        warn!(error_type = classification.error_type, error = %error, "Command failed");
        println!("{}", renderer::render_error(&error.to_string()));
    }
}
