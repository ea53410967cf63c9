use tracing::info;

use crate::cli::context::AppContext;
use crate::config;
use crate::errors::HarborError;
use crate::repl::ReplSession;

/// Interactive session. Starts logging in right away when the config (or
/// a snapshot) supplies credentials, otherwise at the login prompt.
pub async fn handle_browse(ctx: AppContext) -> Result<(), HarborError> {
    config::init_config_dir().await?;
    let stored = ctx.stored_credentials();
    info!(
        snapshot = ctx.is_snapshot(),
        auto_login = stored.is_some(),
        "Starting interactive session"
    );
    let navigator = ctx.navigator();
    ReplSession::new(navigator, ctx.config).run().await
}
