use clap::Parser;

use harbortui::cli::{self, AppContext, Cli, Commands};
use harbortui::config;
use harbortui::errors::HarborError;
use harbortui::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    match run(cli).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), HarborError> {
    let command = match cli.command {
        // Validation reads only the file it is given.
        Some(Commands::Validate(args)) => return cli::validate::handle_validate(args).await,
        Some(command) => command,
        None => Commands::Browse,
    };

    let config = config::load_config(cli.config.as_deref()).await?;

    // The terminal belongs to the browser, so logs only go to the log file.
    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Logging disabled: {}", e);
    }

    if matches!(command, Commands::ConfigPath) {
        cli::validate::handle_config_path(&config, cli.config.as_deref());
        return Ok(());
    }

    let ctx = AppContext::build(config, cli.snapshot.as_deref()).await?;
    match command {
        Commands::Projects(args) => cli::listing::handle_projects(&ctx, args, cli.quiet).await,
        Commands::Repositories(args) => cli::listing::handle_repositories(&ctx, args, cli.quiet).await,
        Commands::Artifacts(args) => cli::listing::handle_artifacts(&ctx, args, cli.quiet).await,
        Commands::Browse | Commands::Validate(_) | Commands::ConfigPath => cli::browse::handle_browse(ctx).await,
    }
}
