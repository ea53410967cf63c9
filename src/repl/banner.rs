use console::{style, Term};

const BRAND: u8 = 39; // harbor blue
const BRAND_DIM: u8 = 24;

const TAGLINE: &str = "Harbor registry browser";

/// Print the start-up header with the registry the session talks to.
pub fn show_banner(target: Option<&str>) {
    let term = Term::stdout();
    let (_, term_cols) = term.size();
    let width = (term_cols as usize).clamp(40, 76);

    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("dev");

    println!();
    println!(
        "  {} {}  {}",
        style("harbortui").color256(BRAND).bold(),
        style(format!("v{} ({})", version, git_hash)).dim(),
        style(TAGLINE).white(),
    );
    println!("  {}", style("─".repeat(width - 4)).color256(BRAND_DIM));

    match target {
        Some(url) => println!("  {} {}", style("Registry:").dim(), style(url).white().bold()),
        None => println!(
            "  {} {}",
            style("Not logged in. Use").dim(),
            style("/login").color256(BRAND).bold()
        ),
    }

    let guide: &[(&str, &str)] = &[
        ("/open <n>", "Open a row"),
        ("/back", "Previous screen"),
        ("/filter <name> <value>", "Filter artifacts"),
        ("/help", "List all commands"),
    ];
    println!();
    for (cmd, desc) in guide {
        println!("    {} {}", style(format!("{:<26}", cmd)).color256(BRAND), style(desc).dim());
    }
    println!();
}
