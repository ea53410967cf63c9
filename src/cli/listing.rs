use console::style;
use tracing::info;

use crate::cli::commands::{ArtifactsArgs, ListArgs, RepositoriesArgs};
use crate::cli::context::AppContext;
use crate::errors::HarborError;
use crate::filters::{default_pipeline, FilterPipeline, FilterValue, SortOrder};
use crate::navigation::{ScreenData, ScreenId, SessionNavigator};
use crate::repl::progress::FetchSpinner;
use crate::repl::renderer;

pub async fn handle_projects(ctx: &AppContext, args: ListArgs, quiet: bool) -> Result<(), HarborError> {
    let mut navigator = ctx.login().await?;
    let id = ScreenId::projects();
    let spinner = spinner(quiet || args.json, "Fetching projects");
    navigator.load(&id).await?;
    let Some(ScreenData::Projects(projects)) = loaded(&navigator, &id) else {
        return Err(HarborError::Internal("projects screen holds no projects".into()));
    };
    spinner.finish(&format!("{} projects", projects.len()));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&**projects)?);
    } else {
        print!("{}", renderer::render_projects(projects));
    }
    Ok(())
}

pub async fn handle_repositories(ctx: &AppContext, args: RepositoriesArgs, quiet: bool) -> Result<(), HarborError> {
    let mut navigator = ctx.login().await?;
    let id = ScreenId::project(&args.project);
    navigator.push(&id)?;
    let spinner = spinner(quiet || args.json, format!("Fetching repositories of {}", args.project));
    navigator.load(&id).await?;
    let Some(ScreenData::Repositories(repositories)) = loaded(&navigator, &id) else {
        return Err(HarborError::Internal("project screen holds no repositories".into()));
    };
    spinner.finish(&format!("{} repositories", repositories.len()));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&**repositories)?);
    } else {
        print!("{}", renderer::render_repositories(repositories));
    }
    Ok(())
}

pub async fn handle_artifacts(ctx: &AppContext, args: ArtifactsArgs, quiet: bool) -> Result<(), HarborError> {
    // Reject bad filter arguments before touching the network.
    let pipeline = artifact_pipeline(&args)?;

    let mut navigator = ctx.login().await?;
    let id = ScreenId::repository(&args.repository);
    navigator.push(&id)?;
    navigator.set_pipeline(pipeline).await?;
    let spinner = spinner(quiet || args.json, format!("Fetching artifacts of {}", args.repository));
    navigator.load(&id).await?;
    let Some(ScreenData::Artifacts(artifacts)) = loaded(&navigator, &id) else {
        return Err(HarborError::Internal("repository screen holds no artifacts".into()));
    };
    spinner.finish(&format!("{} artifacts", artifacts.len()));
    let report = navigator.report()?;

    info!(
        repository = %args.repository,
        matched = report.count,
        filters = report.applied.len(),
        "Artifact report ready"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if report.count == 0 {
        println!("  {}", style("No artifacts match.").dim());
    } else {
        print!("{}", renderer::render_report(report));
    }
    Ok(())
}

fn loaded<'a>(navigator: &'a SessionNavigator, id: &ScreenId) -> Option<&'a ScreenData> {
    navigator.screen(id).and_then(|screen| screen.data.as_ref())
}

/// The default artifact filters with the command-line values applied.
fn artifact_pipeline(args: &ArtifactsArgs) -> Result<FilterPipeline, HarborError> {
    let mut pipeline = default_pipeline();
    let text_filters = [
        ("CVE", &args.cve),
        ("Package", &args.package),
        ("Description", &args.description),
    ];
    for (name, value) in text_filters {
        if let Some(value) = value {
            pipeline.set_value(name, FilterValue::Text(value.clone()))?;
        }
    }
    if let Some(raw) = &args.severity {
        let value = pipeline
            .get("Severity")
            .ok_or_else(|| HarborError::Internal("severity filter missing".into()))?
            .parse_value(raw)?;
        pipeline.set_value("Severity", value)?;
    }
    if args.fixable {
        pipeline.set_value("Fixable", FilterValue::Switch(true))?;
    }
    pipeline.set_sort(args.sort.parse::<SortOrder>()?);
    Ok(pipeline)
}

fn spinner(hidden: bool, message: impl Into<String>) -> FetchSpinner {
    if hidden {
        FetchSpinner::hidden()
    } else {
        FetchSpinner::start(message)
    }
}
