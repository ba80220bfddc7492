use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use browser::{ChromeSession, PageSession};
use collector::{CollectionRun, Profile, Termination};
use exporter::{export_filename, ExportFormat, Exporter};

mod cli;
mod progress;
mod shutdown;

use cli::{Cli, CollectArgs, Commands};
use progress::CollectProgress;
use shutdown::InterruptSignal;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Collect(args) => collect(args, cli.quiet).await,
        Commands::List { output } => {
            let exports = list_exports(&output)?;
            if exports.is_empty() {
                info!("No exports found in {}", output.display());
            }
            for path in exports {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

async fn collect(args: CollectArgs, quiet: bool) -> Result<()> {
    let profile = Profile::parse(&args.url)?;
    let config = args.to_config();
    let target = config.target;
    info!(
        "Collecting videos from @{} (target: {})",
        profile.handle(),
        target.map_or_else(|| "all".to_string(), |t| t.to_string())
    );

    let format = ExportFormat::from(args.format);
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {}", args.output.display()))?;
    let export_path = args.output.join(export_filename(
        profile.handle(),
        chrono::Local::now().date_naive(),
        format,
    ));
    let exporter = Exporter::new();

    let session = match ChromeSession::launch(&args.launch_settings()) {
        Ok(session) => session,
        Err(e) => {
            error!("Could not open a browser session: {}", e);
            exporter.export(&[], &export_path, format)?;
            warn!("Wrote empty export to {}", export_path.display());
            return Err(e.into());
        }
    };

    let interrupt = InterruptSignal::install()?;
    let run = CollectionRun::new(&session, profile, config);
    let progress = CollectProgress::new(target, !quiet);
    let tracker = progress.track(run.progress());

    let report = run.run(interrupt.triggered()).await;
    tracker.abort();
    session.close()?;

    let summary = match &report.termination {
        Termination::TargetReached => "target reached",
        Termination::PageExhausted => "profile fully loaded",
        Termination::BudgetExhausted => "scroll limit reached",
        Termination::Interrupted => "interrupted",
        Termination::Failed(_) => "failed",
    };
    progress.finish(report.records.len(), summary);
    if let Some(scroll) = &report.scroll {
        info!("Scrolled {} times", scroll.iterations);
        if scroll.failed_gestures > 0 {
            warn!("{} scroll gestures failed", scroll.failed_gestures);
        }
    }

    exporter
        .export(&report.records, &export_path, format)
        .with_context(|| format!("Failed to write {}", export_path.display()))?;
    info!(
        "Exported {} videos to {} ({})",
        report.records.len(),
        export_path.display(),
        summary
    );

    match report.termination {
        Termination::Failed(e) => Err(e.into()),
        _ => Ok(()),
    }
}

/// Export files in `dir`, sorted by name.
fn list_exports(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut exports = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_export = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains("_videos_"))
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ExportFormat::from_extension(ext).is_ok());
        if is_export && path.is_file() {
            exports.push(path);
        }
    }
    exports.sort();
    Ok(exports)
}
