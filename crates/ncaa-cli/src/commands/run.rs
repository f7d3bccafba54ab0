use crate::cli::RunArgs;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use ncaaparam::{
    core::building::caps::CapFragments,
    engine::progress::ProgressReporter,
    workflows::parameterize::{self, BatchReport},
};
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;

    let caps = load_caps(&app)?;

    info!("Locating external programs...");
    let (engine, toolchain) = parameterize::locate_tools(&app.core)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Parameterizing {} residue(s) with {}...",
        args.files.len(),
        app.core.method
    );
    info!("Invoking the core parameterization workflow...");

    let report = parameterize::run(
        &args.files,
        &app.core,
        &engine,
        &toolchain,
        &caps,
        &reporter,
    )?;

    print_report(&report);

    if report.is_complete_success() {
        Ok(())
    } else {
        Err(CliError::Batch {
            failed: report.failed.len(),
            total: args.files.len(),
        })
    }
}

fn load_caps(app: &AppConfig) -> Result<CapFragments> {
    let caps = match &app.caps {
        Some(paths) => {
            info!(
                "Loading cap fragments from {:?} and {:?}",
                paths.ace, paths.nme
            );
            CapFragments::load(&paths.ace, &paths.nme)?
        }
        None => CapFragments::builtin()?,
    };
    Ok(caps)
}

fn print_report(report: &BatchReport) {
    for result in &report.succeeded {
        println!(
            "✓ {} ({}): {} and {}",
            result.residue_name,
            result.input.display(),
            result.outcome.parameters.display(),
            result.outcome.template.display()
        );
    }
    for failure in &report.failed {
        warn!("{} failed: {}", failure.input.display(), failure.error);
        println!("✗ {}: {}", failure.input.display(), failure.error);
    }
}
