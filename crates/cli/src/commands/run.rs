//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::{apply_overrides, ConfigLoader, DashcamConfig, KeyValueFileStore};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{CaptureRunner, RunnerConfig};

/// Execute the `run` command
pub async fn run_capture(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let config = resolve_config(args)?;

    info!(
        module_id = %config.module_id,
        domain_id = config.dds.domain_id,
        backend = ?config.dds.backend,
        resolution = %config.camera.resolution,
        framerate = config.camera.framerate,
        image_topic = %config.dds.image_topic,
        "Configuration resolved"
    );

    // Dry run - just resolve and exit
    if args.dry_run {
        info!("Dry run mode - configuration resolved, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let runner = CaptureRunner::new(RunnerConfig {
        config,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let stats = runner.run(setup_shutdown_signal()).await?;
    info!(
        frames_published = stats.capture.last.frames_published,
        duration_secs = stats.duration.as_secs_f64(),
        "Capture finished"
    );
    stats.print_summary();

    Ok(())
}

/// Lenient file load, then settings store, then command-line overrides
fn resolve_config(args: &RunArgs) -> Result<DashcamConfig> {
    let load = ConfigLoader::load_lenient(&args.config);
    let mut config = load.config;
    if !load.warnings.is_empty() {
        warn!(count = load.warnings.len(), "Configuration loaded with fallbacks");
    }

    if let Some(ref path) = args.settings {
        let store = KeyValueFileStore::new(path);
        apply_overrides(&mut config, &store);
        info!(settings = %path.display(), "Applied stored settings");
    }

    if let Some(ref module_id) = args.module_id {
        info!(module_id = %module_id, "Overriding module id from CLI");
        config.module_id = module_id.clone();
    }
    if let Some(domain_id) = args.domain_id {
        info!(domain_id, "Overriding bus domain from CLI");
        config.dds.domain_id = domain_id;
    }

    ConfigLoader::validate(&config).context("Configuration is invalid after overrides")?;
    Ok(config)
}

/// Ctrl+C or SIGTERM
///
/// If a handler cannot be installed the run continues without it.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &DashcamConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Module: {}", config.module_id);
    println!("\nCamera:");
    println!("  Resolution: {}", config.camera.resolution);
    println!("  Framerate: {} fps", config.camera.framerate);
    println!("  Exposure: {:?}", config.camera.exposure_mode);
    println!("  White balance: {:?}", config.camera.white_balance);
    println!("\nBus:");
    println!("  Domain: {} ({:?})", config.dds.domain_id, config.dds.backend);
    println!("  Images: {}", config.dds.image_topic);
    println!("  Control: {}", config.dds.control_topic);
    println!("  Status: {}", config.dds.status_topic);
    println!("\nCalibration:");
    if config.calibration.auto_load {
        println!("  File: {}", config.calibration.file.display());
    } else {
        println!("  Disabled");
    }
    println!();
}
