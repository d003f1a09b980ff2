//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{load_calibration, ConfigLoader, DashcamConfig};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    module_id: String,
    domain_id: u32,
    resolution: String,
    framerate: u32,
    image_topic: String,
    calibration: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(CliError::config_not_found(&config_path).to_string()),
            config_path,
            warnings: None,
            summary: None,
        };
    }

    // Strict load: every key must parse and validate
    match ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    module_id: config.module_id.clone(),
                    domain_id: config.dds.domain_id,
                    resolution: config.camera.resolution.to_string(),
                    framerate: config.camera.framerate,
                    image_topic: config.dds.image_topic.clone(),
                    calibration: config
                        .calibration
                        .auto_load
                        .then(|| config.calibration.file.display().to_string()),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &DashcamConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.calibration.auto_load {
        if let Err(e) = load_calibration(&config.calibration.file) {
            warnings.push(format!(
                "Calibration {} unusable ({e}) - frames will be published uncorrected",
                config.calibration.file.display()
            ));
        }
    }

    if config.dds.domain_id > bus::MAX_DOMAIN_ID {
        warnings.push(format!(
            "dds.domain_id {} exceeds {} - the in-memory bus will refuse it",
            config.dds.domain_id,
            bus::MAX_DOMAIN_ID
        ));
    }

    let frame_interval = Duration::from_secs_f64(config.camera.frame_interval_secs());
    if config.runtime.join_timeout() < frame_interval {
        warnings.push(
            "runtime.join_timeout_ms is shorter than one frame interval - stop() may time out"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Module: {}", summary.module_id);
            println!("  Domain: {}", summary.domain_id);
            println!("  Camera: {} @ {} fps", summary.resolution, summary.framerate);
            println!("  Images: {}", summary.image_topic);
            match summary.calibration {
                Some(ref file) => println!("  Calibration: {}", file),
                None => println!("  Calibration: disabled"),
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
