//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::{load_calibration, ConfigLoader, DashcamConfig};
use contracts::{CalibrationRecord, CameraSettings};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    module_id: String,
    bus: BusInfo,
    runtime: RuntimeInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera: Option<CameraSettings>,
    calibration: CalibrationInfo,
}

#[derive(Serialize)]
struct BusInfo {
    backend: String,
    domain_id: u32,
    image_topic: String,
    control_topic: String,
    status_topic: String,
}

#[derive(Serialize)]
struct RuntimeInfo {
    verbosity: String,
    heartbeat_interval_ms: u64,
    status_interval_ms: u64,
    join_timeout_ms: u64,
}

#[derive(Serialize)]
struct CalibrationInfo {
    auto_load: bool,
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<CalibrationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &DashcamConfig, args: &InfoArgs) -> ConfigInfo {
    let (record, error) = if args.calibration {
        match load_calibration(&config.calibration.file) {
            Ok(record) => (Some(record), None),
            Err(e) => (None, Some(e.to_string())),
        }
    } else {
        (None, None)
    };

    ConfigInfo {
        module_id: config.module_id.clone(),
        bus: BusInfo {
            backend: format!("{:?}", config.dds.backend),
            domain_id: config.dds.domain_id,
            image_topic: config.dds.image_topic.clone(),
            control_topic: config.dds.control_topic.clone(),
            status_topic: config.dds.status_topic.clone(),
        },
        runtime: RuntimeInfo {
            verbosity: format!("{:?}", config.runtime.verbosity),
            heartbeat_interval_ms: config.runtime.heartbeat_interval_ms,
            status_interval_ms: config.runtime.status_interval_ms,
            join_timeout_ms: config.runtime.join_timeout_ms,
        },
        camera: args.camera.then(|| config.camera.clone()),
        calibration: CalibrationInfo {
            auto_load: config.calibration.auto_load,
            file: config.calibration.file.display().to_string(),
            record,
            error,
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Dashcam Module Configuration                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Module: {}", info.module_id);

    println!("\n📡 Bus");
    println!("   ├─ Backend: {}", info.bus.backend);
    println!("   ├─ Domain: {}", info.bus.domain_id);
    println!("   ├─ Images: {}", info.bus.image_topic);
    println!("   ├─ Control: {}", info.bus.control_topic);
    println!("   └─ Status: {}", info.bus.status_topic);

    println!("\n⚙️  Runtime");
    println!("   ├─ Verbosity: {}", info.runtime.verbosity);
    println!("   ├─ Heartbeat: {} ms", info.runtime.heartbeat_interval_ms);
    println!("   ├─ Status: {} ms", info.runtime.status_interval_ms);
    println!("   └─ Join timeout: {} ms", info.runtime.join_timeout_ms);

    if let Some(ref camera) = info.camera {
        println!("\n📷 Camera");
        println!("   ├─ Resolution: {}", camera.resolution);
        println!("   ├─ Framerate: {} fps", camera.framerate);
        println!("   ├─ Exposure: {:?}", camera.exposure_mode);
        println!("   ├─ White balance: {:?}", camera.white_balance);
        println!("   ├─ ISO: {}", camera.iso);
        println!(
            "   ├─ Brightness / Contrast / Saturation / Sharpness: {} / {} / {} / {}",
            camera.brightness, camera.contrast, camera.saturation, camera.sharpness
        );
        println!("   ├─ Digital gain: {:.2}", camera.digital_gain);
        println!("   ├─ Rotation: {}°", camera.rotation);
        println!("   └─ Flip: h={} v={}", camera.hflip, camera.vflip);
    }

    println!("\n🎯 Calibration");
    println!(
        "   ├─ Auto load: {}",
        if info.calibration.auto_load { "yes" } else { "no" }
    );
    match (&info.calibration.record, &info.calibration.error) {
        (Some(record), _) => {
            println!("   ├─ File: {}", info.calibration.file);
            let k = &record.camera_matrix;
            println!(
                "   ├─ fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
                k[0][0], k[1][1], k[0][2], k[1][2]
            );
            println!("   ├─ Distortion: {:?}", record.distortion_coeffs);
            println!(
                "   └─ ROI: {}x{} at ({}, {})",
                record.roi.width, record.roi.height, record.roi.x, record.roi.y
            );
        }
        (None, Some(error)) => {
            println!("   ├─ File: {}", info.calibration.file);
            println!("   └─ Unusable: {}", error);
        }
        (None, None) => println!("   └─ File: {}", info.calibration.file),
    }

    println!();
}
