//! sweepd - command-line front end for the sweep controller.
//!
//! Loads a device catalog, registers the devices, and either inspects the
//! system (`list-devices`, `check`) or executes a sweep (`run`). During a
//! run the document stream is printed as it arrives; Ctrl-C requests a stop
//! and the in-flight step is allowed to finish.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::Deserialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sweep_core::document::Document;
use sweep_engine::{SweepController, SweepEntry, SweepSettings};
use sweep_hardware::catalog::load_catalog;
use sweep_hardware::DeviceRegistry;

#[derive(Parser)]
#[command(name = "sweepd", version, about = "Device attribute sweep controller")]
struct Cli {
    /// Path to the TOML catalog / settings file
    #[arg(short, long, default_value = "config/sweep.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the devices in the catalog with their capabilities
    ListDevices,

    /// Validate a sweep range and print the points it would visit
    Check {
        /// Target device id
        device: String,
        /// Target attribute name
        attribute: String,
        /// First value (inclusive)
        start: f64,
        /// Bound the sweep never reaches (exclusive)
        end: f64,
        /// Increment per step
        step: f64,
    },

    /// Execute a sweep against a catalog device
    Run {
        /// Target device id
        device: String,
        /// Target attribute name
        attribute: String,
        /// First value (inclusive)
        start: f64,
        /// Bound the sweep never reaches (exclusive)
        end: f64,
        /// Increment per step
        step: f64,
    },
}

/// Wrapper for extracting the `[controller]` section of the catalog file.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    controller: SweepSettings,
}

fn load_settings(path: &PathBuf) -> Result<SweepSettings> {
    let file: SettingsFile = Figment::new()
        .merge(Toml::file(path))
        .extract()
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    Ok(file.controller)
}

fn build_registry(path: &PathBuf) -> Result<Arc<DeviceRegistry>> {
    let catalog = load_catalog(path)?;
    let registry = Arc::new(DeviceRegistry::new());
    catalog.register_all(&registry)?;
    Ok(registry)
}

fn print_document(doc: &Document) {
    match doc {
        Document::Start(start) => {
            println!(
                "🚀 Sweep {} started: {}.{} from {} to {} step {} ({} point(s))",
                start.uid,
                start.device,
                start.attribute,
                start.start,
                start.end,
                start.step,
                start.num_points
            );
        }
        Document::Point(point) => {
            println!("  ▸ point {}: {:.6}", point.seq_num, point.value);
        }
        Document::Stop(stop) => match stop.exit_status.as_str() {
            "success" => println!("✅ Sweep complete: {} point(s) applied", stop.num_points),
            "abort" => println!(
                "🛑 Sweep aborted after {} point(s): {}",
                stop.num_points, stop.reason
            ),
            _ => println!(
                "❌ Sweep failed after {} point(s): {}",
                stop.num_points, stop.reason
            ),
        },
    }
}

async fn run_sweep(config: &PathBuf, entry: SweepEntry) -> Result<()> {
    let registry = build_registry(config)?;
    let settings = load_settings(config)?;
    debug!(door = %settings.door, "Controller settings loaded");

    let controller = Arc::new(SweepController::new(registry, settings));

    let mut docs = controller.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(doc) = docs.recv().await {
            let done = matches!(doc, Document::Stop(_));
            print_document(&doc);
            if done {
                break;
            }
        }
    });

    let run_controller = controller.clone();
    let mut run_task = tokio::spawn(async move { run_controller.start(entry).await });

    tokio::select! {
        result = &mut run_task => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("🛑 Stop requested, finishing the in-flight step...");
            controller.stop().await?;
            run_task.await??;
        }
    }

    printer.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListDevices => {
            let registry = build_registry(&cli.config)?;
            println!("📋 {} device(s) registered:", registry.len());
            for info in registry.list_devices() {
                let caps: Vec<String> =
                    info.capabilities.iter().map(|c| c.to_string()).collect();
                println!(
                    "  {} - {} [{}] ({})",
                    info.id,
                    info.name,
                    info.driver_type,
                    caps.join(", ")
                );
            }
        }

        Commands::Check {
            device,
            attribute,
            start,
            end,
            step,
        } => {
            let entry = SweepEntry::new(&device, &attribute, start, end, step);
            entry.validate()?;
            println!(
                "✅ Valid sweep: {}.{} visits {} point(s)",
                device,
                attribute,
                entry.num_points()
            );
            for (i, value) in entry.points().enumerate() {
                println!("  {} -> {:.6}", i, value);
            }
        }

        Commands::Run {
            device,
            attribute,
            start,
            end,
            step,
        } => {
            let entry = SweepEntry::new(&device, &attribute, start, end, step);
            run_sweep(&cli.config, entry).await?;
        }
    }

    Ok(())
}
