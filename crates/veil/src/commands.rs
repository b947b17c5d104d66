use clap::ArgMatches;
use clap_complete::Shell;
use tracing::{error, info, warn};

use veil_core::config::{Config, VeilConfig};
use veil_core::events;
use veil_core::registry::types::{RegistrySettings, StoreBackend};
use veil_core::{Registry, RegistryMode, WindowRecord};

use crate::app::build_cli;

/// Registry status in the shape emitted by `status --json`.
#[derive(serde::Serialize)]
struct StatusOutput {
    backend: &'static str,
    mode: RegistryMode,
    store: String,
    count: u32,
    records: Vec<WindowRecord>,
}

/// Load configuration with warning on errors.
///
/// Falls back to defaults if config loading fails, but notifies the user via
/// stderr plus a structured `cli.config.load_failed` event.
fn load_config_with_warning() -> VeilConfig {
    match VeilConfig::load_hierarchy() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Could not load config: {}. Using defaults.\n\
                 Tip: Check ~/.veil/config.toml and ./.veil/config.toml for syntax errors.",
                e
            );
            warn!(
                event = "cli.config.load_failed",
                error = %e,
                "Config load failed, using defaults"
            );
            VeilConfig::default()
        }
    }
}

/// Resolve the registry settings a subcommand should operate on.
///
/// `--dir` points at a file-backed store in an arbitrary directory and skips
/// the config hierarchy entirely; otherwise the configured store is used.
fn resolve_settings(matches: &ArgMatches) -> RegistrySettings {
    if let Some(dir) = matches.get_one::<String>("dir") {
        return RegistrySettings::file_in_dir(std::path::Path::new(dir));
    }
    let config = Config::new();
    let veil_config = load_config_with_warning();
    RegistrySettings::from_config(&config, &veil_config)
}

fn store_description(settings: &RegistrySettings) -> (&'static str, String) {
    match settings.backend {
        StoreBackend::File => ("file", settings.data_path.display().to_string()),
        StoreBackend::SharedMemory => ("shared-memory", settings.shm_name.clone()),
    }
}

pub fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    match matches.subcommand() {
        Some(("status", sub_matches)) => handle_status_command(sub_matches),
        Some(("reclaim", sub_matches)) => handle_reclaim_command(sub_matches),
        Some(("reset", sub_matches)) => handle_reset_command(sub_matches),
        Some(("completions", sub_matches)) => handle_completions_command(sub_matches),
        _ => {
            error!(event = "cli.unknown_command");
            Err("Unknown command. Use --help to see available commands.".into())
        }
    }
}

fn handle_status_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");
    let settings = resolve_settings(matches);
    let (backend, store) = store_description(&settings);

    info!(event = "cli.status_started", store = %store);

    let registry = Registry::open(&settings);
    if registry.mode() == RegistryMode::Standalone {
        eprintln!("Could not open the shared registry at '{}'", store);
        error!(event = "cli.status_failed", store = %store);
        return Err(format!("Shared registry unavailable at '{}'", store).into());
    }
    events::log_run_started(&registry);

    let mut records = registry.snapshot()?;
    records.sort_by_key(|r| r.window_id);
    let count = records.len() as u32;

    info!(event = "cli.status_completed", count = count);

    if json_output {
        let output = StatusOutput {
            backend,
            mode: registry.mode(),
            store,
            count,
            records,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Registry:  {} ({})", store, backend);
        println!("Mode:      {}", registry.mode());
        println!("Modified:  {} windows", count);
        for record in &records {
            let timestamp = chrono::DateTime::<chrono::Utc>::from_timestamp(
                record.last_modified_at,
                0,
            )
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| record.last_modified_at.to_string());
            println!(
                "  window {:<10} pid {:<8} {}",
                record.window_id, record.process_id, timestamp
            );
        }
    }

    events::log_run_finished(&registry);
    Ok(())
}

fn handle_reclaim_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let settings = resolve_settings(matches);
    let (_, store) = store_description(&settings);

    info!(event = "cli.reclaim_started", store = %store);

    let mut registry = Registry::open(&settings);
    if registry.mode() == RegistryMode::Standalone {
        eprintln!("Could not open the shared registry at '{}'", store);
        error!(event = "cli.reclaim_failed", store = %store);
        return Err(format!("Shared registry unavailable at '{}'", store).into());
    }
    events::log_run_started(&registry);

    match registry.reclaim_now() {
        Ok(removed) => {
            info!(event = "cli.reclaim_completed", removed = removed);
            println!("Reclaimed {} stale records", removed);
            events::log_run_finished(&registry);
            Ok(())
        }
        Err(e) => {
            eprintln!("Reclamation failed: {}", e);
            error!(event = "cli.reclaim_failed", error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_reset_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let settings = resolve_settings(matches);
    let (_, store) = store_description(&settings);

    info!(event = "cli.reset_started", store = %store);

    match Registry::reset(&settings) {
        Ok(()) => {
            info!(event = "cli.reset_completed", store = %store);
            println!("Registry state at '{}' removed", store);
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to reset registry at '{}': {}", store, e);
            error!(event = "cli.reset_failed", store = %store, error = %e);
            events::log_app_error(&e);
            Err(e.into())
        }
    }
}

fn handle_completions_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let shell = matches
        .get_one::<Shell>("shell")
        .ok_or("Shell argument is required")?;

    let mut cmd = build_cli();
    clap_complete::generate(*shell, &mut cmd, "veil", &mut std::io::stdout());

    Ok(())
}
