//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

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
    version: String,
    device_count: usize,
    sink_count: usize,
    page_size: u32,
    poll_window_minutes: i64,
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
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    device_count: blueprint.devices.len(),
                    sink_count: blueprint.sinks.len(),
                    page_size: blueprint.fetch.page_size,
                    poll_window_minutes: blueprint.fetch.poll_window_minutes,
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
fn collect_warnings(blueprint: &contracts::CollectorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - accepted events will be dropped".to_string());
    }

    for device in &blueprint.devices {
        let id = device.device_id();

        // only_success can never pass without a success-code table
        if blueprint.only_success(device) && blueprint.success_minor_codes(device).is_none() {
            warnings.push(format!(
                "Device '{id}': only_success is set but no success_minor_codes table \
                 is configured - every event will be rejected"
            ));
        }

        // an UNKNOWN allow-list entry is inert without the opt-in flag
        let lists_unknown = blueprint
            .allowed_directions(device)
            .is_some_and(|l| l.iter().any(|d| d.eq_ignore_ascii_case("UNKNOWN")));
        if lists_unknown && !blueprint.include_unknown_direction(device) {
            warnings.push(format!(
                "Device '{id}': allow-list contains UNKNOWN but \
                 include_unknown_direction is false - UNKNOWN events stay rejected"
            ));
        }

        if blueprint.reader_direction(device).is_none() {
            warnings.push(format!(
                "Device '{id}': no reader_direction table - every direction resolves \
                 to UNKNOWN"
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Devices: {}", summary.device_count);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Page size: {}", summary.page_size);
            println!("  Poll window: {} min", summary.poll_window_minutes);
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
