//! `config` command implementation.

use anyhow::{Context, Result};
use contracts::CollectorBlueprint;
use tracing::info;

use crate::cli::ConfigArgs;

/// Execute the `config` command: print the resolved effective configuration
/// with serde defaults applied. Device credentials are masked.
pub fn run_config(args: &ConfigArgs) -> Result<()> {
    info!(config = %args.config.display(), "Resolving configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let masked = mask_credentials(blueprint);

    let rendered = if args.toml {
        config_loader::ConfigLoader::to_toml(&masked)
            .context("Failed to serialize configuration")?
    } else {
        config_loader::ConfigLoader::to_json(&masked)
            .context("Failed to serialize configuration")?
    };
    println!("{rendered}");

    Ok(())
}

fn mask_credentials(mut blueprint: CollectorBlueprint) -> CollectorBlueprint {
    for device in &mut blueprint.devices {
        device.password = "***".into();
    }
    blueprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    const SAMPLE: &str = r#"
[[devices]]
name = "gate-a"
host = "192.168.1.10"
username = "admin"
password = "secret"
"#;

    #[test]
    fn test_mask_credentials() {
        let bp = ConfigLoader::load_from_str(SAMPLE, ConfigFormat::Toml).unwrap();
        let masked = mask_credentials(bp);
        assert_eq!(masked.devices[0].password, "***");
        assert_eq!(masked.devices[0].username, "admin");

        let json = ConfigLoader::to_json(&masked).unwrap();
        assert!(!json.contains("secret"));
    }
}
