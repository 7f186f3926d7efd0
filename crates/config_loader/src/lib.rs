//! # Config Loader
//!
//! Loads, parses, and validates the collector configuration, producing a
//! ready-to-use `CollectorBlueprint`. TOML is the primary format; JSON is
//! accepted for generated configs.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Devices: {}", blueprint.devices.len());
//! ```

mod parser;
mod validator;

pub use contracts::CollectorBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Static entry points for loading a blueprint from a file or a string.
/// Parsing and validation always run together; an unvalidated blueprint
/// never leaves this crate.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path, inferring the format from the
    /// extension (.toml / .json)
    ///
    /// # Errors
    /// File read failure, unsupported extension, parse or validation failure.
    pub fn load_from_path(path: &Path) -> Result<CollectorBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from an in-memory string
    ///
    /// # Errors
    /// Parse or validation failure.
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CollectorBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Serialize a blueprint back to TOML
    pub fn to_toml(blueprint: &CollectorBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a blueprint back to JSON
    pub fn to_json(blueprint: &CollectorBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Infer the configuration format from the file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
