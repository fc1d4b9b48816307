use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::mapper::CanonicalField;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LEADFILL_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Config file lookup: explicit path, then `LEADFILL_CONFIG`, then the
/// per-user config directory. Returns `None` when nothing exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("leadfill").join("config.json"))
        .filter(|path| path.exists())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.target.url.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "target.url must not be empty".to_string(),
        });
    }

    if config.job.log_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "job.log_capacity must be at least 1".to_string(),
        });
    }

    if let Some(form) = &config.form {
        for field in CanonicalField::ALL {
            let locators = form.locators_for(field);
            if field.is_required_for_submission() && locators.is_empty() {
                return Err(ConfigError::InvalidLocator {
                    field: field.as_str().to_string(),
                    reason: "required field needs at least one locator".to_string(),
                });
            }
            for locator in locators {
                if let Err(reason) = locator.validate() {
                    return Err(ConfigError::InvalidLocator {
                        field: field.as_str().to_string(),
                        reason,
                    });
                }
            }
        }
        if form.submit.is_empty() {
            return Err(ConfigError::InvalidLocator {
                field: "submit".to_string(),
                reason: "at least one submit locator is required".to_string(),
            });
        }
        for (group, locators) in [
            ("submit", &form.submit),
            ("address_suggestions", &form.address_suggestions),
            ("success_indicators", &form.success_indicators),
            ("error_indicators", &form.error_indicators),
        ] {
            for locator in locators {
                if let Err(reason) = locator.validate() {
                    return Err(ConfigError::InvalidLocator {
                        field: group.to_string(),
                        reason,
                    });
                }
            }
        }
    }

    Ok(())
}
