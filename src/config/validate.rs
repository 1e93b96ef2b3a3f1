// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{NerfpipeError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::NerfpipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.tools))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_tools(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    // admission / default_strategy are strongly typed and validated during
    // deserialization.

    if cfg.config.queue_length == 0 {
        return Err(NerfpipeError::ConfigError(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.tasks_dir.trim().is_empty() {
        return Err(NerfpipeError::ConfigError(
            "[config].tasks_dir must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_tools(cfg: &RawConfigFile) -> Result<()> {
    let tools = [
        ("python", &cfg.tools.python),
        ("colmap_script", &cfg.tools.colmap_script),
        ("ns_train", &cfg.tools.ns_train),
        ("ns_render", &cfg.tools.ns_render),
    ];

    for (key, value) in tools {
        if value.trim().is_empty() {
            return Err(NerfpipeError::ConfigError(format!(
                "[tools].{key} must not be empty"
            )));
        }
    }

    Ok(())
}
