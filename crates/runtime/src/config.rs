//! Configuration: a single INI pass that produces one typed
//! [`RuntimeConfig`], handed out to services one section at a time. The
//! original reads overlapping passes of the same file in `bootstrap.cpp`
//! and again inside each service's own `*_cfg_handler`; this runtime parses
//! it once and distributes the result instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ini::Ini;

use crate::error::ConfigError;
use crate::services::ServiceSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Default)]
pub struct RuntimeConfig {
    pub log_level: Option<LogLevel>,
    pub enabled_services: Vec<String>,
    pub sections: HashMap<String, ServiceSection>,
}

/// Resolves the config file path from `OPLC_CONFIG`, defaulting to
/// `config.ini` in the current directory.
pub fn config_path() -> PathBuf {
    std::env::var_os("OPLC_CONFIG").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("config.ini"))
}

/// Parses the config file once. `known_services` gates which `enabled = true`
/// sections are honored; an enabled section naming an unregistered service
/// is logged and skipped rather than failing the whole parse.
pub fn parse(path: &Path, known_services: &[&str]) -> Result<RuntimeConfig, ConfigError> {
    let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

    let mut config = RuntimeConfig::default();

    for (section_name, props) in ini.iter() {
        let Some(section_name) = section_name else {
            continue;
        };

        if section_name == "logging" {
            if let Some(level) = props.get("level") {
                match LogLevel::parse(level) {
                    Some(parsed) => config.log_level = Some(parsed),
                    None => tracing::warn!(level, "unknown logging level in config, ignoring"),
                }
            }
            continue;
        }

        let mut section = ServiceSection::new();
        let mut enabled = false;
        for (key, value) in props.iter() {
            if key == "enabled" {
                enabled = value.eq_ignore_ascii_case("true");
            }
            section.insert(key.to_string(), value.to_string());
        }

        if enabled {
            if known_services.contains(&section_name) {
                config.enabled_services.push(section_name.to_string());
            } else {
                tracing::warn!(section = section_name, "enabled section does not name a registered service, skipping");
            }
        }

        config.sections.insert(section_name.to_string(), section);
    }

    Ok(config)
}

/// Loads the config, falling back to the original's defaults
/// (`interactive` and `modbusmaster` enabled) if the file is missing or
/// unreadable.
pub fn load(path: &Path, known_services: &[&str]) -> RuntimeConfig {
    match parse(path, known_services) {
        Ok(config) => config,
        Err(e) => {
            tracing::info!(error = %e, "config file could not be read, falling back to default services");
            RuntimeConfig {
                log_level: None,
                enabled_services: vec!["interactive".to_string(), "modbusmaster".to_string()],
                sections: HashMap::new(),
            }
        }
    }
}
