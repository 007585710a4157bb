//! JSON configuration for the collector binaries.
//!
//! ```json
//! {
//!   "system": "Linux",
//!   "collectors": {
//!     "cpu": { "enabled": true, "options": { "sampling_interval_sec": 1 } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collector::{CollectorError, CollectorOptions, registry};
use crate::util::{Platform, current_platform_id};

/// Per-collector configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Raw options object; validated through [`CollectorOptions::from_value`].
    #[serde(default)]
    pub options: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: serde_json::Value::Object(Default::default()),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Platform id whose collector table applies. Defaults to the running
    /// platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default)]
    pub collectors: BTreeMap<String, CollectorConfig>,
}

/// Error loading or saving an [`AppConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
    Collector { name: String, error: CollectorError },
    /// `system` names a platform other than the running one.
    PlatformMismatch { configured: String, host: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "config JSON error: {}", e),
            ConfigError::Collector { name, error } => {
                write!(f, "collector '{}': {}", name, error)
            }
            ConfigError::PlatformMismatch { configured, host } => write!(
                f,
                "config is for platform '{}' but this host is '{}'",
                configured, host
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::Collector { error, .. } => Some(error),
            ConfigError::PlatformMismatch { .. } => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl AppConfig {
    /// Enables every collector the registry offers for `platform`.
    pub fn default_for(platform: Option<Platform>) -> Self {
        let collectors = platform
            .map(|p| registry::resolve(p.as_id()))
            .unwrap_or_default()
            .into_iter()
            .map(|name| (name.to_string(), CollectorConfig::default()))
            .collect();
        Self {
            system: platform.map(|p| p.as_id().to_string()),
            collectors,
        }
    }

    /// Parses and validates a configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            collectors = config.collectors.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Loads `path`, or returns the platform defaults when it does not exist.
    pub fn load_or_default(path: &Path, platform: Option<Platform>) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config not found, using defaults");
            return Ok(Self::default_for(platform));
        }
        Self::load(path)
    }

    /// Writes the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Checks every collector's options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, entry) in &self.collectors {
            CollectorOptions::from_value(&entry.options).map_err(|error| {
                tracing::warn!(collector = %name, error = %error, "invalid collector options");
                ConfigError::Collector {
                    name: name.clone(),
                    error,
                }
            })?;
        }
        Ok(())
    }

    /// Platform id whose collector table applies.
    pub fn platform_id(&self) -> &str {
        self.system.as_deref().unwrap_or(current_platform_id())
    }

    /// Fails when `system` names a platform other than the host's.
    ///
    /// The host decides which probes run; `system` only documents which
    /// platform the file was written for.
    pub fn check_platform(&self, host_id: &str) -> Result<(), ConfigError> {
        let Some(system) = self.system.as_deref() else {
            return Ok(());
        };
        let same = match (Platform::from_id(system), Platform::from_id(host_id)) {
            (Some(configured), Some(host)) => configured == host,
            _ => system == host_id,
        };
        if same {
            Ok(())
        } else {
            Err(ConfigError::PlatformMismatch {
                configured: system.to_string(),
                host: host_id.to_string(),
            })
        }
    }

    /// Names of enabled collectors, sorted.
    pub fn enabled(&self) -> Vec<&str> {
        self.collectors
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_default_for_linux() {
        let config = AppConfig::default_for(Some(Platform::Linux));
        assert_eq!(config.system.as_deref(), Some("Linux"));
        assert_eq!(config.enabled(), vec!["cpu"]);
    }

    #[test]
    fn test_default_for_windows_and_unknown() {
        assert!(AppConfig::default_for(Some(Platform::Windows)).collectors.is_empty());
        let unknown = AppConfig::default_for(None);
        assert!(unknown.collectors.is_empty());
        assert_eq!(unknown.system, None);
    }

    #[test]
    fn test_from_json_partial_entries() {
        let config = AppConfig::from_json(
            r#"{"system": "Darwin", "collectors": {"cpu": {"options": {"interval": 2}}}}"#,
        )
        .unwrap();
        let cpu = &config.collectors["cpu"];
        assert!(cpu.enabled);
        assert_eq!(
            CollectorOptions::from_value(&cpu.options)
                .unwrap()
                .sampling_interval_sec,
            2.0
        );
        assert_eq!(config.platform_id(), "Darwin");

        let bare = AppConfig::from_json(r#"{"collectors": {"cpu": {}}}"#).unwrap();
        assert!(bare.collectors["cpu"].enabled);
        assert!(bare.collectors["cpu"].options.is_null());
    }

    #[test]
    fn test_platform_id_defaults_to_host() {
        let bare = AppConfig::from_json(r#"{"collectors": {}}"#).unwrap();
        assert_eq!(bare.platform_id(), current_platform_id());
    }

    #[test]
    fn test_check_platform() {
        let bare = AppConfig::from_json(r#"{"collectors": {}}"#).unwrap();
        assert!(bare.check_platform("Linux").is_ok());

        let darwin = AppConfig::from_json(r#"{"system": "Darwin", "collectors": {}}"#).unwrap();
        assert!(darwin.check_platform("Darwin").is_ok());
        let err = darwin.check_platform("Linux").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::PlatformMismatch { ref configured, ref host }
                if configured == "Darwin" && host == "Linux"
        ));
        assert!(err.to_string().contains("Darwin"));

        let lower = AppConfig::from_json(r#"{"system": "linux", "collectors": {}}"#).unwrap();
        assert!(lower.check_platform("Linux").is_ok());
        assert!(lower.check_platform("Plan9").is_err());
    }

    #[test]
    fn test_from_json_rejects_bad_options() {
        let err = AppConfig::from_json(
            r#"{"collectors": {"cpu": {"options": {"history_capacity": 0}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Collector { ref name, .. } if name == "cpu"));
        assert!(err.to_string().contains("history_capacity"));
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            AppConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/cpumon.json");

        let mut config = AppConfig::default_for(Some(Platform::Linux));
        config.collectors.insert(
            "cpu".into(),
            CollectorConfig {
                enabled: true,
                options: json!({"sampling_interval_sec": 0.5, "history_capacity": 60}),
            },
        );
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        let config = AppConfig::load_or_default(&path, Some(Platform::MacOs)).unwrap();
        assert_eq!(config, AppConfig::default_for(Some(Platform::MacOs)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            AppConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
