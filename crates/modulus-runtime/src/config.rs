//! Host configuration loading and validation
//!
//! Supports YAML, TOML and JSON files, selected by extension, with
//! `${VAR}` and `${VAR:-default}` environment variable expansion.

use crate::error::{HostError, Result};
use crate::lifecycle::{LifecycleConfig, DEFAULT_UNLOAD_GRACE};
use modulus_api::ModuleName;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Application name reported to modules
    #[serde(default)]
    pub application_name: Option<String>,

    /// Base directory for module resources
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Delay between the unloading and unloaded phases
    #[serde(default = "default_unload_grace", with = "humantime_serde")]
    pub unload_grace: Duration,

    /// Modules to load at startup; all registered modules when absent
    #[serde(default)]
    pub autoload: Option<Vec<ModuleName>>,

    /// Per-module settings, served by the settings module
    #[serde(default)]
    pub settings: HashMap<ModuleName, HashMap<String, Value>>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `modulus_runtime=debug`
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

fn default_unload_grace() -> Duration {
    DEFAULT_UNLOAD_GRACE
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            application_name: None,
            working_directory: None,
            unload_grace: DEFAULT_UNLOAD_GRACE,
            autoload: None,
            settings: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| HostError::config("Unable to detect config format"))?;

        match ext {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(HostError::config(format!("Unsupported config format: {ext}"))),
        }
    }
}

impl HostConfig {
    /// Load and validate configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| {
            HostError::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        let format = ConfigFormat::from_path(path)?;

        Self::load_from_str(&content, format)
    }

    /// Load and validate configuration from a string
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let config: HostConfig = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(&expanded)
                .map_err(|e| HostError::config(format!("Failed to parse YAML: {e}")))?,
            ConfigFormat::Toml => toml::from_str(&expanded)
                .map_err(|e| HostError::config(format!("Failed to parse TOML: {e}")))?,
            ConfigFormat::Json => serde_json::from_str(&expanded)
                .map_err(|e| HostError::config(format!("Failed to parse JSON: {e}")))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.application_name {
            if name.trim().is_empty() {
                return Err(HostError::config("application_name cannot be empty"));
            }
        }

        if let Some(autoload) = &self.autoload {
            let mut seen = HashSet::new();
            for name in autoload {
                if name.as_str().is_empty() {
                    return Err(HostError::config("autoload entries cannot be empty"));
                }
                if !seen.insert(name) {
                    return Err(HostError::config(format!(
                        "Module {name} is listed twice in autoload"
                    )));
                }
            }
        }

        if self.settings.keys().any(|name| name.as_str().is_empty()) {
            return Err(HostError::config("settings module names cannot be empty"));
        }

        if self.logging.level.trim().is_empty() {
            return Err(HostError::config("logging.level cannot be empty"));
        }

        if self.unload_grace > Duration::from_secs(60) {
            tracing::warn!(
                grace = ?self.unload_grace,
                "unload_grace is very high (>1 minute)"
            );
        }

        Ok(())
    }

    /// Lifecycle settings derived from this configuration
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            unload_grace: self.unload_grace,
        }
    }
}

/// Expand `${VAR}` and `${VAR:-default}` in a configuration string
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| HostError::config(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(whole), Some(var)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = var.as_str();

        let value = match (env::var(var_name), cap.get(3)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                return Err(HostError::config(format!(
                    "Environment variable '{var_name}' not set and no default provided"
                )));
            }
        };

        result.push_str(&content[last_match..whole.start()]);
        result.push_str(&value);
        last_match = whole.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML_CONFIG: &str = r#"
application_name: "modulus-test"
working_directory: "/srv/modulus"
unload_grace: "250ms"
autoload: ["console-logging", "chat"]
settings:
  chat:
    greeting: "hello"
    max_phrases: 12
logging:
  level: "debug"
  format: "json"
"#;

    #[test]
    fn test_load_yaml() {
        let config = HostConfig::load_from_str(YAML_CONFIG, ConfigFormat::Yaml).unwrap();

        assert_eq!(config.application_name.as_deref(), Some("modulus-test"));
        assert_eq!(config.unload_grace, Duration::from_millis(250));
        assert_eq!(
            config.autoload,
            Some(vec![ModuleName::from("console-logging"), ModuleName::from("chat")])
        );
        assert_eq!(
            config.settings[&ModuleName::from("chat")]["max_phrases"],
            Value::from(12)
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.lifecycle().unload_grace, Duration::from_millis(250));
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::load_from_str("{}", ConfigFormat::Json).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.unload_grace, Duration::from_secs(1));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
application_name = "modulus"
unload_grace = "2s"

[settings.chat]
greeting = "hi"
"#;
        let config = HostConfig::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.unload_grace, Duration::from_secs(2));
        assert!(config.autoload.is_none());
    }

    #[test]
    fn test_invalid_yaml() {
        let result = HostConfig::load_from_str("autoload: [chat", ConfigFormat::Yaml);
        assert!(matches!(result, Err(HostError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_autoload() {
        let config = HostConfig {
            autoload: Some(vec![ModuleName::from("chat"), ModuleName::from("chat")]),
            ..HostConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HostConfig {
            application_name: Some("  ".to_string()),
            ..HostConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("MODULUS_TEST_APP", "from-env");
        env::remove_var("MODULUS_TEST_UNSET");

        let config = HostConfig::load_from_str(
            r#"
application_name: "${MODULUS_TEST_APP}"
unload_grace: "${MODULUS_TEST_UNSET:-3s}"
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(config.application_name.as_deref(), Some("from-env"));
        assert_eq!(config.unload_grace, Duration::from_secs(3));

        env::remove_var("MODULUS_TEST_APP");
    }

    #[test]
    fn test_missing_env_var_no_default() {
        env::remove_var("MODULUS_TEST_MISSING");

        let result = HostConfig::load_from_str(
            "application_name: \"${MODULUS_TEST_MISSING}\"",
            ConfigFormat::Yaml,
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("MODULUS_TEST_MISSING"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML_CONFIG.as_bytes()).unwrap();

        let config = HostConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.working_directory, Some(PathBuf::from("/srv/modulus")));
    }

    #[test]
    fn test_detect_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("host.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("host.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("host.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("host")).is_err());
    }
}
