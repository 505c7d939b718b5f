use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::paths::NamingPolicy;
use crate::scanner::{ScanOptions, DEFAULT_IMAGE_EXTENSIONS};

/// File name looked up at the vault root.
pub const CONFIG_FILE_NAME: &str = ".imgref.yaml";

/// Top-level configuration for imgref
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImgrefConfig {
    pub scan: ScanConfig,
    pub rewrite: RewriteConfig,
    pub logs: LogConfig,
    pub logging: LoggingConfig,
}

/// Which files take part in a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Lower-case extensions that count as images
    pub image_extensions: Vec<String>,
    /// Glob patterns excluded from enumeration
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub naming_policy: NamingPolicy,
}

/// Where the operation log and the audit trail live (relative to the vault root)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub operation_log: PathBuf,
    pub audit_log: PathBuf,
}

/// Logging and telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether to log scan statistics after each scan
    pub show_scan_stats: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            ignore_patterns: vec![
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.obsidian/**".to_string(),
                "**/.trash/**".to_string(),
            ],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            operation_log: PathBuf::from(".imgref/operations.jsonl"),
            audit_log: PathBuf::from(".imgref/audit.jsonl"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            show_scan_stats: true,
        }
    }
}

impl ImgrefConfig {
    /// Load config from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new(self.scan.image_extensions.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = ImgrefConfig::from_yaml("rewrite:\n  naming_policy: relative\n").unwrap();

        assert_eq!(config.rewrite.naming_policy, NamingPolicy::Relative);
        assert!(config.scan.image_extensions.contains(&"png".to_string()));
        assert_eq!(
            config.logs.operation_log,
            PathBuf::from(".imgref/operations.jsonl")
        );
        assert!(config.logging.show_scan_stats);
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = ImgrefConfig::default();
        config.scan.image_extensions = vec!["png".to_string(), "avif".to_string()];
        config.rewrite.naming_policy = NamingPolicy::Absolute;

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("naming_policy: absolute"));
        assert_eq!(ImgrefConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_invalid_policy_is_an_error() {
        assert!(ImgrefConfig::from_yaml("rewrite:\n  naming_policy: nearest\n").is_err());
    }

    #[test]
    fn test_scan_options_use_configured_extensions() {
        let mut config = ImgrefConfig::default();
        config.scan.image_extensions = vec!["AVIF".to_string()];
        let options = config.scan_options();
        assert!(options.is_image("a/b.avif"));
        assert!(!options.is_image("a/b.png"));
    }
}
