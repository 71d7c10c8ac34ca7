//! Enumerator configuration management

use crate::filter::parse_filters;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Group directory pattern: `<hex vendor id>.<hex product id>`
pub const DEFAULT_GROUP_PATTERN: &str = r"^[0-9a-f]+\.[0-9a-f]+$";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumeratorConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "GeneralSettings::default_log_level")]
    pub log_level: String,
    /// Which backend enumerates devices
    #[serde(default)]
    pub backend: BackendKind,
    /// How `usb-enum` prints identities
    #[serde(default)]
    pub output: OutputFormat,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            backend: BackendKind::default(),
            output: OutputFormat::default(),
        }
    }
}

impl GeneralSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

/// Backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Device tree on illumos/Solaris or when a snapshot is configured, libusb elsewhere
    #[default]
    Auto,
    /// `/dev/usb` walk with device-tree property queries
    Devinfo,
    /// Portable libusb enumeration
    Libusb,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// What to do when a node has no usable `usb-num-configs`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumConfigsPolicy {
    /// Discard the node
    #[default]
    Required,
    /// Assume a single configuration
    DefaultOne,
}

/// Settings for the `/dev/usb` walk and identity derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Namespace root holding `<vid>.<pid>` group directories
    #[serde(default = "DiscoverySettings::default_dev_usb_root")]
    pub dev_usb_root: PathBuf,
    /// Device-tree root every resolved witness must live under
    #[serde(default = "DiscoverySettings::default_devices_root")]
    pub devices_root: PathBuf,
    /// File present in every instance directory
    #[serde(default = "DiscoverySettings::default_witness_file")]
    pub witness_file: String,
    #[serde(default = "DiscoverySettings::default_group_pattern")]
    pub group_pattern: String,
    /// Capacity of composed witness paths in bytes, terminating NUL included
    #[serde(default = "DiscoverySettings::default_path_capacity")]
    pub path_capacity: usize,
    #[serde(default)]
    pub num_configs_policy: NumConfigsPolicy,
    /// VID:PID filters applied to group names (empty = all)
    #[serde(default)]
    pub filters: Vec<String>,
    /// Read properties from this snapshot directory instead of libdevinfo
    #[serde(default)]
    pub snapshot_root: Option<PathBuf>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            dev_usb_root: Self::default_dev_usb_root(),
            devices_root: Self::default_devices_root(),
            witness_file: Self::default_witness_file(),
            group_pattern: Self::default_group_pattern(),
            path_capacity: Self::default_path_capacity(),
            num_configs_policy: NumConfigsPolicy::default(),
            filters: Vec::new(),
            snapshot_root: None,
        }
    }
}

impl DiscoverySettings {
    fn default_dev_usb_root() -> PathBuf {
        PathBuf::from("/dev/usb")
    }

    fn default_devices_root() -> PathBuf {
        PathBuf::from("/devices")
    }

    fn default_witness_file() -> String {
        "devstat".to_string()
    }

    fn default_group_pattern() -> String {
        DEFAULT_GROUP_PATTERN.to_string()
    }

    fn default_path_capacity() -> usize {
        1024 // MAXPATHLEN
    }
}

impl EnumeratorConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/devtree-usb/enumerator.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.expand_paths();

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse configuration text without validating it
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration")
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("devtree-usb").join("enumerator.toml")
        } else {
            PathBuf::from(".config/devtree-usb/enumerator.toml")
        }
    }

    /// Expand `~` and make every configured path absolute
    ///
    /// `devices_root` is also canonicalized when it exists, since resolved
    /// witness paths are compared against it.
    pub fn expand_paths(&mut self) {
        let discovery = &mut self.discovery;
        discovery.dev_usb_root = expand_path(&discovery.dev_usb_root);
        let devices_root = expand_path(&discovery.devices_root);
        discovery.devices_root = fs::canonicalize(&devices_root).unwrap_or(devices_root);
        if let Some(root) = discovery.snapshot_root.take() {
            discovery.snapshot_root = Some(expand_path(&root));
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                valid_levels.join(", ")
            ));
        }

        let discovery = &self.discovery;
        if discovery.witness_file.is_empty() || discovery.witness_file.contains('/') {
            return Err(anyhow!(
                "Invalid witness_file '{}', must be a single file name",
                discovery.witness_file
            ));
        }

        if discovery.path_capacity == 0 {
            return Err(anyhow!("path_capacity must be greater than 0"));
        }

        if !discovery.devices_root.is_absolute() {
            return Err(anyhow!(
                "devices_root '{}' must be an absolute path",
                discovery.devices_root.display()
            ));
        }

        parse_filters(&discovery.filters)?;

        Ok(())
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let expanded = match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    };
    std::path::absolute(&expanded).unwrap_or(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EnumeratorConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.backend, BackendKind::Auto);
        assert_eq!(config.discovery.dev_usb_root, PathBuf::from("/dev/usb"));
        assert_eq!(config.discovery.devices_root, PathBuf::from("/devices"));
        assert_eq!(config.discovery.witness_file, "devstat");
        assert_eq!(config.discovery.path_capacity, 1024);
        assert_eq!(
            config.discovery.num_configs_policy,
            NumConfigsPolicy::Required
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = EnumeratorConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: EnumeratorConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.discovery.group_pattern, parsed.discovery.group_pattern);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = EnumeratorConfig::default();
        config.general.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.general.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_witness_file() {
        let mut config = EnumeratorConfig::default();
        config.discovery.witness_file = "a/b".to_string();
        assert!(config.validate().is_err());

        config.discovery.witness_file = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_filters() {
        let mut config = EnumeratorConfig::default();
        config.discovery.filters = vec!["0x0a12:*".to_string()];
        assert!(config.validate().is_ok());

        config.discovery.filters = vec!["a12:1".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_paths_tilde() {
        let mut config = EnumeratorConfig::default();
        config.discovery.snapshot_root = Some(PathBuf::from("~/props"));
        config.expand_paths();

        let root = config.discovery.snapshot_root.unwrap();
        if dirs::home_dir().is_some() {
            assert!(!root.starts_with("~"));
        }
    }
}
