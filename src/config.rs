//! Configuration management for xdna-cmd.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (XDNA_CMD_REPORT_WIDTH, XDNA_CMD_COLOR, NO_COLOR, XDNA_CMD_INPUT_FORMAT)
//! 2. Project-local config file (`./xdna-cmd.toml`)
//! 3. User config file (`~/.config/xdna-cmd/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # xdna-cmd.toml
//!
//! # Width of the disassembly box in characters
//! report_width = 100
//!
//! # Highlight unknown instructions in red
//! color = false
//!
//! # Force the instruction file format (hex or binary)
//! input_format = "hex"
//! ```
//!
//! Configuration only covers presentation and input handling. The target
//! device always comes from the stream header or an explicit
//! [`DeviceContext`](crate::npu::DeviceContext).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::parser::insts::InputFormat;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Default disassembly box width.
pub const DEFAULT_REPORT_WIDTH: usize = 80;

/// Narrowest box that still fits the index and word columns.
pub const MIN_REPORT_WIDTH: usize = 40;

/// xdna-cmd configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Width of the disassembly box.
    pub report_width: Option<usize>,

    /// Use ANSI colour for unknown instructions.
    pub color: Option<bool>,

    /// Instruction file format. Detected from the file extension when unset.
    pub input_format: Option<InputFormat>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `xdna-cmd.toml`
    /// 3. User config `~/.config/xdna-cmd/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_local_config() {
            config.merge(local_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Report width, with fallback to default.
    pub fn report_width(&self) -> usize {
        self.report_width
            .unwrap_or(DEFAULT_REPORT_WIDTH)
            .max(MIN_REPORT_WIDTH)
    }

    /// Colour setting, with fallback to default (on).
    pub fn color(&self) -> bool {
        self.color.unwrap_or(true)
    }

    /// Forced input format, if any.
    pub fn input_format(&self) -> Option<InputFormat> {
        self.input_format
    }

    /// Load user configuration from ~/.config/xdna-cmd/config.toml
    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./xdna-cmd.toml
    fn load_local_config() -> Option<Self> {
        let local_path = Path::new("xdna-cmd.toml");
        if let Some(config) = Self::load_from_file(local_path) {
            return Some(config);
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let project_path = Path::new(&manifest_dir).join("xdna-cmd.toml");
            if let Some(config) = Self::load_from_file(&project_path) {
                return Some(config);
            }
        }

        None
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    fn merge(&mut self, other: Self) {
        if other.report_width.is_some() {
            self.report_width = other.report_width;
        }
        if other.color.is_some() {
            self.color = other.color;
        }
        if other.input_format.is_some() {
            self.input_format = other.input_format;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(width) = var("XDNA_CMD_REPORT_WIDTH") {
            match width.trim().parse() {
                Ok(width) => {
                    log::info!("Using XDNA_CMD_REPORT_WIDTH from environment: {}", width);
                    self.report_width = Some(width);
                }
                Err(e) => log::warn!("Ignoring XDNA_CMD_REPORT_WIDTH={:?}: {}", width, e),
            }
        }

        if let Some(color) = var("XDNA_CMD_COLOR") {
            match parse_switch(&color) {
                Some(color) => {
                    log::info!("Using XDNA_CMD_COLOR from environment: {}", color);
                    self.color = Some(color);
                }
                None => log::warn!("Ignoring XDNA_CMD_COLOR={:?}", color),
            }
        }

        // https://no-color.org: any non-empty value disables colour
        if var("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            log::info!("NO_COLOR set, disabling colour");
            self.color = Some(false);
        }

        if let Some(format) = var("XDNA_CMD_INPUT_FORMAT") {
            match format.parse() {
                Ok(format) => {
                    log::info!("Using XDNA_CMD_INPUT_FORMAT from environment: {}", format);
                    self.input_format = Some(format);
                }
                Err(e) => log::warn!("Ignoring XDNA_CMD_INPUT_FORMAT: {}", e),
            }
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("xdna-cmd").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# xdna-cmd configuration
# Place this file at ~/.config/xdna-cmd/config.toml or ./xdna-cmd.toml

# Width of the disassembly box in characters (default 80)
report_width = 80

# Highlight unknown instructions in red (default true, NO_COLOR disables)
# color = true

# Instruction file format: "hex" or "binary" (default: from file extension)
# input_format = "hex"
"#
        .to_string()
    }
}

/// Parse an on/off environment value.
fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.report_width(), 80);
        assert!(config.color());
        assert_eq!(config.input_format(), None);
    }

    #[test]
    fn test_width_floor() {
        let config = Config { report_width: Some(10), ..Config::default() };
        assert_eq!(config.report_width(), MIN_REPORT_WIDTH);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config {
            report_width: Some(100),
            color: None,
            input_format: Some(InputFormat::Hex),
        };

        let overlay = Config {
            report_width: None,
            color: Some(false),
            input_format: Some(InputFormat::Binary),
        };

        base.merge(overlay);

        // report_width unchanged (overlay was None)
        assert_eq!(base.report_width, Some(100));
        assert_eq!(base.color, Some(false));
        assert_eq!(base.input_format, Some(InputFormat::Binary));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("XDNA_CMD_REPORT_WIDTH", "120"),
            ("XDNA_CMD_COLOR", "off"),
            ("XDNA_CMD_INPUT_FORMAT", "binary"),
        ]));
        assert_eq!(config.report_width, Some(120));
        assert_eq!(config.color, Some(false));
        assert_eq!(config.input_format, Some(InputFormat::Binary));
    }

    #[test]
    fn test_no_color_wins() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("XDNA_CMD_COLOR", "1"), ("NO_COLOR", "1")]));
        assert_eq!(config.color, Some(false));

        let mut config = Config::default();
        config.apply_overrides(env(&[("NO_COLOR", "")]));
        assert_eq!(config.color, None);
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let mut config = Config { report_width: Some(90), ..Config::default() };
        config.apply_overrides(env(&[
            ("XDNA_CMD_REPORT_WIDTH", "wide"),
            ("XDNA_CMD_COLOR", "maybe"),
            ("XDNA_CMD_INPUT_FORMAT", "elf"),
        ]));
        assert_eq!(config.report_width, Some(90));
        assert_eq!(config.color, None);
        assert_eq!(config.input_format, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "report_width = 64\ninput_format = \"hex\"").unwrap();
        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.report_width, Some(64));
        assert_eq!(config.color, None);
        assert_eq!(config.input_format, Some(InputFormat::Hex));
    }

    #[test]
    fn test_load_from_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "report_width = \"wide\"").unwrap();
        assert!(Config::load_from_file(file.path()).is_none());
        assert!(Config::load_from_file(Path::new("/nonexistent/xdna-cmd.toml")).is_none());
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = Config::sample_config();
        let config: Config = toml::from_str(&sample).expect("Sample config should parse");
        assert_eq!(config.report_width, Some(80));
    }
}
