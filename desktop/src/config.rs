//! Compositor configuration.
//!
//! Read from the TOML file `PERCH_CONFIG` points to. Every key is optional. Without the variable
//! the defaults are used throughout.
use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use perch_input::{RepeatInfo, RuleNames};

use crate::Mode;

pub const CONFIG_ENV: &str = "PERCH_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keyboard: KeyboardConfig,
    pub cursor: CursorConfig,
    pub seat: SeatConfig,
    pub headless: HeadlessConfig,
}

impl Config {
    /// Load the file `PERCH_CONFIG` names, or the defaults if it is not set.
    pub fn load() -> Result<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                info!("{CONFIG_ENV} not set, using the default configuration");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid configuration {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Repeats per second.
    pub repeat_rate: i32,
    /// Milliseconds before repeating starts.
    pub repeat_delay: u32,
    #[serde(flatten)]
    pub rules: RuleNames,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        let repeat = RepeatInfo::default();
        Self {
            repeat_rate: repeat.rate,
            repeat_delay: repeat.delay,
            rules: RuleNames::default(),
        }
    }
}

impl KeyboardConfig {
    pub fn repeat_info(&self) -> RepeatInfo {
        RepeatInfo {
            rate: self.repeat_rate,
            delay: self.repeat_delay,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// `None` selects the default theme.
    pub theme: Option<String>,
    pub size: u32,
    /// Shown whenever the pointer is not above a view.
    pub default_image: String,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            theme: None,
            size: 24,
            default_image: "left_ptr".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeatConfig {
    pub name: String,
}

impl Default for SeatConfig {
    fn default() -> Self {
        Self {
            name: "seat0".into(),
        }
    }
}

/// The outputs and devices the headless platform announces at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    pub outputs: Vec<HeadlessOutputConfig>,
    pub keyboards: Vec<String>,
    pub pointers: Vec<String>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            outputs: vec![HeadlessOutputConfig::default()],
            keyboards: vec!["headless-keyboard".into()],
            pointers: vec!["headless-pointer".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadlessOutputConfig {
    pub name: String,
    /// An output without modes keeps whatever the backend configured.
    #[serde(default)]
    pub modes: Vec<Mode>,
}

impl Default for HeadlessOutputConfig {
    fn default() -> Self {
        Self {
            name: "HEADLESS-1".into(),
            modes: vec![Mode {
                width: 1920,
                height: 1080,
                refresh: 60_000,
                preferred: true,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.keyboard.repeat_info(), RepeatInfo { rate: 25, delay: 600 });
        assert_eq!(config.cursor.size, 24);
        assert_eq!(config.cursor.default_image, "left_ptr");
        assert_eq!(config.seat.name, "seat0");
        assert_eq!(config.headless.outputs.len(), 1);
        assert_eq!(config.headless.outputs[0].modes[0].to_string(), "1920x1080@60");
    }

    #[test]
    fn keyboard_rules_are_flattened() {
        let config = Config::from_toml(
            r#"
            [keyboard]
            repeat_rate = 40
            layout = "de,us"
            variant = "nodeadkeys"
            "#,
        )
        .unwrap();
        assert_eq!(config.keyboard.repeat_rate, 40);
        assert_eq!(config.keyboard.repeat_delay, 600);
        assert_eq!(config.keyboard.rules.layout, "de,us");
        assert_eq!(config.keyboard.rules.variant, "nodeadkeys");
    }

    #[test]
    fn headless_outputs_can_be_listed() {
        let config = Config::from_toml(
            r#"
            [[headless.outputs]]
            name = "left"
            modes = [
                { width = 1280, height = 720, refresh = 60000 },
                { width = 2560, height = 1440, refresh = 144000, preferred = true },
            ]

            [[headless.outputs]]
            name = "bare"
            "#,
        )
        .unwrap();
        let outputs = &config.headless.outputs;
        assert_eq!(outputs.len(), 2);
        assert!(!outputs[0].modes[0].preferred);
        assert!(outputs[0].modes[1].preferred);
        assert!(outputs[1].modes.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml("[cursor]\nsize = \"big\"").is_err());
    }
}
