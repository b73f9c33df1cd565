//! Configuration file (`config.json`).
//!
//! Every field has a default, so an empty object `{}` is a valid config
//! that shows the clock between fireworks.
//!
//! ```json
//! {
//!   "brightness": 60,
//!   "ntp": { "server": "pool.ntp.org", "timezone_offset": -5 },
//!   "fonts": { "dir": "fonts", "small": "helvB08", "large": "helvB12" },
//!   "graphics_dir": "/home/pi/marquee",
//!   "element_budget": 400,
//!   "messages": [
//!     { "line1": "{time}" },
//!     { "line1": "Hello", "line2": "World", "icon": "/graphics/logo.bmp", "color": "#FFD700" }
//!   ]
//! }
//! ```

use crate::Color;
use crate::error::{Error, Result};
use crate::marquee::{MessageDescriptor, MessageLine};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Line text that is replaced by the live clock.
pub const TIME_PLACEHOLDER: &str = "{time}";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Panel brightness (0-100).
    pub brightness: u8,
    pub ntp: NtpConfig,
    pub fonts: FontConfig,
    /// Root that icon references resolve against.
    pub graphics_dir: PathBuf,
    /// Most scene elements alive at once. Going over it triggers a scene
    /// reset instead of growing without bound.
    pub element_budget: Option<usize>,
    pub messages: Vec<MessageConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brightness: 75,
            ntp: NtpConfig::default(),
            fonts: FontConfig::default(),
            graphics_dir: PathBuf::from("."),
            element_budget: None,
            messages: vec![MessageConfig {
                line1: TIME_PLACEHOLDER.to_string(),
                ..MessageConfig::default()
            }],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NtpConfig {
    pub enabled: bool,
    pub server: String,
    /// Hours east of UTC, may be fractional.
    pub timezone_offset: f64,
    /// Seconds between successful syncs.
    pub interval_secs: u64,
    /// Seconds before retrying a failed sync.
    pub retry_secs: u64,
}

impl Default for NtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: "pool.ntp.org".to_string(),
            timezone_offset: 0.0,
            interval_secs: 600,
            retry_secs: 60,
        }
    }
}

impl NtpConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FontConfig {
    pub dir: PathBuf,
    pub small: String,
    pub large: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("fonts"),
            small: "helvB08".to_string(),
            large: "helvB12".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MessageConfig {
    pub line1: String,
    pub line2: String,
    pub icon: Option<String>,
    /// `#RRGGBB`; random palette colors when absent.
    pub color: Option<String>,
}

impl Config {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.brightness > 100 {
            return Err(Error::Config(format!("brightness must be 0-100, got {}", self.brightness)));
        }
        if !(-14.0..=14.0).contains(&self.ntp.timezone_offset) {
            return Err(Error::Config(format!(
                "ntp.timezone_offset must be within -14..14 hours, got {}",
                self.ntp.timezone_offset
            )));
        }
        if self.ntp.enabled && self.ntp.server.trim().is_empty() {
            return Err(Error::Config("ntp.server must not be empty".to_string()));
        }
        if self.element_budget == Some(0) {
            return Err(Error::Config("element_budget must be at least 1".to_string()));
        }
        for (i, m) in self.messages.iter().enumerate() {
            match m.color.as_deref() {
                Some(color) if Color::parse_hex(color).is_none() => {
                    return Err(Error::Config(format!("messages[{i}].color: invalid color {color:?}")));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Build the message list. `{time}` lines become `clock`.
    pub fn messages(&self, clock: &MessageLine) -> Vec<MessageDescriptor> {
        let line = |text: &str| {
            if text.trim() == TIME_PLACEHOLDER {
                clock.clone()
            } else {
                MessageLine::Literal(text.to_string())
            }
        };

        self.messages
            .iter()
            .map(|m| MessageDescriptor {
                line1: line(&m.line1),
                line2: line(&m.line2),
                icon: m.icon.clone().filter(|s| !s.trim().is_empty()),
                color: m.color.as_deref().and_then(Color::parse_hex),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn empty_object_uses_defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ntp.server, "pool.ntp.org");
        assert_eq!(config.ntp.timezone_offset, 0.0);
        assert_eq!(config.messages.len(), 1);
        assert_eq!(config.messages[0].line1, "{time}");
        assert_eq!(config.element_budget, None);
    }

    #[test]
    fn parses_full_config() {
        let config = Config::parse(
            r##"{
                "brightness": 40,
                "ntp": { "server": "time.example.org", "timezone_offset": -5, "interval_secs": 300 },
                "fonts": { "dir": "/opt/fonts" },
                "graphics_dir": "/srv/marquee",
                "element_budget": 400,
                "messages": [
                    { "line1": "{time}" },
                    { "line1": "Hello", "line2": "World", "icon": "/graphics/logo.bmp", "color": "#FFD700" }
                ]
            }"##,
        )
        .unwrap();

        assert_eq!(config.brightness, 40);
        assert_eq!(config.ntp.server, "time.example.org");
        assert_eq!(config.ntp.timezone_offset, -5.0);
        assert_eq!(config.ntp.interval(), Duration::from_secs(300));
        assert_eq!(config.ntp.retry(), Duration::from_secs(60));
        assert_eq!(config.fonts.dir, PathBuf::from("/opt/fonts"));
        assert_eq!(config.fonts.small, "helvB08");
        assert_eq!(config.element_budget, Some(400));
        assert_eq!(config.messages.len(), 2);
    }

    #[rstest]
    #[case(r#"{ "brightness": 101 }"#)]
    #[case(r#"{ "ntp": { "timezone_offset": 15 } }"#)]
    #[case(r#"{ "ntp": { "server": " " } }"#)]
    #[case(r#"{ "messages": [ { "line1": "x", "color": "red" } ] }"#)]
    #[case(r#"{ "element_budget": 0 }"#)]
    fn rejects_invalid_values(#[case] text: &str) {
        assert!(matches!(Config::parse(text), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_json() {
        assert!(matches!(Config::parse(r#"{ "wifi": {} }"#), Err(Error::Json(_))));
        assert!(matches!(Config::parse("{"), Err(Error::Json(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(Config::load(&tmp.path().join("config.json")), Err(Error::Io(_))));
    }

    #[test]
    fn load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "brightness": 10 }"#).unwrap();
        assert_eq!(Config::load(&path).unwrap().brightness, 10);
    }

    #[test]
    fn messages_substitute_clock_and_parse_colors() {
        let config = Config::parse(
            r##"{ "messages": [
                { "line1": "{time}" },
                { "line1": "Hello", "line2": "World", "icon": "/graphics/logo.bmp", "color": "0xCC4444" },
                { "line1": "No icon", "icon": "" }
            ] }"##,
        )
        .unwrap();

        let clock = MessageLine::provider(|| "Fri Feb 21 10:30".to_string());
        let messages = config.messages(&clock);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].line1.resolve(), "Fri Feb 21 10:30");
        assert!(matches!(messages[0].line1, MessageLine::Provider(_)));
        assert_eq!(messages[0].line2.resolve(), "");

        assert_eq!(messages[1].line2.resolve(), "World");
        assert_eq!(messages[1].icon.as_deref(), Some("/graphics/logo.bmp"));
        assert_eq!(messages[1].color, Some(crate::SOFT_RED));

        assert_eq!(messages[2].icon, None);
        assert_eq!(messages[2].color, None);
    }
}
