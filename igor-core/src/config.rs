// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Channel and reactor entries keep their `type` tag plus raw settings for the factory
use crate::commands::DEFAULT_WAKE_WORD;
use crate::paths;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reactors enabled, in order, when no config file exists.
const DEFAULT_REACTORS: &[&str] = &["help", "echo", "fortune", "catpic", "sentiment"];

/// Environment variables that supply a `bot_token` for channel types that lack one.
const TOKEN_ENV_VARS: &[(&str, &str)] = &[
    ("telegram", "TELEGRAM_BOT_TOKEN"),
    ("discord", "DISCORD_BOT_TOKEN"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
    /// Channel instances keyed by name. The name is the routing key events carry.
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelEntry>,
    /// Reactors in dispatch order.
    #[serde(default)]
    pub reactors: Vec<ReactorEntry>,
}

fn default_wake_word() -> String {
    DEFAULT_WAKE_WORD.to_string()
}

/// One `[channels.<name>]` table: an implementation tag plus its settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChannelEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub settings: toml::Table,
}

impl ChannelEntry {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            settings: toml::Table::new(),
        }
    }

    /// Deserialize the settings into the channel's own typed config.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T> {
        toml::Value::Table(self.settings.clone())
            .try_into()
            .with_context(|| format!("Invalid settings for {} channel", self.kind))
    }
}

// Custom Debug impl to redact tokens and secrets
impl std::fmt::Debug for ChannelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEntry")
            .field("kind", &self.kind)
            .field("settings", &redacted(&self.settings))
            .finish()
    }
}

/// One `[[reactors]]` entry.
#[derive(Clone, Serialize, Deserialize)]
pub struct ReactorEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub settings: toml::Table,
}

impl ReactorEntry {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            settings: toml::Table::new(),
        }
    }

    /// Name used in logs; defaults to the implementation tag.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    pub fn settings<T: DeserializeOwned>(&self) -> Result<T> {
        toml::Value::Table(self.settings.clone())
            .try_into()
            .with_context(|| format!("Invalid settings for {} reactor", self.kind))
    }
}

impl std::fmt::Debug for ReactorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorEntry")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("settings", &redacted(&self.settings))
            .finish()
    }
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("token") || key.contains("secret") || key.contains("password")
}

fn redacted(settings: &toml::Table) -> BTreeMap<&str, String> {
    settings
        .iter()
        .map(|(k, v)| {
            let shown = if is_secret_key(k) {
                "[REDACTED]".to_string()
            } else {
                v.to_string()
            };
            (k.as_str(), shown)
        })
        .collect()
}

impl Default for Config {
    /// Console channel plus every built-in reactor.
    fn default() -> Self {
        let mut channels = BTreeMap::new();
        channels.insert("console".to_string(), ChannelEntry::new("console"));
        Self {
            wake_word: default_wake_word(),
            channels,
            reactors: DEFAULT_REACTORS.iter().map(|k| ReactorEntry::new(*k)).collect(),
        }
    }
}

impl Config {
    /// Find the config file, checking in order:
    /// 1. IGOR_CONFIG_PATH env var (if set and the file exists)
    /// 2. ./config.toml
    /// 3. ~/.config/igor/config.toml
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("IGOR_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %env_path, "IGOR_CONFIG_PATH does not exist, ignoring");
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration with environment overrides.
    ///
    /// An explicit path must exist. Otherwise the search order of
    /// `find_config_file` applies, and with no file at all the defaults
    /// (console channel, all reactors) are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let mut config = match path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading configuration from file");
                Self::from_file(&path)?
            }
            None => {
                tracing::info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("IGOR_WAKE_WORD") {
            self.wake_word = val;
        }

        for (kind, var) in TOKEN_ENV_VARS {
            let Ok(token) = std::env::var(var) else {
                continue;
            };
            for entry in self.channels.values_mut().filter(|e| e.kind == *kind) {
                let has_token = entry
                    .settings
                    .get("bot_token")
                    .and_then(toml::Value::as_str)
                    .is_some_and(|t| !t.trim().is_empty());
                if !has_token {
                    entry
                        .settings
                        .insert("bot_token".to_string(), toml::Value::String(token.clone()));
                }
            }
        }
    }

    /// Structural checks only; per-entry problems (unknown type, missing
    /// token) are reported by the factory so one bad entry does not stop the
    /// others.
    pub fn validate(&self) -> Result<()> {
        if self.wake_word.trim().is_empty() {
            anyhow::bail!("wake_word must not be empty (set in config.toml or IGOR_WAKE_WORD)");
        }
        for name in self.channels.keys() {
            if name.trim().is_empty() {
                anyhow::bail!("Channel names must not be empty");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_full_deserialize() {
        let toml_str = r#"
            wake_word = "jeeves"

            [channels.console]
            type = "console"

            [channels.discord]
            type = "discord"
            bot_token = "abc"
            intents = 513

            [[reactors]]
            type = "help"

            [[reactors]]
            type = "echo"
            name = "parrot"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.wake_word, "jeeves");
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels["discord"].kind, "discord");
        assert_eq!(
            config.channels["discord"].settings.get("intents"),
            Some(&toml::Value::Integer(513))
        );
        assert!(!config.channels["discord"].settings.contains_key("type"));
        assert_eq!(config.reactors.len(), 2);
        assert_eq!(config.reactors[1].display_name(), "parrot");
        assert_eq!(config.reactors[0].display_name(), "help");
    }

    #[test]
    fn test_config_defaults_when_fields_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.wake_word, "igor");
        assert!(config.channels.is_empty());
        assert!(config.reactors.is_empty());
    }

    #[test]
    fn test_reactor_order_preserved() {
        let toml_str = r#"
            [[reactors]]
            type = "sentiment"
            [[reactors]]
            type = "echo"
            [[reactors]]
            type = "catpic"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let kinds: Vec<_> = config.reactors.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["sentiment", "echo", "catpic"]);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.channels.contains_key("console"));
        let kinds: Vec<_> = config.reactors.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, DEFAULT_REACTORS.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_channel_entry_debug_redacts_token() {
        let toml_str = r#"
            type = "telegram"
            bot_token = "secret-token"
        "#;
        let entry: ChannelEntry = toml::from_str(toml_str).unwrap();
        let debug_str = format!("{:?}", entry);
        assert!(!debug_str.contains("secret-token"), "bot_token should be redacted in Debug output");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("telegram"));
    }

    #[test]
    fn test_channel_entry_typed_settings() {
        #[derive(Deserialize)]
        struct Settings {
            bot_token: String,
            #[serde(default)]
            intents: Option<u64>,
        }

        let toml_str = r#"
            type = "discord"
            bot_token = "tok"
        "#;
        let entry: ChannelEntry = toml::from_str(toml_str).unwrap();
        let settings: Settings = entry.settings().unwrap();
        assert_eq!(settings.bot_token, "tok");
        assert!(settings.intents.is_none());
    }

    #[test]
    fn test_channel_entry_typed_settings_error_names_kind() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Settings {
            bot_token: String,
        }

        let entry = ChannelEntry::new("discord");
        let err = entry.settings::<Settings>().unwrap_err();
        assert!(err.to_string().contains("discord"));
    }

    #[test]
    fn test_validate_rejects_empty_wake_word() {
        let config = Config {
            wake_word: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_type_is_parse_error() {
        let toml_str = r#"
            [channels.console]
            prompt = "> "
        "#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[channels.console]\ntype = \"console\"\n[[reactors]]\ntype = \"echo\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.channels.contains_key("console"));
        assert_eq!(config.reactors.len(), 1);
    }

    #[test]
    fn test_from_file_missing_errors_with_path() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
