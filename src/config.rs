//! Configuration loading.
//!
//! Reads the JSON configuration file and layers `TCP_BUTTONS_*` environment
//! overrides on top. A missing default file is not an error: the built-in
//! defaults describe a ten-key panel with volume keys.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_MAX_CLIENTS, DEFAULT_PORT, DEFAULT_PROMPT, DEFAULT_VOLUME_STEP,
};
use crate::panel::{ButtonRole, DeviceButton};

/// Configuration for the tcp-buttons server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// IP address the control listener binds to.
    pub bind_address: String,
    /// TCP control port.
    pub port: u16,
    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,
    /// Name announced in the welcome banner.
    pub prompt: String,
    /// Volume change per press of a hardware volume key.
    pub volume_step: u16,
    /// Device button enumeration.
    pub buttons: Vec<DeviceButton>,
}

impl Default for Config {
    fn default() -> Self {
        let mut buttons = vec![DeviceButton::new(1, "Power"), DeviceButton::new(2, "Mute")];
        for n in 1..=6 {
            buttons.push(DeviceButton::new(n + 2, format!("Button{n}")));
        }
        buttons.push(DeviceButton::with_role(9, "VolumeUp", ButtonRole::VolumeUp));
        buttons.push(DeviceButton::with_role(10, "VolumeDown", ButtonRole::VolumeDown));

        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            prompt: DEFAULT_PROMPT.to_string(),
            volume_step: DEFAULT_VOLUME_STEP,
            buttons,
        }
    }
}

impl Config {
    /// Default configuration file: `<config dir>/tcp-buttons/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("tcp-buttons")
            .join("config.json"))
    }

    /// Load configuration with environment overrides applied.
    ///
    /// Path priority: `path` argument, then `TCP_BUTTONS_CONFIG`, then
    /// [`Config::default_path`]. An explicitly named file must exist; a
    /// missing default file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("TCP_BUTTONS_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::load_from_file(&path)?,
            None => match Self::default_path() {
                Ok(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file. Absent fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `TCP_BUTTONS_*` overrides from `lookup`. Unparsable values are
    /// ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("TCP_BUTTONS_BIND") {
            self.bind_address = bind;
        }

        if let Some(port) = lookup("TCP_BUTTONS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            }
        }

        if let Some(max_clients) = lookup("TCP_BUTTONS_MAX_CLIENTS") {
            if let Ok(max) = max_clients.parse::<usize>() {
                self.max_clients = max;
            }
        }

        if let Some(prompt) = lookup("TCP_BUTTONS_PROMPT") {
            self.prompt = prompt;
        }
    }

    /// Reject configurations the panel cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            bail!("max_clients must be at least 1");
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for button in &self.buttons {
            if button.name.trim().is_empty() {
                bail!("Button {} has an empty name", button.id);
            }
            if !ids.insert(button.id) {
                bail!("Duplicate button id: {}", button.id);
            }
            if !names.insert(button.name.as_str()) {
                bail!("Duplicate button name: {}", button.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 9023);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.max_clients, 32);
        assert_eq!(config.volume_step, 5459);
        assert_eq!(config.buttons.len(), 10);
        assert_eq!(
            config.buttons.iter().filter(|b| b.role.is_volume()).count(),
            2
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"port": 4000, "buttons": [{"id": 5, "name": "Lights"}]}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.buttons, vec![DeviceButton::new(5, "Lights")]);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TCP_BUTTONS_PORT", "9100"),
            ("TCP_BUTTONS_BIND", "127.0.0.1"),
            ("TCP_BUTTONS_MAX_CLIENTS", "not-a-number"),
            ("TCP_BUTTONS_PROMPT", "LOBBY"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.port, 9100);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.max_clients, DEFAULT_MAX_CLIENTS);
        assert_eq!(config.prompt, "LOBBY");
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = Config {
            buttons: vec![DeviceButton::new(1, "A"), DeviceButton::new(1, "B")],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.buttons = vec![DeviceButton::new(1, "A"), DeviceButton::new(2, "A")];
        assert!(config.validate().is_err());

        config.buttons = vec![DeviceButton::new(1, "A"), DeviceButton::new(2, "B")];
        config.validate().unwrap();
    }
}
