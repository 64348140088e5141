use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "snipmenu";
pub const LAUNCH_LIST_FILE_NAME: &str = "LaunchList.txt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_snippets_dir")]
    pub snippets_dir: PathBuf,
    #[serde(default)]
    pub theme: Theme,
    /// Capture and restore the foreground application around menu actions.
    #[serde(default = "default_focus_workaround")]
    pub focus_workaround: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snippets_dir: default_snippets_dir(),
            theme: Theme::default(),
            focus_workaround: default_focus_workaround(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/Library/Preferences` on macOS, the home directory elsewhere.
pub fn library_dir() -> PathBuf {
    let home = home_dir();
    if cfg!(target_os = "macos") {
        home.join("Library").join("Preferences")
    } else {
        home
    }
}

fn default_snippets_dir() -> PathBuf {
    library_dir().join(APP_NAME)
}

fn default_focus_workaround() -> bool {
    true
}

pub fn config_path() -> PathBuf {
    let mut root = home_dir();
    root.push(".config");
    root.push(APP_NAME);
    root.push("config.toml");
    root
}

pub fn launch_list_path() -> PathBuf {
    home_dir().join(LAUNCH_LIST_FILE_NAME)
}

pub fn load_or_init() -> Result<Settings, ConfigError> {
    load_or_init_at(&config_path())
}

/// Reads the settings file, writing the defaults first if it does not exist.
pub fn load_or_init_at(path: &Path) -> Result<Settings, ConfigError> {
    if path.exists() {
        let raw = fs::read_to_string(path)?;
        return Ok(toml::from_str(&raw)?);
    }
    let settings = Settings::default();
    save_at(path, &settings)?;
    Ok(settings)
}

pub fn save(settings: &Settings) -> Result<(), ConfigError> {
    save_at(&config_path(), settings)
}

pub fn save_at(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(settings)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_initialised_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let settings = load_or_init_at(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(load_or_init_at(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "theme = \"dark\"\n").unwrap();
        let settings = load_or_init_at(&path).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.focus_workaround);
        assert!(settings.snippets_dir.ends_with(APP_NAME));
    }

    #[test]
    fn saved_settings_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let settings = Settings {
            snippets_dir: dir.path().join("snips"),
            theme: Theme::Light,
            focus_workaround: false,
        };
        save_at(&path, &settings).unwrap();
        assert_eq!(load_or_init_at(&path).unwrap(), settings);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "theme = [[[").unwrap();
        assert!(matches!(load_or_init_at(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn launch_list_lives_in_home() {
        assert_eq!(
            launch_list_path().file_name().unwrap(),
            LAUNCH_LIST_FILE_NAME
        );
    }
}
