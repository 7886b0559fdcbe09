//! Optional settings file and environment overrides for sysdeck.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "sysdeck";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors returned while reading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid YAML for [`Settings`].
    #[error("invalid settings in {path}: {message}")]
    Parse { path: String, message: String },
    /// No platform config directory could be determined.
    #[error("unable to determine config directory")]
    NoConfigDir,
}

/// When to emit ANSI colour.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColorChoice {
    /// Colour when writing to a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

/// Whether Linux package-manager calls go through `sudo`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SudoChoice {
    /// Use sudo when it exists and the user is not root.
    #[default]
    Auto,
    Always,
    Never,
}

/// Resolved settings passed to components at construction.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Fuzzy picker executable.
    pub picker: String,
    /// Preview formatter candidates, first available wins. Empty disables formatting.
    pub formatter: Vec<String>,
    pub color: ColorChoice,
    pub sudo: SudoChoice,
    /// Tracing filter directive, e.g. `debug` or `sd_core=trace`.
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            picker: "fzf".into(),
            formatter: vec!["bat".into(), "batcat".into()],
            color: ColorChoice::Auto,
            sudo: SudoChoice::Auto,
            log_level: None,
        }
    }
}

impl Settings {
    /// Apply `SYSDECK_PICKER`, `SYSDECK_FORMATTER` and `NO_COLOR`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(picker) = lookup("SYSDECK_PICKER").filter(|value| !value.trim().is_empty()) {
            self.picker = picker.trim().to_string();
        }
        if let Some(formatter) = lookup("SYSDECK_FORMATTER") {
            let candidates: Vec<String> = formatter
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect();
            if !candidates.is_empty() {
                self.formatter = candidates;
            }
        }
        if lookup("NO_COLOR").is_some_and(|value| !value.is_empty()) {
            self.color = ColorChoice::Never;
        }
    }

    /// Whether output should carry ANSI colour.
    pub fn use_color(&self, is_terminal: bool) -> bool {
        match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => is_terminal,
        }
    }

    /// Whether package-manager calls should be run through sudo.
    pub fn elevate(&self, sudo_available: bool, user: Option<&str>) -> bool {
        match self.sudo {
            SudoChoice::Always => true,
            SudoChoice::Never => false,
            SudoChoice::Auto => sudo_available && user != Some("root"),
        }
    }
}

/// Location of the settings file (`SYSDECK_CONFIG` wins).
pub fn config_path() -> ConfigResult<PathBuf> {
    if let Ok(value) = std::env::var("SYSDECK_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Read settings from `path`, falling back to defaults when it is absent.
pub fn load_settings_from(path: &Path) -> ConfigResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Settings from the config file with environment overrides applied.
pub fn load_settings() -> ConfigResult<Settings> {
    let path = match config_path() {
        Ok(path) => Some(path),
        Err(ConfigError::NoConfigDir) => None,
        Err(err) => return Err(err),
    };
    let mut settings = match path {
        Some(path) => load_settings_from(&path)?,
        None => Settings::default(),
    };
    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let settings = load_settings_from(&temp.path().join("config.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.formatter, vec!["bat", "batcat"]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.yaml");
        fs::write(&path, "picker: sk\nsudo: never\n").unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.picker, "sk");
        assert_eq!(settings.sudo, SudoChoice::Never);
        assert_eq!(settings.color, ColorChoice::Auto);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.yaml");
        fs::write(&path, "color: sometimes\n").unwrap();
        assert!(matches!(load_settings_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn full_file_is_parsed() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            "picker: fzf\nformatter: [batcat]\ncolor: always\nsudo: always\nlog_level: debug\n",
        )
        .unwrap();

        let expected = Settings {
            formatter: vec!["batcat".into()],
            color: ColorChoice::Always,
            sudo: SudoChoice::Always,
            log_level: Some("debug".into()),
            ..Settings::default()
        };
        assert_eq!(load_settings_from(&path).unwrap(), expected);
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SYSDECK_PICKER", " sk "),
            ("SYSDECK_FORMATTER", "batcat, bat"),
            ("NO_COLOR", "1"),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::default();
        settings.apply_env(|key| env.get(key).map(|value| (*value).to_string()));

        assert_eq!(settings.picker, "sk");
        assert_eq!(settings.formatter, vec!["batcat", "bat"]);
        assert!(!settings.use_color(true));
    }

    #[test]
    fn elevation_rules() {
        let settings = Settings::default();
        assert!(settings.elevate(true, Some("dev")));
        assert!(!settings.elevate(true, Some("root")));
        assert!(!settings.elevate(false, Some("dev")));

        let never = Settings {
            sudo: SudoChoice::Never,
            ..Settings::default()
        };
        assert!(!never.elevate(true, Some("dev")));
    }
}
