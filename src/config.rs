//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/bomgraph/bomgraph.toml`
//! 3. Local config: `./bomgraph.toml`
//! 4. Environment variables: `BOMGRAPH_*` prefix
//! 5. Command line flags (applied by the CLI via [`Settings::with_overrides`])

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// File name of global and local config files.
pub const CONFIG_FILE_NAME: &str = "bomgraph.toml";

/// Unified configuration for bomgraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Build the built-in sample tree instead of reading an input file
    pub builtin: bool,
    /// Serialized object tree to restore
    pub input: Option<PathBuf>,
    /// Log file; logs go to stderr when unset
    pub log_file: Option<PathBuf>,
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub builtin: Option<bool>,
    pub input: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

/// Get the XDG config directory for bomgraph.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "bomgraph").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Get the path to the local config file in `dir`.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand `~`, `$VAR` and `${VAR}` in a path.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    /// Overlay wins for every field it specifies.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            builtin: overlay.builtin.unwrap_or(self.builtin),
            input: overlay.input.clone().or_else(|| self.input.clone()),
            log_file: overlay.log_file.clone().or_else(|| self.log_file.clone()),
        }
    }

    fn expand_paths(&mut self) {
        self.input = self.input.as_deref().map(expand_path);
        self.log_file = self.log_file.as_deref().map(expand_path);
    }

    /// Load settings from the default locations (global XDG file, then
    /// `bomgraph.toml` in the current directory, then environment).
    pub fn load() -> Result<Self, ApplicationError> {
        let local = std::env::current_dir()
            .ok()
            .map(|dir| local_config_path(&dir));
        Self::load_from(global_config_path().as_deref(), local.as_deref())
    }

    /// Load settings with layered precedence from explicit file locations.
    ///
    /// Missing files are skipped; unreadable or malformed files are errors.
    pub fn load_from(
        global: Option<&Path>,
        local: Option<&Path>,
    ) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        for path in [global, local].into_iter().flatten() {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        Ok(current)
    }

    /// Apply BOMGRAPH_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("BOMGRAPH").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("builtin") {
            settings.builtin = val;
        }
        if let Ok(val) = config.get_string("input") {
            settings.input = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("log_file") {
            settings.log_file = Some(PathBuf::from(val));
        }
        Ok(settings)
    }

    /// Apply command line flags on top of loaded settings.
    ///
    /// A given input file switches the built-in sample off unless `--builtin`
    /// is passed as well.
    pub fn with_overrides(
        mut self,
        builtin: bool,
        input: Option<PathBuf>,
        log_file: Option<PathBuf>,
    ) -> Self {
        if let Some(input) = input {
            self.input = Some(expand_path(&input));
            self.builtin = false;
        }
        if builtin {
            self.builtin = true;
        }
        if let Some(log_file) = log_file {
            self.log_file = Some(expand_path(&log_file));
        }
        self
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize settings: {}", e),
        })
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
