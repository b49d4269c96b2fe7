//! Configuration for DocDown.
//!
//! Two separate layers live here:
//!
//! - [`Loader`] builds the [`AppConfig`] (assets, logs, engine lookup) from the
//!   embedded `defaults/docdown.default.yaml`, an optional user file and
//!   `DOCDOWN__*` environment variables.
//! - [`YamlSettingsStore`] holds the user's preferences in `defaults`/`user`
//!   tiers, and [`ConfigurationResolver`] turns them into an
//!   [`EffectiveSettings`](crate::models::EffectiveSettings) snapshot per conversion.

pub mod resolver;
pub mod store;

pub use resolver::ConfigurationResolver;
pub use store::{
    SettingChange, SettingsLayers, SettingsStore, StoreError, Tier, YamlSettingsStore,
    default_preferences, set_preference,
};

use crate::models::AppConfig;
use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, ValueKind};

const DEFAULT_YAML: &str = include_str!("../../defaults/docdown.default.yaml");

/// Layers user overrides over the built-in application defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_YAML, FileFormat::Yaml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Utf8Path>) -> Self {
        let source = File::new(path.as_ref().as_str(), FileFormat::Yaml).required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Utf8Path>) -> Self {
        let source = File::new(path.as_ref().as_str(), FileFormat::Yaml).required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer `DOCDOWN__SECTION__KEY` environment variables.
    pub fn with_environment(mut self) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix("DOCDOWN")
                .separator("__")
                .try_parsing(true),
        );
        self
    }

    /// Apply a single key/value override (command line flags).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load the application configuration the way the binary does.
///
/// `config_file`, when given, must exist. Otherwise `docdown.yaml` in the
/// platform config directory is layered if present.
pub fn load_app_config(config_file: Option<&Utf8Path>, debug: bool) -> Result<AppConfig> {
    let mut loader = Loader::new();

    match config_file {
        Some(path) => loader = loader.with_file(path),
        None => {
            if let Some(dir) = config_dir() {
                loader = loader.with_optional_file(dir.join("docdown.yaml"));
            }
        }
    }

    loader = loader.with_environment();

    if debug {
        loader = loader
            .set_override("debug_mode", true)
            .context("Failed to apply debug override")?;
    }

    let mut config = loader.build().context("Failed to load application configuration")?;

    // Assets and logs live next to the executable, not the working directory
    if let Some(exe_dir) = executable_dir() {
        anchor_relative_dirs(&mut config, &exe_dir);
    }

    tracing::debug!("Application configuration: {:?}", config);
    Ok(config)
}

/// Join relative `assets_dir` and `log_dir` onto `base`. Absolute paths are kept.
pub fn anchor_relative_dirs(config: &mut AppConfig, base: &Utf8Path) {
    if config.assets_dir.is_relative() {
        config.assets_dir = base.join(&config.assets_dir);
    }
    if config.log_dir.is_relative() {
        config.log_dir = base.join(&config.log_dir);
    }
}

fn executable_dir() -> Option<Utf8PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let exe = Utf8PathBuf::from_path_buf(exe).ok()?;
    exe.parent().map(Utf8Path::to_path_buf)
}

/// `<platform config dir>/docdown`
pub fn config_dir() -> Option<Utf8PathBuf> {
    dirs::config_dir()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .map(|dir| dir.join("docdown"))
}

/// The user's home directory, used as the default output directory.
pub fn home_dir() -> Result<Utf8PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Utf8PathBuf::from_path_buf(home)
        .map_err(|path| anyhow!("Home directory is not valid UTF-8: {}", path.display()))
}

/// Where preferences are stored: the configured file, or `settings.yaml` in
/// the platform config directory.
pub fn settings_path(app_config: &AppConfig) -> Result<Utf8PathBuf> {
    if let Some(path) = app_config
        .settings_file
        .as_ref()
        .filter(|path| !path.as_str().is_empty())
    {
        return Ok(path.clone());
    }

    config_dir()
        .map(|dir| dir.join("settings.yaml"))
        .ok_or_else(|| anyhow!("Could not determine configuration directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_loads_embedded_defaults() {
        let config = Loader::new().build().expect("defaults to deserialize");

        assert_eq!(config.assets_dir, Utf8PathBuf::from("assets"));
        assert_eq!(config.engine.binary_name, "pandoc");
        assert_eq!(config.engine.timeout_secs, 600);
        assert!(
            config
                .engine
                .extra_search_dirs
                .contains(&Utf8PathBuf::from("/usr/local/bin"))
        );
        assert!(!config.debug_mode);
        assert!(config.settings_file.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("docdown.yaml")).unwrap();
        fs::write(
            &path,
            "assets_dir: /opt/docdown/assets\nengine:\n  timeout_secs: 30\n",
        )
        .unwrap();

        let config = Loader::new().with_file(&path).build().unwrap();
        assert_eq!(config.assets_dir, Utf8PathBuf::from("/opt/docdown/assets"));
        assert_eq!(config.engine.timeout_secs, 30);
        // Untouched keys keep their defaults
        assert_eq!(config.engine.binary_name, "pandoc");
    }

    #[test]
    fn test_missing_optional_file_is_ignored() {
        let config = Loader::new()
            .with_optional_file("/definitely/not/here/docdown.yaml")
            .build()
            .unwrap();
        assert_eq!(config.log_prefix, "docdown");
    }

    #[test]
    fn test_missing_required_file_fails() {
        let result = Loader::new()
            .with_file("/definitely/not/here/docdown.yaml")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_override() {
        let config = Loader::new()
            .set_override("debug_mode", true)
            .unwrap()
            .build()
            .unwrap();
        assert!(config.debug_mode);
    }

    #[test]
    fn test_relative_dirs_anchor_to_base() {
        let mut config = Loader::new().build().unwrap();
        anchor_relative_dirs(&mut config, Utf8Path::new("/opt/docdown"));

        assert_eq!(config.assets_dir, Utf8PathBuf::from("/opt/docdown/assets"));
        assert_eq!(config.log_dir, Utf8PathBuf::from("/opt/docdown/logs"));
    }

    #[test]
    fn test_absolute_dirs_are_kept() {
        let mut config = Loader::new().build().unwrap();
        config.assets_dir = Utf8PathBuf::from("/srv/assets");
        config.log_dir = Utf8PathBuf::from("/var/log/docdown");
        anchor_relative_dirs(&mut config, Utf8Path::new("/opt/docdown"));

        assert_eq!(config.assets_dir, Utf8PathBuf::from("/srv/assets"));
        assert_eq!(config.log_dir, Utf8PathBuf::from("/var/log/docdown"));
    }

    #[test]
    fn test_settings_path_prefers_configured_file() {
        let mut config = Loader::new().build().unwrap();
        config.settings_file = Some(Utf8PathBuf::from("/tmp/prefs.yaml"));
        assert_eq!(
            settings_path(&config).unwrap(),
            Utf8PathBuf::from("/tmp/prefs.yaml")
        );
    }
}
