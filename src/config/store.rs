// Layered preferences store
//
// Preferences are kept in two tiers, `defaults` and `user`, persisted together in
// one YAML file. Keys are addressed with a tier prefix (`user.cslFile`). Writers
// go through `set`, which persists the file and emits a `SettingChange` so open
// preference windows can refresh.

use crate::models::{AppConfig, SettingValue, keys, sanitize_extension_flags};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors raised by the preferences store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid preference key '{0}': expected 'defaults.<name>' or 'user.<name>'")]
    InvalidKey(String),

    #[error("Failed to read preferences file {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write preferences file {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse preferences file {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        source: serde_yaml_ng::Error,
    },

    #[error("Failed to serialize preferences: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),
}

/// The two overlays of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Defaults,
    User,
}

impl Tier {
    pub fn prefix(&self) -> &'static str {
        match self {
            Tier::Defaults => "defaults",
            Tier::User => "user",
        }
    }

    /// The fully qualified key for `name` in this tier.
    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.prefix(), name)
    }
}

/// Split `user.cslFile` into its tier and name.
pub fn split_key(key: &str) -> Result<(Tier, &str), StoreError> {
    let (prefix, name) = key
        .split_once('.')
        .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;

    if name.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }

    match prefix {
        "defaults" => Ok((Tier::Defaults, name)),
        "user" => Ok((Tier::User, name)),
        _ => Err(StoreError::InvalidKey(key.to_string())),
    }
}

/// Everything in the store, as persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsLayers {
    #[serde(default)]
    pub defaults: IndexMap<String, SettingValue>,

    #[serde(default)]
    pub user: IndexMap<String, SettingValue>,
}

impl SettingsLayers {
    fn tier(&self, tier: Tier) -> &IndexMap<String, SettingValue> {
        match tier {
            Tier::Defaults => &self.defaults,
            Tier::User => &self.user,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut IndexMap<String, SettingValue> {
        match tier {
            Tier::Defaults => &mut self.defaults,
            Tier::User => &mut self.user,
        }
    }
}

/// Event emitted after a preference was written
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    /// Fully qualified key, e.g. `user.bibliographyFile`
    pub key: String,
    pub value: SettingValue,
}

/// Layered key-value preferences store.
///
/// Implementations handle their own synchronization; every method takes `&self`.
pub trait SettingsStore: Send + Sync {
    /// Read a fully qualified key such as `user.cslFile`.
    fn get(&self, key: &str) -> Option<SettingValue>;

    /// Write a fully qualified key. Values are stored as given.
    fn set(&self, key: &str, value: SettingValue) -> Result<(), StoreError>;

    /// Snapshot of both tiers.
    fn get_all(&self) -> SettingsLayers;
}

/// YAML-backed [`SettingsStore`].
///
/// The file is rewritten on every `set`. A store created with
/// [`in_memory`](Self::in_memory) never touches the filesystem.
pub struct YamlSettingsStore {
    path: Option<Utf8PathBuf>,
    layers: RwLock<SettingsLayers>,
    change_tx: broadcast::Sender<SettingChange>,
}

impl YamlSettingsStore {
    /// Open the preferences file at `path`, starting empty if it does not exist yet.
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let layers = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;

            if contents.trim().is_empty() {
                SettingsLayers::default()
            } else {
                serde_yaml_ng::from_str(&contents).map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            tracing::info!("Preferences file not found at {}, starting empty", path);
            SettingsLayers::default()
        };

        tracing::info!(
            "Loaded preferences from {} ({} defaults, {} user)",
            path,
            layers.defaults.len(),
            layers.user.len()
        );

        Ok(Self::with_layers(Some(path), layers))
    }

    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_layers(None, SettingsLayers::default())
    }

    fn with_layers(path: Option<Utf8PathBuf>, layers: SettingsLayers) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            path,
            layers: RwLock::new(layers),
            change_tx,
        }
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Subscribe to preference writes.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.change_tx.subscribe()
    }

    /// Insert every entry of `defaults` that the `defaults` tier does not have yet.
    ///
    /// Returns `true` when the store had no defaults at all, i.e. this is the
    /// first launch.
    pub fn seed_defaults(
        &self,
        defaults: IndexMap<String, SettingValue>,
    ) -> Result<bool, StoreError> {
        let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        let first_run = !layers.defaults.contains_key(keys::OUTPUT_DIRECTORY);

        let mut updated = layers.clone();
        let mut added = 0;
        for (name, value) in defaults {
            if !updated.defaults.contains_key(&name) {
                tracing::debug!("Seeding default {} = {}", name, value);
                updated.defaults.insert(name, value);
                added += 1;
            }
        }

        if added > 0 {
            // Memory only changes once the file is written
            self.persist(&updated)?;
            *layers = updated;
            tracing::info!("Seeded {} default preferences (first run: {})", added, first_run);
        }

        Ok(first_run)
    }

    fn persist(&self, layers: &SettingsLayers) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        let yaml = serde_yaml_ng::to_string(layers)?;
        fs::write(path, yaml).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Saved preferences to {}", path);
        Ok(())
    }
}

impl SettingsStore for YamlSettingsStore {
    fn get(&self, key: &str) -> Option<SettingValue> {
        let (tier, name) = split_key(key).ok()?;
        let layers = self.layers.read().unwrap_or_else(PoisonError::into_inner);
        layers.tier(tier).get(name).cloned()
    }

    fn set(&self, key: &str, value: SettingValue) -> Result<(), StoreError> {
        let (tier, name) = split_key(key)?;

        {
            let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
            let mut updated = layers.clone();
            updated.tier_mut(tier).insert(name.to_string(), value.clone());
            self.persist(&updated)?;
            *layers = updated;
        }

        tracing::info!("Preference {} is now: {}", key, value);

        // Nobody listening is fine
        let _ = self.change_tx.send(SettingChange {
            key: key.to_string(),
            value,
        });

        Ok(())
    }

    fn get_all(&self) -> SettingsLayers {
        self.layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Write a user preference, the way the preferences window does.
///
/// `name` is the bare key (`pandocExtensions`); it is stored under `user.`.
/// Markdown extension flags are sanitized here, so every reader can trust them.
pub fn set_preference(
    store: &dyn SettingsStore,
    name: &str,
    value: SettingValue,
) -> Result<(), StoreError> {
    let value = if name == keys::PANDOC_EXTENSIONS {
        SettingValue::Text(sanitize_extension_flags(&value.as_text()))
    } else {
        value
    };

    store.set(&Tier::User.key(name), value)
}

/// Built-in defaults written to the `defaults` tier on first launch.
pub fn default_preferences(
    app_config: &AppConfig,
    home_dir: &Utf8Path,
) -> IndexMap<String, SettingValue> {
    let mut defaults = IndexMap::new();

    defaults.insert(keys::MODE.to_string(), "plainCitations".into());
    defaults.insert(keys::OUTPUT_FORMAT.to_string(), "docx".into());
    defaults.insert(
        keys::LIVE_CITATIONS_CSL.to_string(),
        "chicago-note-bibliography".into(),
    );
    defaults.insert(keys::EXPORT_TO_INPUT_DIRECTORY.to_string(), false.into());
    defaults.insert(keys::OUTPUT_DIRECTORY.to_string(), home_dir.as_str().into());
    defaults.insert(keys::BIBLIOGRAPHY_FILE.to_string(), "".into());
    defaults.insert(
        keys::CSL_FILE.to_string(),
        app_config.default_csl_path().as_str().into(),
    );
    defaults.insert(
        keys::DOCX_FILE.to_string(),
        app_config.default_reference_doc_path().as_str().into(),
    );
    defaults.insert(keys::MARKDOWN_PROCESSOR.to_string(), "markdown".into());
    defaults.insert(
        keys::PANDOC_EXTENSIONS.to_string(),
        "+smart+escaped_line_breaks".into(),
    );
    defaults.insert(keys::USE_BUNDLED_PANDOC.to_string(), true.into());

    defaults
}
