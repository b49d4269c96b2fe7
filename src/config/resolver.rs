use super::store::{SettingsStore, StoreError, Tier};
use crate::models::{CitationMode, EffectiveSettings, EngineSource, SettingValue, keys};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

/// Merges the `user` tier over the `defaults` tier into [`EffectiveSettings`].
///
/// The resolver is the only component holding the preferences store. Conversions
/// see nothing but the snapshots it produces, plus the single "last converted
/// file" write-back.
#[derive(Clone)]
pub struct ConfigurationResolver {
    store: Arc<dyn SettingsStore>,
}

impl ConfigurationResolver {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// `user.<name>` if present, else `defaults.<name>`.
    pub fn lookup(&self, name: &str) -> Option<SettingValue> {
        self.store
            .get(&Tier::User.key(name))
            .or_else(|| self.store.get(&Tier::Defaults.key(name)))
    }

    fn text(&self, name: &str) -> String {
        self.lookup(name)
            .map(|value| value.as_text())
            .unwrap_or_default()
    }

    fn flag(&self, name: &str) -> bool {
        self.lookup(name)
            .map(|value| value.as_flag())
            .unwrap_or(false)
    }

    fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(self.text(name))
    }

    /// Build a fresh settings snapshot.
    ///
    /// Missing keys become empty strings or `false`; completeness is checked by
    /// the caller. Extension flags are taken as stored.
    pub fn resolve(&self) -> EffectiveSettings {
        let settings = EffectiveSettings {
            mode: CitationMode::from_setting(&self.text(keys::MODE)),
            output_format: self.text(keys::OUTPUT_FORMAT),
            output_directory: self.path(keys::OUTPUT_DIRECTORY),
            export_to_input_directory: self.flag(keys::EXPORT_TO_INPUT_DIRECTORY),
            bibliography_file: self.path(keys::BIBLIOGRAPHY_FILE),
            csl_file: self.path(keys::CSL_FILE),
            reference_doc_file: self.path(keys::DOCX_FILE),
            markdown_processor: self.text(keys::MARKDOWN_PROCESSOR),
            markdown_extensions: self.text(keys::PANDOC_EXTENSIONS),
            live_citation_csl_name: self.text(keys::LIVE_CITATIONS_CSL),
            engine_source: EngineSource::from_use_bundled(self.flag(keys::USE_BUNDLED_PANDOC)),
        };

        tracing::debug!("Resolved settings: {:?}", settings);
        settings
    }

    /// The file most recently converted successfully, if any.
    pub fn last_converted_file(&self) -> Option<Utf8PathBuf> {
        self.store
            .get(&Tier::User.key(keys::LAST_CONVERTED_FILE))
            .map(|value| value.as_text())
            .filter(|path| !path.is_empty())
            .map(Utf8PathBuf::from)
    }

    /// Remember `path` for "convert again".
    pub fn record_last_converted(&self, path: &Utf8Path) -> Result<(), StoreError> {
        self.store.set(
            &Tier::User.key(keys::LAST_CONVERTED_FILE),
            path.as_str().into(),
        )
    }
}
