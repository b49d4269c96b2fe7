use camino::Utf8PathBuf;
use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from `docdown.yaml` and the environment.
///
/// This is the runtime wiring of the application (where assets live, where logs
/// go). User preferences such as the bibliography file live in the
/// [`SettingsStore`](crate::config::SettingsStore) instead.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the bundled engine, CSL styles, reference docs and filters.
    pub assets_dir: Utf8PathBuf,

    pub log_dir: Utf8PathBuf,

    pub log_prefix: String,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default)]
    pub console_logging: bool,

    /// Preferences file. Empty means the platform config directory.
    #[serde(default)]
    pub settings_file: Option<Utf8PathBuf>,

    pub engine: EngineConfig,
}

/// How the conversion engine is found and supervised.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Name looked up on the search path when the system engine is selected.
    pub binary_name: String,

    /// Extra directories appended to `PATH` when probing for the system engine.
    #[serde(default)]
    pub extra_search_dirs: Vec<Utf8PathBuf>,

    /// Seconds before a running engine is killed. `0` disables the limit.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl EngineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

impl AppConfig {
    /// Path of the engine binary shipped inside the assets directory.
    pub fn bundled_engine_path(&self) -> Utf8PathBuf {
        let name = if cfg!(target_os = "windows") {
            format!("{}.exe", self.engine.binary_name)
        } else {
            self.engine.binary_name.clone()
        };
        self.assets_dir.join("bin").join(name)
    }

    /// Lua filter used in live citations mode.
    pub fn live_citation_filter_path(&self) -> Utf8PathBuf {
        self.assets_dir.join("filters").join("zotero.lua")
    }

    pub fn default_csl_path(&self) -> Utf8PathBuf {
        self.assets_dir
            .join("csl")
            .join("chicago-note-bibliography.csl")
    }

    pub fn default_reference_doc_path(&self) -> Utf8PathBuf {
        self.assets_dir
            .join("docx")
            .join("pandoc-default-reference.docx")
    }
}
