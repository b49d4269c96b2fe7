use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preference keys understood by the configuration resolver.
///
/// Each key lives under both the `defaults.` and `user.` tiers of the store.
pub mod keys {
    pub const MODE: &str = "mode";
    pub const OUTPUT_FORMAT: &str = "outputFormat";
    pub const LIVE_CITATIONS_CSL: &str = "liveCitationsModeCitationFormat";
    pub const EXPORT_TO_INPUT_DIRECTORY: &str = "exportToInputDirectory";
    pub const OUTPUT_DIRECTORY: &str = "outputDirectory";
    pub const BIBLIOGRAPHY_FILE: &str = "bibliographyFile";
    pub const CSL_FILE: &str = "cslFile";
    pub const DOCX_FILE: &str = "docxFile";
    pub const MARKDOWN_PROCESSOR: &str = "markdownProcessor";
    pub const PANDOC_EXTENSIONS: &str = "pandocExtensions";
    pub const USE_BUNDLED_PANDOC: &str = "useBundledPandoc";
    pub const LAST_CONVERTED_FILE: &str = "lastConvertedFile";

    /// All keys the resolver reads, in the order they are shown to users.
    pub const ALL: &[&str] = &[
        MODE,
        OUTPUT_FORMAT,
        LIVE_CITATIONS_CSL,
        EXPORT_TO_INPUT_DIRECTORY,
        OUTPUT_DIRECTORY,
        BIBLIOGRAPHY_FILE,
        CSL_FILE,
        DOCX_FILE,
        MARKDOWN_PROCESSOR,
        PANDOC_EXTENSIONS,
        USE_BUNDLED_PANDOC,
        LAST_CONVERTED_FILE,
    ];
}

/// A single stored preference value.
///
/// The store only ever holds text and flags; paths are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Flag(bool),
    Text(String),
}

impl SettingValue {
    /// Text view of the value. Flags render as `true`/`false`.
    pub fn as_text(&self) -> String {
        match self {
            SettingValue::Flag(flag) => flag.to_string(),
            SettingValue::Text(text) => text.clone(),
        }
    }

    /// Flag view of the value. Text is truthy only when it spells `true`.
    pub fn as_flag(&self) -> bool {
        match self {
            SettingValue::Flag(flag) => *flag,
            SettingValue::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        }
    }

    /// Parse command-line input: `true`/`false` become flags, anything else text.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "true" => SettingValue::Flag(true),
            "false" => SettingValue::Flag(false),
            _ => SettingValue::Text(raw.to_string()),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Flag(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Which citation pipeline a conversion uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CitationMode {
    /// Citations resolved from a local bibliography and CSL file via citeproc.
    #[default]
    PlainCitations,
    /// Citations left to the reference manager through the bundled Lua filter.
    LiveCitations,
}

impl CitationMode {
    /// Interpret the stored `mode` preference. Unknown values fall back to plain citations.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "livecitations" | "live" | "zotero" => CitationMode::LiveCitations,
            "plaincitations" | "plain" | "" => CitationMode::PlainCitations,
            other => {
                tracing::warn!("Unknown citation mode '{}', using plain citations", other);
                CitationMode::PlainCitations
            }
        }
    }
}

/// Where the engine binary comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineSource {
    /// The copy packaged with the application.
    #[default]
    Bundled,
    /// Whatever `pandoc` is found on the executable search path.
    System,
}

impl EngineSource {
    pub fn from_use_bundled(use_bundled: bool) -> Self {
        if use_bundled {
            EngineSource::Bundled
        } else {
            EngineSource::System
        }
    }
}

/// Strip every character outside `[A-Za-z_+-]` from markdown extension flags.
///
/// Applied on the preference write path so nothing else can reach the
/// engine's command line through this setting.
pub fn sanitize_extension_flags(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphabetic() || matches!(c, '_' | '+' | '-'))
        .collect()
}

/// Fully typed settings snapshot for one conversion attempt.
///
/// Built once by [`ConfigurationResolver`](crate::config::ConfigurationResolver)
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EffectiveSettings {
    pub mode: CitationMode,
    pub output_format: String,
    pub output_directory: Utf8PathBuf,
    pub export_to_input_directory: bool,
    pub bibliography_file: Utf8PathBuf,
    pub csl_file: Utf8PathBuf,
    pub reference_doc_file: Utf8PathBuf,
    pub markdown_processor: String,
    pub markdown_extensions: String,
    pub live_citation_csl_name: String,
    pub engine_source: EngineSource,
}

impl EffectiveSettings {
    /// Names of the required settings that are empty for the current mode.
    ///
    /// An empty result means the snapshot can be handed to the command builder.
    /// When `export_to_input_directory` is set the output directory comes from the
    /// input file and is never reported missing. The reference document is needed
    /// in plain citations mode and for every docx conversion.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();

        if self.output_format.is_empty() {
            missing.push("output format");
        }

        if !self.export_to_input_directory && self.output_directory.as_str().is_empty() {
            missing.push("output directory");
        }

        let plain = self.mode == CitationMode::PlainCitations;
        if plain {
            if self.bibliography_file.as_str().is_empty() {
                missing.push("bibliography file");
            }
            if self.csl_file.as_str().is_empty() {
                missing.push("citation style (CSL) file");
            }
        }

        if (plain || self.writes_docx()) && self.reference_doc_file.as_str().is_empty() {
            missing.push("reference document");
        }

        if self.markdown_processor.is_empty() {
            missing.push("Markdown processor");
        }

        missing
    }

    /// Whether the engine is asked for a Word document (and so a reference doc).
    pub fn writes_docx(&self) -> bool {
        self.output_format == "docx"
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Directory the output document is written to for `input`.
    pub fn resolved_output_directory(&self, input: &Utf8Path) -> Utf8PathBuf {
        if self.export_to_input_directory {
            input
                .parent()
                .map(Utf8Path::to_path_buf)
                .unwrap_or_default()
        } else {
            self.output_directory.clone()
        }
    }

    /// Source-format identifier handed to the engine, e.g. `markdown+smart`.
    pub fn source_format(&self) -> String {
        format!("{}{}", self.markdown_processor, self.markdown_extensions)
    }
}
