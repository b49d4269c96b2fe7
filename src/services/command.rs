use crate::models::{CitationMode, EffectiveSettings, EngineVersion};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

/// Appended to every document so citeproc has a place to put the reference list.
pub const BIBLIOGRAPHY_TRAILER: &str = "\n\n# Bibliography";

/// Oldest engine supporting every flag the builder emits.
pub const REQUIRED_ENGINE_VERSION: EngineVersion = EngineVersion::new(2, 18, 0);

/// Metadata key read by the live citations Lua filter.
const LIVE_CITATION_STYLE_KEY: &str = "zotero_csl_style";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to read {path}: {source}")]
    ReadInput {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Input path has no file name: {0}")]
    NoFileName(Utf8PathBuf),
}

/// Everything needed to run the engine once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub args: Vec<String>,
    /// Document text written to the engine's stdin.
    pub stdin_payload: Vec<u8>,
    pub output_file: Utf8PathBuf,
}

/// Turns a settings snapshot into Pandoc arguments and stdin payload.
///
/// Arguments are emitted in a fixed order:
///
/// 1. `--standalone`
/// 2. live citations: `--lua-filter <filter>`, `--metadata zotero_csl_style=<style>`
/// 3. plain citations: `--citeproc`, `--bibliography <bib>`, `--csl <csl>`
/// 4. docx output: `--reference-doc <template>`
/// 5. `--resource-path <input dir>`
/// 6. `--from <processor><extensions>`
/// 7. `--to <format>`
/// 8. `--output <file>`
///
/// The builder holds no state beyond the filter path, so identical inputs always
/// give identical invocations.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    live_citation_filter: Utf8PathBuf,
}

impl CommandBuilder {
    pub fn new(live_citation_filter: impl Into<Utf8PathBuf>) -> Self {
        Self {
            live_citation_filter: live_citation_filter.into(),
        }
    }

    /// Minimum engine version for the flags above (`--citeproc` and friends).
    pub fn required_engine_version(&self) -> EngineVersion {
        REQUIRED_ENGINE_VERSION
    }

    /// `{output dir}/{input stem}.{format}`
    pub fn output_path(
        &self,
        file_path: &Utf8Path,
        settings: &EffectiveSettings,
    ) -> Result<Utf8PathBuf, BuildError> {
        let stem = file_path
            .file_stem()
            .ok_or_else(|| BuildError::NoFileName(file_path.to_path_buf()))?;

        Ok(settings
            .resolved_output_directory(file_path)
            .join(format!("{}.{}", stem, settings.output_format)))
    }

    /// Argument list for converting `file_path` with `settings`.
    pub fn build_args(
        &self,
        file_path: &Utf8Path,
        settings: &EffectiveSettings,
    ) -> Result<Vec<String>, BuildError> {
        let output_file = self.output_path(file_path, settings)?;
        let resource_dir = file_path.parent().unwrap_or(Utf8Path::new("."));

        let mut args = vec!["--standalone".to_string()];

        match settings.mode {
            CitationMode::LiveCitations => {
                args.push("--lua-filter".to_string());
                args.push(self.live_citation_filter.to_string());
                args.push("--metadata".to_string());
                args.push(format!(
                    "{}={}",
                    LIVE_CITATION_STYLE_KEY, settings.live_citation_csl_name
                ));
            }
            CitationMode::PlainCitations => {
                args.push("--citeproc".to_string());
                args.push("--bibliography".to_string());
                args.push(settings.bibliography_file.to_string());
                args.push("--csl".to_string());
                args.push(settings.csl_file.to_string());
            }
        }

        if settings.writes_docx() {
            args.push("--reference-doc".to_string());
            args.push(settings.reference_doc_file.to_string());
        }

        args.push("--resource-path".to_string());
        args.push(resource_dir.to_string());

        args.push("--from".to_string());
        args.push(settings.source_format());

        args.push("--to".to_string());
        args.push(settings.output_format.clone());

        args.push("--output".to_string());
        args.push(output_file.to_string());

        Ok(args)
    }

    /// Read the document, append the bibliography heading and assemble the arguments.
    pub fn build(
        &self,
        file_path: &Utf8Path,
        settings: &EffectiveSettings,
    ) -> Result<EngineInvocation, BuildError> {
        let mut stdin_payload = fs::read(file_path).map_err(|source| BuildError::ReadInput {
            path: file_path.to_path_buf(),
            source,
        })?;
        stdin_payload.extend_from_slice(BIBLIOGRAPHY_TRAILER.as_bytes());

        let args = self.build_args(file_path, settings)?;
        let output_file = self.output_path(file_path, settings)?;

        tracing::debug!(
            "Built invocation for {}: {} args, {} bytes of input",
            file_path,
            args.len(),
            stdin_payload.len()
        );

        Ok(EngineInvocation {
            args,
            stdin_payload,
            output_file,
        })
    }
}
