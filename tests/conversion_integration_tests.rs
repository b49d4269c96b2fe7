//! Integration tests for ConversionService
//!
//! These tests verify:
//! - Plain and live citation conversions end to end
//! - Rejections happen before any engine is spawned
//! - System engine lookup failures (missing, too old)
//! - Engine exit codes reach the user with their Pandoc meaning
//! - Real subprocess runs through TokioEngineRunner (Unix only)

use camino::{Utf8Path, Utf8PathBuf};
use docdown::config::{ConfigurationResolver, SettingsStore, YamlSettingsStore};
use docdown::models::{EngineVersion, SettingValue};
use docdown::services::{
    CommandBuilder, ConversionService, EngineExit, EngineInvocation, EngineLocator, EngineRunner,
    NotificationSink, RunError,
};
use docdown::ConversionOutcome;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
enum Notice {
    Success(String, String),
    Failure(String, String),
    Warning(String),
    Reveal(Utf8PathBuf),
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify_success(&self, title: &str, body: &str) {
        self.notices
            .lock()
            .unwrap()
            .push(Notice::Success(title.to_string(), body.to_string()));
    }

    fn notify_failure(&self, title: &str, body: &str) {
        self.notices
            .lock()
            .unwrap()
            .push(Notice::Failure(title.to_string(), body.to_string()));
    }

    fn warn_user(&self, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push(Notice::Warning(message.to_string()));
    }

    fn reveal_output(&self, output_file: &Utf8Path) {
        self.notices
            .lock()
            .unwrap()
            .push(Notice::Reveal(output_file.to_path_buf()));
    }
}

/// Records invocations and answers with a fixed exit code.
struct ScriptedRunner {
    exit_code: i32,
    calls: Mutex<Vec<(Utf8PathBuf, EngineInvocation)>>,
}

impl ScriptedRunner {
    fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(Utf8PathBuf, EngineInvocation)> {
        self.calls.lock().unwrap().clone()
    }
}

impl EngineRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &Utf8Path,
        invocation: &EngineInvocation,
    ) -> Result<EngineExit, RunError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), invocation.clone()));
        Ok(EngineExit {
            code: Some(self.exit_code),
            duration: Duration::from_millis(1),
        })
    }
}

struct Workspace {
    dir: TempDir,
    store: Arc<YamlSettingsStore>,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(YamlSettingsStore::in_memory());
        let workspace = Self { dir, store };

        let out = workspace.path("out");
        fs::create_dir_all(&out).unwrap();

        workspace.set("defaults.mode", "plainCitations".into());
        workspace.set("defaults.outputFormat", "docx".into());
        workspace.set("defaults.outputDirectory", out.as_str().into());
        workspace.set("defaults.exportToInputDirectory", false.into());
        workspace.set("defaults.bibliographyFile", "/refs/b.bib".into());
        workspace.set("defaults.cslFile", "/s/c.csl".into());
        workspace.set("defaults.docxFile", "/s/r.docx".into());
        workspace.set("defaults.markdownProcessor", "markdown".into());
        workspace.set("defaults.pandocExtensions", "+smart".into());
        workspace.set(
            "defaults.liveCitationsModeCitationFormat",
            "chicago-note-bibliography".into(),
        );
        workspace.set("defaults.useBundledPandoc", true.into());

        workspace
    }

    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::try_from(self.dir.path().to_path_buf()).unwrap()
    }

    fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::try_from(self.dir.path().join(name)).unwrap()
    }

    fn set(&self, key: &str, value: SettingValue) {
        self.store.set(key, value).unwrap();
    }

    fn file(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn service<R: EngineRunner>(
        &self,
        locator: EngineLocator,
        runner: R,
        notifier: Arc<RecordingNotifier>,
    ) -> ConversionService<R> {
        ConversionService::new(
            ConfigurationResolver::new(self.store.clone()),
            locator,
            CommandBuilder::new("/app/assets/filters/zotero.lua"),
            runner,
            notifier,
        )
    }

    fn bundled_locator(&self) -> EngineLocator {
        EngineLocator::new("/app/assets/bin/pandoc", "pandoc")
    }
}

#[tokio::test]
async fn test_plain_citations_conversion() {
    let workspace = Workspace::new();
    let input = workspace.file("paper.md", "Hello [@doe2020].");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(0),
        notifier.clone(),
    );
    let outcome = service.convert_file(&input).await;

    let output_file = workspace.path("out").join("paper.docx");
    assert_eq!(
        outcome,
        ConversionOutcome::Success {
            output_file: output_file.clone()
        }
    );

    let calls = service.runner().calls();
    assert_eq!(calls.len(), 1);
    let (program, invocation) = &calls[0];
    assert_eq!(program, Utf8Path::new("/app/assets/bin/pandoc"));

    let expected: Vec<String> = [
        "--standalone",
        "--citeproc",
        "--bibliography",
        "/refs/b.bib",
        "--csl",
        "/s/c.csl",
        "--reference-doc",
        "/s/r.docx",
        "--resource-path",
        workspace.root().as_str(),
        "--from",
        "markdown+smart",
        "--to",
        "docx",
        "--output",
        output_file.as_str(),
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();
    assert_eq!(invocation.args, expected);
    assert_eq!(
        invocation.stdin_payload,
        b"Hello [@doe2020].\n\n# Bibliography".to_vec()
    );

    let notices = notifier.notices();
    assert_eq!(notices.len(), 2);
    assert!(matches!(
        &notices[0],
        Notice::Success(title, _) if title == "Markdown converted successfully"
    ));
    assert_eq!(notices[1], Notice::Reveal(output_file));
}

#[tokio::test]
async fn test_live_citations_export_to_input_directory() {
    let workspace = Workspace::new();
    workspace.set("user.mode", "zotero".into());
    workspace.set("user.exportToInputDirectory", true.into());
    workspace.set("user.outputFormat", "odt".into());
    workspace.set("user.bibliographyFile", "".into());
    let input = workspace.file("draft.markdown", "# Draft");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(0),
        notifier.clone(),
    );
    let outcome = service.convert_file(&input).await;

    let output_file = workspace.path("draft.odt");
    assert_eq!(
        outcome,
        ConversionOutcome::Success {
            output_file: output_file.clone()
        }
    );

    let calls = service.runner().calls();
    let args = &calls[0].1.args;
    assert_eq!(
        &args[..5],
        &[
            "--standalone",
            "--lua-filter",
            "/app/assets/filters/zotero.lua",
            "--metadata",
            "zotero_csl_style=chicago-note-bibliography",
        ]
    );
    assert!(!args.contains(&"--citeproc".to_string()));
    assert!(!args.contains(&"--reference-doc".to_string()));
    assert_eq!(args.last(), Some(&output_file.to_string()));
}

#[tokio::test]
async fn test_not_markdown_rejected_before_anything_else() {
    let workspace = Workspace::new();
    // Even a broken configuration is not consulted for a non-Markdown file
    workspace.set("user.bibliographyFile", "".into());
    let input = workspace.file("figure.jpg", "");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(0),
        notifier.clone(),
    );
    let outcome = service.convert_file(&input).await;

    assert_eq!(outcome, ConversionOutcome::RejectedNotMarkdown);
    assert!(outcome.is_rejection());
    assert!(service.runner().calls().is_empty());
    assert_eq!(
        notifier.notices(),
        vec![Notice::Failure(
            "Markdown not converted".to_string(),
            "figure.jpg is not a Markdown file.".to_string()
        )]
    );
}

#[tokio::test]
async fn test_missing_bibliography_is_reported() {
    let workspace = Workspace::new();
    workspace.set("user.bibliographyFile", "".into());
    let input = workspace.file("paper.md", "text");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(0),
        notifier.clone(),
    );
    let outcome = service.convert_file(&input).await;

    assert_eq!(
        outcome,
        ConversionOutcome::RejectedIncompleteConfig {
            missing: vec!["bibliography file"]
        }
    );
    assert!(service.runner().calls().is_empty());

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(matches!(
        &notices[0],
        Notice::Warning(message) if message.starts_with("Please set all the files DocDown requires")
    ));
}

#[tokio::test]
async fn test_live_citations_docx_needs_reference_document() {
    let workspace = Workspace::new();
    workspace.set("user.mode", "liveCitations".into());
    workspace.set("user.docxFile", "".into());
    let input = workspace.file("paper.md", "text");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(0),
        notifier.clone(),
    );
    let outcome = service.convert_file(&input).await;

    assert_eq!(
        outcome,
        ConversionOutcome::RejectedIncompleteConfig {
            missing: vec!["reference document"]
        }
    );
    assert!(service.runner().calls().is_empty());
}

#[tokio::test]
async fn test_system_engine_not_installed() {
    let workspace = Workspace::new();
    workspace.set("user.useBundledPandoc", false.into());
    let input = workspace.file("paper.md", "text");
    let notifier = Arc::new(RecordingNotifier::default());
    let empty_dir = TempDir::new().unwrap();

    let locator = EngineLocator::new("/unused", "pandoc").with_search_path(empty_dir.path());
    let service = workspace.service(locator, ScriptedRunner::exiting_with(0), notifier.clone());
    let outcome = service.convert_file(&input).await;

    assert_eq!(outcome, ConversionOutcome::EngineMissing);
    assert!(service.runner().calls().is_empty());
    assert_eq!(
        notifier.notices(),
        vec![Notice::Warning(
            "I can't find Pandoc! Has it been installed?".to_string()
        )]
    );
}

#[tokio::test]
async fn test_engine_failure_reports_pandoc_meaning() {
    let workspace = Workspace::new();
    let input = workspace.file("paper.md", "Hello [@nobody].");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(25),
        notifier.clone(),
    );
    let outcome = service.convert_file(&input).await;

    assert_eq!(
        outcome,
        ConversionOutcome::EngineFailed {
            exit_code: 25,
            meaning: "PandocBibliographyError".to_string()
        }
    );
    assert_eq!(service.metrics().engine_spawn_count(), 1);

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(matches!(
        &notices[0],
        Notice::Failure(_, body) if body.contains("PandocBibliographyError") && body.contains("25")
    ));

    // Failed files are not remembered for "convert again"
    assert_eq!(service.convert_last_file().await, None);
}

#[tokio::test]
async fn test_convert_again_uses_last_success() {
    let workspace = Workspace::new();
    let input = workspace.file("paper.md", "text");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(0),
        notifier.clone(),
    );
    assert!(service.convert_file(&input).await.is_success());

    let again = service.convert_last_file().await;
    assert!(matches!(again, Some(ConversionOutcome::Success { .. })));
    assert_eq!(service.runner().calls().len(), 2);
}

#[tokio::test]
async fn test_settings_change_applies_to_next_conversion() {
    let workspace = Workspace::new();
    let input = workspace.file("paper.md", "text");
    let notifier = Arc::new(RecordingNotifier::default());

    let service = workspace.service(
        workspace.bundled_locator(),
        ScriptedRunner::exiting_with(0),
        notifier,
    );
    service.convert_file(&input).await;

    workspace.set("user.outputFormat", "html".into());
    service.convert_file(&input).await;

    let calls = service.runner().calls();
    assert_eq!(calls[0].1.output_file, workspace.path("out").join("paper.docx"));
    assert_eq!(calls[1].1.output_file, workspace.path("out").join("paper.html"));
}

#[cfg(unix)]
mod subprocess {
    use super::*;
    use docdown::services::TokioEngineRunner;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Utf8Path, name: &str, body: &str) -> Utf8PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_system_engine_too_old() {
        let workspace = Workspace::new();
        workspace.set("user.useBundledPandoc", false.into());
        let input = workspace.file("paper.md", "text");
        let notifier = Arc::new(RecordingNotifier::default());

        let bin = workspace.path("bin");
        fs::create_dir_all(&bin).unwrap();
        script(&bin, "pandoc", "echo 'pandoc 1.9.0'");

        let locator = EngineLocator::new("/unused", "pandoc").with_search_path(bin.as_str());
        let service = workspace.service(locator, ScriptedRunner::exiting_with(0), notifier.clone());
        let outcome = service.convert_file(&input).await;

        assert_eq!(
            outcome,
            ConversionOutcome::EngineTooOld {
                found: EngineVersion::new(1, 9, 0),
                required: EngineVersion::new(2, 18, 0),
            }
        );
        assert!(service.runner().calls().is_empty());
        assert!(matches!(
            &notifier.notices()[0],
            Notice::Warning(message) if message.contains("2.18.0")
        ));
    }

    #[tokio::test]
    async fn test_system_engine_recent_enough_is_used() {
        let workspace = Workspace::new();
        workspace.set("user.useBundledPandoc", false.into());
        let input = workspace.file("paper.md", "text");
        let notifier = Arc::new(RecordingNotifier::default());

        let bin = workspace.path("bin");
        fs::create_dir_all(&bin).unwrap();
        let pandoc = script(&bin, "pandoc", "echo 'pandoc 3.1.2'\necho 'Features: +server +lua'");

        let locator = EngineLocator::new("/unused", "pandoc").with_search_path(bin.as_str());
        let service = workspace.service(locator, ScriptedRunner::exiting_with(0), notifier);
        let outcome = service.convert_file(&input).await;

        assert!(outcome.is_success());
        assert_eq!(service.runner().calls()[0].0, pandoc);
    }

    #[tokio::test]
    async fn test_bundled_engine_receives_document_on_stdin() {
        let workspace = Workspace::new();
        let input = workspace.file("paper.md", "Body text");
        let captured = workspace.path("stdin.txt");
        let notifier = Arc::new(RecordingNotifier::default());

        let engine = script(
            &workspace.root(),
            "fake-pandoc",
            &format!("cat > '{}'", captured),
        );
        let service = workspace.service(
            EngineLocator::new(engine, "pandoc"),
            TokioEngineRunner::new(Some(Duration::from_secs(30))),
            notifier,
        );
        let outcome = service.convert_file(&input).await;

        assert!(outcome.is_success());
        assert_eq!(
            fs::read_to_string(&captured).unwrap(),
            "Body text\n\n# Bibliography"
        );
    }

    #[tokio::test]
    async fn test_bundled_engine_exit_code() {
        let workspace = Workspace::new();
        let input = workspace.file("paper.md", "text");
        let notifier = Arc::new(RecordingNotifier::default());

        let engine = script(
            &workspace.root(),
            "fake-pandoc",
            "cat > /dev/null\necho 'Could not find reference doc' >&2\nexit 99",
        );
        let service = workspace.service(
            EngineLocator::new(engine, "pandoc"),
            TokioEngineRunner::new(None),
            notifier,
        );
        let outcome = service.convert_file(&input).await;

        assert_eq!(
            outcome,
            ConversionOutcome::EngineFailed {
                exit_code: 99,
                meaning: "PandocResourceNotFound".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_bundled_engine_is_spawn_error() {
        let workspace = Workspace::new();
        let input = workspace.file("paper.md", "text");
        let notifier = Arc::new(RecordingNotifier::default());

        let service = workspace.service(
            EngineLocator::new(workspace.path("no-such-pandoc"), "pandoc"),
            TokioEngineRunner::new(None),
            notifier.clone(),
        );
        let outcome = service.convert_file(&input).await;

        assert!(matches!(outcome, ConversionOutcome::SpawnError { .. }));
        assert!(matches!(
            &notifier.notices()[0],
            Notice::Failure(_, body) if body.starts_with("Pandoc could not be started")
        ));
    }
}
