use super::command::CommandBuilder;
use super::engine::{EngineLocator, LocatorError};
use super::exit_codes::describe_exit_code;
use super::media;
use super::notify::NotificationSink;
use super::runner::{EngineRunner, RunError};
use crate::config::ConfigurationResolver;
use crate::metrics::ConversionMetrics;
use crate::models::{ConversionOutcome, ConversionRequest};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

const CONVERTED_TITLE: &str = "Markdown converted successfully";
const NOT_CONVERTED_TITLE: &str = "Markdown not converted";

/// Where a single conversion currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStage {
    Received,
    Validating,
    Rejected,
    ConfigResolved,
    EngineLocated,
    EngineUnavailable,
    Spawned,
    Succeeded,
    EngineFailed,
    SpawnError,
}

/// Runs conversions from dropped file to user notification.
///
/// Each call to [`convert_file`](Self::convert_file) is an independent attempt:
/// it resolves a fresh settings snapshot, locates the engine, builds the
/// invocation, runs it and reports the outcome exactly once. Nothing is retried.
///
/// The service never reads the preferences store directly; it only sees the
/// snapshots produced by its [`ConfigurationResolver`].
pub struct ConversionService<R: EngineRunner> {
    resolver: ConfigurationResolver,
    locator: EngineLocator,
    builder: CommandBuilder,
    runner: R,
    notifier: Arc<dyn NotificationSink>,
    metrics: Arc<ConversionMetrics>,
}

impl<R: EngineRunner> ConversionService<R> {
    pub fn new(
        resolver: ConfigurationResolver,
        locator: EngineLocator,
        builder: CommandBuilder,
        runner: R,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            resolver,
            locator,
            builder,
            runner,
            notifier,
            metrics: Arc::new(ConversionMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ConversionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ConversionMetrics> {
        &self.metrics
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Convert one file and report the result.
    pub async fn convert_file(&self, file_path: &Utf8Path) -> ConversionOutcome {
        tracing::info!("Starting conversion of {}", file_path);

        let (stage, outcome) = self.run_pipeline(file_path).await;
        tracing::debug!("{} finished at stage {:?}", file_path, stage);
        self.report(file_path, &outcome);

        outcome
    }

    /// Convert the last successfully converted file again.
    ///
    /// Returns `None` when nothing has been converted yet.
    pub async fn convert_last_file(&self) -> Option<ConversionOutcome> {
        match self.resolver.last_converted_file() {
            Some(path) => Some(self.convert_file(&path).await),
            None => {
                tracing::info!("No previously converted file to convert again");
                None
            }
        }
    }

    fn transition(&self, file_path: &Utf8Path, stage: &mut ConversionStage, next: ConversionStage) {
        tracing::debug!("{}: {:?} -> {:?}", file_path, stage, next);
        *stage = next;
    }

    /// Run the conversion, returning the stage it ended in with its outcome.
    async fn run_pipeline(&self, file_path: &Utf8Path) -> (ConversionStage, ConversionOutcome) {
        let mut stage = ConversionStage::Received;
        let outcome = self.run_stages(file_path, &mut stage).await;
        (stage, outcome)
    }

    async fn run_stages(&self, file_path: &Utf8Path, stage: &mut ConversionStage) -> ConversionOutcome {
        self.transition(file_path, stage, ConversionStage::Validating);

        if !media::is_markdown_candidate(file_path) {
            tracing::info!(
                "{} is {}, not Markdown",
                file_path,
                media::lookup(file_path).unwrap_or("of unknown type")
            );
            self.transition(file_path, stage, ConversionStage::Rejected);
            return ConversionOutcome::RejectedNotMarkdown;
        }

        let request = ConversionRequest {
            file_path: file_path.to_path_buf(),
            settings: self.resolver.resolve(),
        };

        let missing = request.settings.missing_required();
        if !missing.is_empty() {
            self.transition(file_path, stage, ConversionStage::Rejected);
            return ConversionOutcome::RejectedIncompleteConfig { missing };
        }
        self.transition(file_path, stage, ConversionStage::ConfigResolved);

        let engine = match self
            .locator
            .locate(&request.settings, self.builder.required_engine_version())
            .await
        {
            Ok(engine) => engine,
            Err(LocatorError::TooOld { found, required }) => {
                self.transition(file_path, stage, ConversionStage::EngineUnavailable);
                return ConversionOutcome::EngineTooOld { found, required };
            }
            Err(err) => {
                tracing::warn!("Engine unavailable: {}", err);
                self.transition(file_path, stage, ConversionStage::EngineUnavailable);
                return ConversionOutcome::EngineMissing;
            }
        };
        self.transition(file_path, stage, ConversionStage::EngineLocated);

        let invocation = match self.builder.build(&request.file_path, &request.settings) {
            Ok(invocation) => invocation,
            Err(err) => {
                self.transition(file_path, stage, ConversionStage::Rejected);
                return ConversionOutcome::InputUnreadable {
                    cause: err.to_string(),
                };
            }
        };

        self.metrics.record_engine_spawn();
        self.transition(file_path, stage, ConversionStage::Spawned);

        match self.runner.run(engine.program(), &invocation).await {
            Ok(exit) => {
                self.metrics.record_engine_time(exit.duration);

                if exit.success() {
                    self.transition(file_path, stage, ConversionStage::Succeeded);
                    ConversionOutcome::Success {
                        output_file: invocation.output_file,
                    }
                } else {
                    self.transition(file_path, stage, ConversionStage::EngineFailed);
                    let exit_code = exit.code.unwrap_or(-1);
                    ConversionOutcome::EngineFailed {
                        exit_code,
                        meaning: describe_exit_code(exit_code),
                    }
                }
            }
            Err(RunError::TimedOut(after)) => {
                self.transition(file_path, stage, ConversionStage::EngineFailed);
                ConversionOutcome::TimedOut { after }
            }
            Err(RunError::Stdin(err)) => {
                self.transition(file_path, stage, ConversionStage::EngineFailed);
                ConversionOutcome::EngineFailed {
                    exit_code: 0,
                    meaning: format!("Pandoc stopped reading the document ({})", err),
                }
            }
            Err(err) => {
                self.transition(file_path, stage, ConversionStage::SpawnError);
                ConversionOutcome::SpawnError {
                    cause: err.to_string(),
                }
            }
        }
    }

    /// Tell the user, update metrics and remember successful files.
    fn report(&self, file_path: &Utf8Path, outcome: &ConversionOutcome) {
        let file_name = file_path.file_name().unwrap_or(file_path.as_str());

        match outcome {
            ConversionOutcome::Success { output_file } => {
                tracing::info!("Converted {} to {}", file_path, output_file);
                self.metrics.record_success();

                if let Err(err) = self.resolver.record_last_converted(file_path) {
                    tracing::warn!("Failed to remember last converted file: {}", err);
                }

                let directory = output_file.parent().unwrap_or(Utf8Path::new("."));
                self.notifier.notify_success(
                    CONVERTED_TITLE,
                    &format!("Document saved in {}", directory),
                );
                self.notifier.reveal_output(output_file);
            }
            ConversionOutcome::RejectedNotMarkdown => {
                self.metrics.record_rejection();
                self.notifier.notify_failure(
                    NOT_CONVERTED_TITLE,
                    &format!("{} is not a Markdown file.", file_name),
                );
            }
            ConversionOutcome::RejectedIncompleteConfig { missing } => {
                self.metrics.record_rejection();
                self.notifier.warn_user(&format!(
                    "Please set all the files DocDown requires (missing: {}). \
                     You can set these in DocDown's preferences.",
                    missing.join(", ")
                ));
            }
            ConversionOutcome::InputUnreadable { cause } => {
                self.metrics.record_rejection();
                self.notifier.notify_failure(
                    NOT_CONVERTED_TITLE,
                    &format!("{} could not be read: {}", file_name, cause),
                );
            }
            ConversionOutcome::EngineMissing => {
                self.metrics.record_failure();
                self.notifier
                    .warn_user("I can't find Pandoc! Has it been installed?");
            }
            ConversionOutcome::EngineTooOld { found, required } => {
                self.metrics.record_failure();
                self.notifier.warn_user(&format!(
                    "Please update Pandoc to version {} or higher (found {}).",
                    required, found
                ));
            }
            ConversionOutcome::EngineFailed { exit_code, meaning } => {
                self.metrics.record_failure();
                self.notifier.notify_failure(
                    NOT_CONVERTED_TITLE,
                    &format!("Pandoc failed: {} (exit code {})", meaning, exit_code),
                );
            }
            ConversionOutcome::SpawnError { cause } => {
                self.metrics.record_failure();
                self.notifier.notify_failure(
                    NOT_CONVERTED_TITLE,
                    &format!("Pandoc could not be started: {}", cause),
                );
            }
            ConversionOutcome::TimedOut { after } => {
                self.metrics.record_failure();
                self.notifier.notify_failure(
                    NOT_CONVERTED_TITLE,
                    &format!("Pandoc did not finish within {} seconds", after.as_secs()),
                );
            }
        }

        if !outcome.is_success() {
            tracing::warn!("Conversion of {} ended: {}", file_path, outcome);
        }
    }
}

impl<R: EngineRunner + 'static> ConversionService<R> {
    /// Convert several files at once, one independent conversion per file.
    ///
    /// Outcomes are returned in the order of `paths`.
    pub async fn convert_files(self: &Arc<Self>, paths: Vec<Utf8PathBuf>) -> Vec<ConversionOutcome> {
        let count = paths.len();
        let mut tasks = JoinSet::new();

        for (index, path) in paths.into_iter().enumerate() {
            let service = Arc::clone(self);
            tasks.spawn(async move { (index, service.convert_file(&path).await) });
        }

        let mut outcomes: Vec<Option<ConversionOutcome>> = vec![None; count];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(err) => tracing::error!("Conversion task failed: {}", err),
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| ConversionOutcome::SpawnError {
                    cause: "conversion task aborted".to_string(),
                })
            })
            .collect()
    }
}
