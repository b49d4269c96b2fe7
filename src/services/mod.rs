//! Services module - the conversion pipeline.
//!
//! This module holds everything between "a file was dropped" and "the user was
//! told what happened". The services have no UI dependencies; the outside world
//! is reached only through the [`NotificationSink`] trait and the engine
//! subprocess.
//!
//! # Components
//!
//! - [`ConversionService`]: the orchestrator. Validates the file, resolves a
//!   settings snapshot, locates the engine, builds the invocation, runs it and
//!   reports one [`ConversionOutcome`](crate::models::ConversionOutcome).
//! - [`EngineLocator`]: bundled engine, or a system engine found on the search
//!   path and checked against the minimum version.
//! - [`CommandBuilder`]: turns settings into Pandoc arguments and the stdin payload.
//! - [`TokioEngineRunner`]: spawns Pandoc, streams the document to stdin, drains
//!   its output into the log and reports the exit code.
//! - [`exit_codes`]: Pandoc's exit code table.
//! - [`media`]: extension-based media type lookup.
//!
//! # Usage Example
//!
//! ```ignore
//! use docdown::services::*;
//!
//! let service = ConversionService::new(
//!     resolver,
//!     EngineLocator::new(app_config.bundled_engine_path(), "pandoc"),
//!     CommandBuilder::new(app_config.live_citation_filter_path()),
//!     TokioEngineRunner::new(app_config.engine.timeout()),
//!     Arc::new(ConsoleNotifier::new(true)),
//! );
//!
//! let outcome = service.convert_file(Utf8Path::new("/notes/notes.md")).await;
//! ```
//!
//! # Pandoc Integration
//!
//! The document is never written to a temporary file: Pandoc reads it from
//! stdin. Success is decided by the exit code alone; Pandoc's output is only
//! logged.

pub mod command;
pub mod conversion;
pub mod engine;
pub mod exit_codes;
pub mod media;
pub mod notify;
pub mod runner;

pub use command::{BuildError, CommandBuilder, EngineInvocation, REQUIRED_ENGINE_VERSION};
pub use conversion::{ConversionService, ConversionStage};
pub use engine::{EngineHandle, EngineLocator, LocatorError};
pub use exit_codes::{describe_exit_code, exit_code_name};
pub use notify::{ConsoleNotifier, NotificationSink};
pub use runner::{EngineExit, EngineRunner, RunError, TokioEngineRunner};
