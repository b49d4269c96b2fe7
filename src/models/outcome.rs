use super::{EffectiveSettings, EngineVersion};
use camino::Utf8PathBuf;
use std::fmt;
use std::time::Duration;

/// One conversion attempt: the file to convert and the settings it was resolved with.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file_path: Utf8PathBuf,
    pub settings: EffectiveSettings,
}

/// Terminal result of a conversion attempt. Reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success { output_file: Utf8PathBuf },
    RejectedNotMarkdown,
    RejectedIncompleteConfig { missing: Vec<&'static str> },
    EngineMissing,
    EngineTooOld {
        found: EngineVersion,
        required: EngineVersion,
    },
    EngineFailed { exit_code: i32, meaning: String },
    SpawnError { cause: String },
    InputUnreadable { cause: String },
    TimedOut { after: Duration },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success { .. })
    }

    /// True for outcomes decided before any engine process was started.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ConversionOutcome::RejectedNotMarkdown
                | ConversionOutcome::RejectedIncompleteConfig { .. }
                | ConversionOutcome::InputUnreadable { .. }
        )
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionOutcome::Success { output_file } => {
                write!(f, "converted to {}", output_file)
            }
            ConversionOutcome::RejectedNotMarkdown => write!(f, "not a Markdown file"),
            ConversionOutcome::RejectedIncompleteConfig { missing } => {
                write!(f, "missing settings: {}", missing.join(", "))
            }
            ConversionOutcome::EngineMissing => write!(f, "Pandoc not found"),
            ConversionOutcome::EngineTooOld { found, required } => {
                write!(f, "Pandoc {} is older than required {}", found, required)
            }
            ConversionOutcome::EngineFailed { exit_code, meaning } => {
                write!(f, "Pandoc failed with exit code {}: {}", exit_code, meaning)
            }
            ConversionOutcome::SpawnError { cause } => {
                write!(f, "Pandoc could not be started: {}", cause)
            }
            ConversionOutcome::InputUnreadable { cause } => {
                write!(f, "input could not be read: {}", cause)
            }
            ConversionOutcome::TimedOut { after } => {
                write!(f, "Pandoc timed out after {:?}", after)
            }
        }
    }
}
