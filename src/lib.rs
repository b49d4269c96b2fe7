// DocDown - Markdown to Word conversion with citations via Pandoc
//
// This is the library crate containing the conversion pipeline and data structures.
// The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use crate::config::{ConfigurationResolver, SettingsStore, YamlSettingsStore};
pub use metrics::ConversionMetrics;
pub use models::{AppConfig, ConversionOutcome, EffectiveSettings};
pub use services::{ConversionService, NotificationSink};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
