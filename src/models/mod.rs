//! Data models for DocDown.
//!
//! - [`EffectiveSettings`]: typed snapshot of the user's preferences for one conversion
//! - [`ConversionRequest`] / [`ConversionOutcome`]: the input and terminal result of a conversion
//! - [`EngineVersion`]: version numbers reported by the conversion engine
//! - [`AppConfig`]: application wiring (assets, logs, engine lookup) loaded at startup
//!
//! # Architecture Note
//!
//! Settings snapshots are plain values. They are rebuilt for every conversion by
//! the [`ConfigurationResolver`](crate::config::ConfigurationResolver) and passed
//! by value, so concurrent conversions never observe each other's changes.

pub mod config;
pub mod outcome;
pub mod settings;
pub mod version;

pub use self::config::{AppConfig, EngineConfig};
pub use outcome::{ConversionOutcome, ConversionRequest};
pub use settings::{
    CitationMode, EffectiveSettings, EngineSource, SettingValue, keys, sanitize_extension_flags,
};
pub use version::{EngineVersion, VersionParseError};
