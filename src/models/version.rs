use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("Invalid version regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No version number found in {0:?}")]
pub struct VersionParseError(pub String);

/// A `major.minor.patch` engine version.
///
/// Ordering is numeric per component, so `2.9.0 < 2.18.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl EngineVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Pull the first version-looking run out of arbitrary text.
    ///
    /// `pandoc 3.1.2` yields `3.1.2`, `pandoc.exe 2.5` yields `2.5.0`. Missing
    /// minor/patch components are zero.
    pub fn coerce(text: &str) -> Result<Self, VersionParseError> {
        let caps = VERSION_PATTERN
            .captures(text)
            .ok_or_else(|| VersionParseError(text.to_string()))?;

        let part = |idx: usize| -> Result<u64, VersionParseError> {
            match caps.get(idx) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| VersionParseError(text.to_string())),
                None => Ok(0),
            }
        };

        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
