use crate::models::{EffectiveSettings, EngineSource, EngineVersion, VersionParseError};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// How long `pandoc --version` may take before the check is abandoned.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// The engine binary chosen for one conversion.
///
/// Downstream code only needs [`program`](Self::program); which variant it is
/// matters for logging alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHandle {
    /// The copy packaged with the application.
    BundledPath(Utf8PathBuf),
    /// A copy found on the search path, with the version it reported.
    SystemBinary {
        path: Utf8PathBuf,
        version: EngineVersion,
    },
}

impl EngineHandle {
    pub fn program(&self) -> &Utf8Path {
        match self {
            EngineHandle::BundledPath(path) => path,
            EngineHandle::SystemBinary { path, .. } => path,
        }
    }
}

/// Reasons the engine could not be used
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("{0} was not found on the executable search path")]
    NotFound(String),

    #[error("Failed to query engine version: {0}")]
    VersionCheckFailed(String),

    #[error("Could not read engine version: {0}")]
    UnrecognizedVersion(#[from] VersionParseError),

    #[error("Engine version {found} is older than the required {required}")]
    TooOld {
        found: EngineVersion,
        required: EngineVersion,
    },
}

/// Decides which engine binary a conversion runs.
///
/// The bundled engine is trusted to exist. The system engine is looked up on
/// the search path and its version checked once per call to
/// [`locate`](Self::locate).
#[derive(Debug, Clone)]
pub struct EngineLocator {
    bundled_path: Utf8PathBuf,
    binary_name: String,
    extra_search_dirs: Vec<Utf8PathBuf>,
    search_path: Option<OsString>,
}

impl EngineLocator {
    pub fn new(bundled_path: impl Into<Utf8PathBuf>, binary_name: impl Into<String>) -> Self {
        Self {
            bundled_path: bundled_path.into(),
            binary_name: binary_name.into(),
            extra_search_dirs: Vec::new(),
            search_path: None,
        }
    }

    /// Directories appended to `PATH` when looking for the system engine.
    pub fn with_extra_search_dirs(mut self, dirs: Vec<Utf8PathBuf>) -> Self {
        self.extra_search_dirs = dirs;
        self
    }

    /// Use exactly `search_path` instead of `PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Pick the engine for `settings`, requiring at least `required` for a system engine.
    pub async fn locate(
        &self,
        settings: &EffectiveSettings,
        required: EngineVersion,
    ) -> Result<EngineHandle, LocatorError> {
        match settings.engine_source {
            EngineSource::Bundled => {
                tracing::debug!("Using bundled engine at {}", self.bundled_path);
                Ok(EngineHandle::BundledPath(self.bundled_path.clone()))
            }
            EngineSource::System => {
                let path = self.find_system_binary()?;
                let version = self.query_version(&path).await?;

                if version < required {
                    tracing::warn!("{} {} is too old (need {})", path, version, required);
                    return Err(LocatorError::TooOld {
                        found: version,
                        required,
                    });
                }

                tracing::info!("Using system engine {} (version {})", path, version);
                Ok(EngineHandle::SystemBinary { path, version })
            }
        }
    }

    fn effective_search_path(&self) -> OsString {
        if let Some(search_path) = &self.search_path {
            return search_path.clone();
        }

        let mut dirs: Vec<std::path::PathBuf> = env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default();
        dirs.extend(
            self.extra_search_dirs
                .iter()
                .map(|dir| dir.as_std_path().to_path_buf()),
        );

        env::join_paths(dirs)
            .unwrap_or_else(|_| env::var_os("PATH").unwrap_or_default())
    }

    fn find_system_binary(&self) -> Result<Utf8PathBuf, LocatorError> {
        let cwd = env::current_dir().unwrap_or_else(|_| ".".into());
        let found = which::which_in(&self.binary_name, Some(self.effective_search_path()), cwd)
            .map_err(|err| {
                tracing::warn!("{} not found: {}", self.binary_name, err);
                LocatorError::NotFound(self.binary_name.clone())
            })?;

        Utf8PathBuf::from_path_buf(found).map_err(|path| {
            tracing::warn!("Engine path is not valid UTF-8: {}", path.display());
            LocatorError::NotFound(self.binary_name.clone())
        })
    }

    /// Run `<engine> --version` and read the first line.
    async fn query_version(&self, path: &Utf8Path) -> Result<EngineVersion, LocatorError> {
        let mut cmd = Command::new(path);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(VERSION_CHECK_TIMEOUT, cmd.output())
            .await
            .map_err(|_| {
                LocatorError::VersionCheckFailed(format!(
                    "no answer within {}s",
                    VERSION_CHECK_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|err| LocatorError::VersionCheckFailed(err.to_string()))?;

        if !output.status.success() {
            return Err(LocatorError::VersionCheckFailed(format!(
                "{} --version exited with {}",
                path, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.lines().next().unwrap_or_default();
        tracing::debug!("Engine version line: {}", first_line);

        Ok(EngineVersion::coerce(first_line)?)
    }
}
