//! Self-upgrade
//!
//! Downloads the published client for this platform, verifies it against the
//! published SHA-256 and swaps it in for the running executable. Nothing at
//! the live path is touched until the checksum matches.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use cppan_core::io::download::{DownloadError, Transport};
use cppan_core::io::extract::{ExtractError, Unpacker};
use cppan_core::paths::update_staging_dir;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum UpgradeError {
    #[error("Download failed: {0}")]
    Network(#[from] DownloadError),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to unpack update: {0}")]
    Unpack(#[from] ExtractError),

    #[error("update archive does not contain {0}")]
    MissingBinary(String),

    #[error("Failed to replace the executable ({stage}): {source}")]
    ReplaceFailure {
        stage: &'static str,
        source: std::io::Error,
    },
}

fn replace_failure(stage: &'static str) -> impl FnOnce(std::io::Error) -> UpgradeError {
    move |source| UpgradeError::ReplaceFailure { stage, source }
}

/// Published client archive for the target OS.
pub const fn client_asset() -> &'static str {
    if cfg!(windows) {
        "/client/cppan-master-Windows-client.zip"
    } else if cfg!(target_os = "macos") {
        "/client/cppan-master-macOS-client.zip"
    } else {
        "/client/.service/cppan-master-Linux-client.zip"
    }
}

/// File name of the client binary inside the archive.
pub const fn binary_name() -> &'static str {
    if cfg!(windows) { "cppan.exe" } else { "cppan" }
}

/// How the verified binary replaces the running one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceStrategy {
    /// Remove the live file and copy the new one over it.
    ///
    /// Not atomic: if the copy fails after the remove, no binary is left at
    /// the live path and the client must be reinstalled by hand.
    InPlace,
    /// Hand off to the staged binary, which copies itself over the live path
    /// once this process has exited. Used where a running executable cannot
    /// be overwritten.
    Deferred,
}

impl ReplaceStrategy {
    pub const fn for_current_platform() -> Self {
        if cfg!(windows) { Self::Deferred } else { Self::InPlace }
    }
}

/// Result of a successful upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The live path now holds the new binary.
    Replaced,
    /// A helper process was started to finish the copy.
    Handoff,
}

/// Runs the upgrade protocol against a package server.
pub struct UpdateAgent<'a> {
    transport: &'a dyn Transport,
    unpacker: &'a dyn Unpacker,
    host: String,
    temp_dir: PathBuf,
    staging_dir: PathBuf,
    strategy: ReplaceStrategy,
}

impl std::fmt::Debug for UpdateAgent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateAgent")
            .field("host", &self.host)
            .field("staging_dir", &self.staging_dir)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl<'a> UpdateAgent<'a> {
    pub fn new(transport: &'a dyn Transport, unpacker: &'a dyn Unpacker, host: &str) -> Self {
        Self {
            transport,
            unpacker,
            host: host.trim_end_matches('/').to_string(),
            temp_dir: std::env::temp_dir(),
            staging_dir: update_staging_dir(),
            strategy: ReplaceStrategy::for_current_platform(),
        }
    }

    /// Where downloads are written.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Where the verified archive is unpacked.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_strategy(mut self, strategy: ReplaceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn asset_url(&self) -> String {
        format!("{}{}", self.host, client_asset())
    }

    pub fn checksum_url(&self) -> String {
        format!("{}.sha256", self.asset_url())
    }

    /// Replace `live_exe` with the latest published client.
    pub async fn upgrade(&self, live_exe: &Path) -> Result<UpgradeOutcome, UpgradeError> {
        let staged = self.download_verified().await?;
        match self.strategy {
            ReplaceStrategy::InPlace => {
                replace_in_place(&staged, live_exe)?;
                info!("Replaced {}", live_exe.display());
                Ok(UpgradeOutcome::Replaced)
            }
            ReplaceStrategy::Deferred => {
                spawn_copy_helper(&staged, live_exe)?;
                info!("The new client will finish the upgrade after this process exits");
                Ok(UpgradeOutcome::Handoff)
            }
        }
    }

    /// Download, verify and unpack. Returns the staged binary.
    async fn download_verified(&self) -> Result<PathBuf, UpgradeError> {
        let checksum_file = NamedTempFile::new_in(&self.temp_dir)?;
        self.transport
            .fetch(&self.checksum_url(), checksum_file.path())
            .await?;
        let expected = fs::read_to_string(checksum_file.path())?;
        let expected = expected.split_whitespace().next().unwrap_or("").to_lowercase();

        let asset_file = NamedTempFile::new_in(&self.temp_dir)?;
        info!("Downloading {}", self.asset_url());
        let actual = self.transport.fetch(&self.asset_url(), asset_file.path()).await?;

        if expected != actual {
            return Err(UpgradeError::ChecksumMismatch { expected, actual });
        }
        debug!("checksum verified: {actual}");

        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir)?;
        }
        fs::create_dir_all(&self.staging_dir)?;
        let files = self.unpacker.unpack(asset_file.path(), &self.staging_dir)?;

        files
            .into_iter()
            .find(|f| f.relative_path.file_name().and_then(|n| n.to_str()) == Some(binary_name()))
            .map(|f| f.absolute_path)
            .ok_or_else(|| UpgradeError::MissingBinary(binary_name().to_string()))
    }
}

fn replace_in_place(staged: &Path, live: &Path) -> Result<(), UpgradeError> {
    set_executable(staged).map_err(replace_failure("set permissions"))?;
    fs::remove_file(live).map_err(replace_failure("remove"))?;
    fs::copy(staged, live).map_err(replace_failure("copy"))?;
    fs::remove_file(staged).map_err(replace_failure("cleanup"))?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn spawn_copy_helper(staged: &Path, live: &Path) -> Result<(), UpgradeError> {
    set_executable(staged).map_err(replace_failure("set permissions"))?;
    Command::new(staged)
        .arg("--self-upgrade-copy")
        .arg(live)
        .spawn()
        .map_err(replace_failure("spawn"))?;
    Ok(())
}

/// Polling schedule for the deferred copy.
#[derive(Debug, Clone, Copy)]
pub struct CopyPolicy {
    pub attempts: u32,
    pub interval: Duration,
    /// Last-resort wait when the destination never became writable.
    pub grace: Duration,
}

impl Default for CopyPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_millis(250),
            grace: Duration::from_secs(3),
        }
    }
}

/// `--self-upgrade-copy`: copy the running binary over `dst`.
///
/// Best effort. The previous process may still hold `dst` when the retries
/// and the grace wait run out, in which case the copy fails and the old
/// client stays in place.
pub fn copy_self_to(dst: &Path) -> Result<(), UpgradeError> {
    let src = std::env::current_exe().map_err(replace_failure("locate"))?;
    copy_when_writable(&src, dst, CopyPolicy::default())
}

/// Copy `src` over `dst` once `dst` can be opened for writing.
pub fn copy_when_writable(src: &Path, dst: &Path, policy: CopyPolicy) -> Result<(), UpgradeError> {
    if !wait_until_writable(dst, policy) {
        warn!(
            "{} still locked, waiting {:?} before copying",
            dst.display(),
            policy.grace
        );
        std::thread::sleep(policy.grace);
    }
    fs::copy(src, dst).map_err(replace_failure("copy"))?;
    Ok(())
}

fn wait_until_writable(path: &Path, policy: CopyPolicy) -> bool {
    for attempt in 0..policy.attempts {
        match OpenOptions::new().write(true).open(path) {
            Ok(_) => return true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => debug!("attempt {attempt}: {} not writable: {e}", path.display()),
        }
        std::thread::sleep(policy.interval);
    }
    false
}
