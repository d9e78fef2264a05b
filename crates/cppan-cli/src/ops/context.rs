//! Process-wide state, bootstrapped exactly once.
//!
//! `ProcessContext` owns everything that used to be a global: the user
//! settings, the service database and the network settings. It is built by
//! [`BootstrapGate`] before any dispatch and passed by reference afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, RwLock};

use cppan_core::paths::{Storage, service_db_path, try_cppan_home};
use cppan_core::{ConfigError, HttpSettings, Settings};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::VERSION;
use crate::store::{DbError, ServiceDb};

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("cannot determine the cppan home directory (set CPPAN_HOME)")]
    NoHome,

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Service database error: {0}")]
    Db(#[from] DbError),
}

/// Shared state for one process run.
pub struct ProcessContext {
    home: PathBuf,
    settings: Settings,
    db: Mutex<ServiceDb>,
    http: RwLock<HttpSettings>,
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessContext")
            .field("home", &self.home)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ProcessContext {
    /// Full bootstrap: logging, then user configuration, then service
    /// database startup actions.
    pub fn bootstrap() -> Result<Self, BootstrapError> {
        init_logging()?;
        let home = try_cppan_home().ok_or(BootstrapError::NoHome)?;
        Self::open(&home)
    }

    /// Bootstrap without touching the global logger.
    pub fn open(home: &Path) -> Result<Self, BootstrapError> {
        let settings = Settings::load_user(home)?;
        let db = ServiceDb::open_at(&service_db_path(home))?;
        db.perform_startup_actions(VERSION, &settings.storage(home).vars_dir())?;
        debug!("bootstrapped with home {}", home.display());

        let http = HttpSettings {
            proxy: settings.proxy.clone(),
            ..HttpSettings::default()
        };
        Ok(Self {
            home: home.to_path_buf(),
            settings,
            db: Mutex::new(db),
            http: RwLock::new(http),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// User settings as loaded at bootstrap.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storage(&self) -> Storage {
        self.settings.storage(&self.home)
    }

    pub fn db(&self) -> MutexGuard<'_, ServiceDb> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current network settings.
    pub fn http_settings(&self) -> HttpSettings {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_http(&self, f: impl FnOnce(&mut HttpSettings)) {
        f(&mut self.http.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Replace the proxy. An absent value clears it.
    pub fn set_proxy(&self, proxy: Option<String>) {
        self.update_http(|http| http.proxy = proxy);
    }
}

fn init_logging() -> Result<(), BootstrapError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init()
        .map_err(|e| BootstrapError::Logging(e.to_string()))
}

/// Single-initialization gate for [`ProcessContext`].
///
/// The first successful `get_or_bootstrap` stores the context; later calls
/// return it without running their initializer. A failed bootstrap stores
/// nothing.
pub struct BootstrapGate {
    context: OnceLock<ProcessContext>,
    lock: Mutex<()>,
}

impl fmt::Debug for BootstrapGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapGate")
            .field("initialized", &self.context.get().is_some())
            .finish()
    }
}

impl Default for BootstrapGate {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapGate {
    pub const fn new() -> Self {
        Self {
            context: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Option<&ProcessContext> {
        self.context.get()
    }

    pub fn get_or_bootstrap<F>(&self, init: F) -> Result<&ProcessContext, BootstrapError>
    where
        F: FnOnce() -> Result<ProcessContext, BootstrapError>,
    {
        if let Some(context) = self.context.get() {
            return Ok(context);
        }
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(context) = self.context.get() {
            return Ok(context);
        }
        let context = init()?;
        Ok(self.context.get_or_init(|| context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[test]
    fn test_open_materializes_user_config_and_db() {
        let home = TempDir::new().unwrap();
        let ctx = ProcessContext::open(home.path()).unwrap();

        assert!(home.path().join("config.toml").exists());
        assert!(home.path().join("service.db").exists());
        assert_eq!(ctx.db().client_version().unwrap().as_deref(), Some(VERSION));
        assert_eq!(ctx.storage().root(), home.path().join("storage"));
    }

    #[test]
    fn test_user_proxy_seeds_network_settings() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join("config.toml"), "proxy = \"http://proxy:3128\"\n").unwrap();
        let ctx = ProcessContext::open(home.path()).unwrap();

        assert_eq!(ctx.http_settings().proxy.as_deref(), Some("http://proxy:3128"));
        ctx.set_proxy(None);
        assert_eq!(ctx.http_settings().proxy, None);
    }

    #[test]
    fn test_bad_user_config_fails_bootstrap() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join("config.toml"), "host = [").unwrap();
        assert!(matches!(
            ProcessContext::open(home.path()),
            Err(BootstrapError::Config(ConfigError::Parse { .. }))
        ));
    }

    #[test]
    fn test_gate_runs_initializer_once() {
        let home = TempDir::new().unwrap();
        let gate = BootstrapGate::new();
        let calls = Cell::new(0);

        let first = gate
            .get_or_bootstrap(|| {
                calls.set(calls.get() + 1);
                ProcessContext::open(home.path())
            })
            .unwrap();
        let second = gate
            .get_or_bootstrap(|| {
                calls.set(calls.get() + 1);
                ProcessContext::open(home.path())
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_gate_stays_empty_after_failure() {
        let gate = BootstrapGate::new();
        assert!(gate.get_or_bootstrap(|| Err(BootstrapError::NoHome)).is_err());
        assert!(gate.get().is_none());
    }
}
