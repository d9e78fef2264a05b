//! Collaborators the orchestrator drives.

use cppan_core::io::download::{DownloadError, HttpTransport, Transport};
use cppan_core::io::extract::{ArchiveUnpacker, Unpacker};
use cppan_core::{BuildDriver, CmakeDriver, Config, ConfigSession, HttpSettings, Settings};

/// Factory for the configuration session, build driver, transport and
/// unpacker.
pub trait Backend {
    /// Start a configuration session seeded with the user settings.
    fn session(&self, settings: &Settings) -> Box<dyn ConfigSession>;

    fn driver(&self) -> &dyn BuildDriver;

    /// Transport honoring the network settings in effect right now.
    fn transport(&self, http: &HttpSettings) -> Result<Box<dyn Transport>, DownloadError>;

    fn unpacker(&self) -> &dyn Unpacker;
}

/// `cppan.toml` sessions, `cmake`, reqwest and the zip/tar unpacker.
#[derive(Debug, Default)]
pub struct NativeBackend {
    driver: CmakeDriver,
    unpacker: ArchiveUnpacker,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for NativeBackend {
    fn session(&self, settings: &Settings) -> Box<dyn ConfigSession> {
        Box::new(Config::new(settings.clone()))
    }

    fn driver(&self) -> &dyn BuildDriver {
        &self.driver
    }

    fn transport(&self, http: &HttpSettings) -> Result<Box<dyn Transport>, DownloadError> {
        Ok(Box::new(HttpTransport::new(http.client()?)))
    }

    fn unpacker(&self) -> &dyn Unpacker {
        &self.unpacker
    }
}
