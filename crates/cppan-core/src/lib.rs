//! cppan core library
//!
//! The collaborators the `cppan` orchestrator drives through narrow calls:
//!
//! - [`config`]: user (`~/.cppan/config.toml`) and local (`cppan.toml`) configuration
//! - [`http`]: process-wide network settings and the client built from them
//! - [`io`]: checksummed downloads, archive unpacking and packing
//! - [`builder`]: the native build-system driver (`cmake`)
//! - [`imports`], [`autotools`]: helpers behind the internal commands

pub mod autotools;
pub mod builder;
pub mod config;
pub mod http;
pub mod imports;
pub mod io;
pub mod paths;

pub use builder::{BuildDriver, CmakeDriver};
pub use config::{Config, ConfigError, ConfigSession, Project, Settings};
pub use cppan_schema::{PackageId, PackagePath, RootNamespace};
pub use http::HttpSettings;
pub use paths::*;

/// User Agent string
pub const USER_AGENT: &str = concat!("cppan/", env!("CARGO_PKG_VERSION"));

