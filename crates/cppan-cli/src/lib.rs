//! cppan - C/C++ dependency manager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! The `cppan` binary turns an invocation into exactly one action: a
//! configuration-driven build of the current directory, an internal utility
//! command, a build of an explicit target, or a self-upgrade.
//!
//! # Architecture
//!
//! - **Bootstrap once**: logging, the user configuration and the service
//!   database are set up by [`ProcessContext`] behind a [`BootstrapGate`] and
//!   passed by reference from then on.
//! - **Classify, then run**: [`Orchestrator::classify`] decides what an
//!   argument list means before anything executes; internal commands are a
//!   declarative table with fixed arity.
//! - **Collaborators behind traits**: configuration, the build driver, the
//!   HTTP transport and the unpacker are reached through [`Backend`].
//!
//! # Directory Layout
//!
//! ```text
//! ~/.cppan/
//! ├── config.toml   # User configuration
//! ├── service.db    # SQLite bookkeeping
//! └── storage/
//!     ├── cache/    # Build-system cache
//!     ├── vars/     # Configuration check results
//!     └── src/      # Package sources by path
//! ```

pub mod cmd;
pub mod ops;
pub mod store;

use std::path::{Path, PathBuf};

use clap::Parser;

pub use crate::ops::backend::{Backend, NativeBackend};
pub use crate::ops::context::{BootstrapError, BootstrapGate, ProcessContext};
pub use crate::ops::dispatch::{BuildSource, DispatchOutcome, Orchestrator, Parsed};
pub use crate::ops::error::CliError;
pub use crate::store::db;
pub use cppan_core::paths::*;

/// Client version, from `git describe` when available.
pub const VERSION: &str = env!("CPPAN_VERSION");

/// Flagged invocation grammar. Used when the first operand starts with `-`.
#[derive(Debug, Default, Parser)]
#[command(name = "cppan")]
#[command(version = VERSION, about = "cppan - C/C++ dependency manager")]
pub struct Options {
    /// Configure and build a config or source file
    #[arg(long, value_name = "PATH")]
    pub build: Option<PathBuf>,

    /// Build an already configured target
    #[arg(long, value_name = "PATH")]
    pub build_only: Option<PathBuf>,

    /// Wipe the build directory, then configure and build
    #[arg(long, value_name = "PATH")]
    pub rebuild: Option<PathBuf>,

    /// Configure without building
    #[arg(long, value_name = "PATH")]
    pub generate: Option<PathBuf>,

    /// Print the commands a build would run
    #[arg(long, value_name = "PATH")]
    pub dry_run: Option<PathBuf>,

    /// Build a stored package (path-version)
    #[arg(long, value_name = "PACKAGE", requires = "settings")]
    pub build_package: Option<String>,

    /// Settings script used by --build-package
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Build configuration (Debug, Release, ...)
    #[arg(long, value_name = "NAME")]
    pub config: Option<String>,

    /// Run in this directory
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Log connection-level network traffic
    #[arg(long)]
    pub curl_verbose: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub ignore_ssl_checks: bool,

    /// Write a source archive per project instead of processing
    #[arg(long)]
    pub prepare_archive: bool,

    /// Remove stored packages whose path matches a regex
    #[arg(long, value_name = "REGEX")]
    pub clean_packages: Option<String>,

    /// Upgrade the client to the latest published build
    #[arg(long)]
    pub self_upgrade: bool,

    /// Finish a deferred upgrade by copying this binary to DESTINATION
    #[arg(long, hide = true, value_name = "DESTINATION")]
    pub self_upgrade_copy: Option<PathBuf>,

    /// Remove the build-system cache
    #[arg(long)]
    pub clear_cache: bool,

    /// Remove cached configuration check results
    #[arg(long)]
    pub clear_vars_cache: bool,
}

/// A primary build action. At most one runs per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    Build(&'a Path),
    BuildOnly(&'a Path),
    Rebuild(&'a Path),
    Generate(&'a Path),
    DryRun(&'a Path),
    BuildPackage { package: &'a str, settings: &'a Path },
}

impl Options {
    /// First requested action in priority order: build, build-only, rebuild,
    /// generate, dry-run, build-package.
    pub fn primary_action(&self) -> Option<Action<'_>> {
        if let Some(path) = &self.build {
            return Some(Action::Build(path));
        }
        if let Some(path) = &self.build_only {
            return Some(Action::BuildOnly(path));
        }
        if let Some(path) = &self.rebuild {
            return Some(Action::Rebuild(path));
        }
        if let Some(path) = &self.generate {
            return Some(Action::Generate(path));
        }
        if let Some(path) = &self.dry_run {
            return Some(Action::DryRun(path));
        }
        match (&self.build_package, &self.settings) {
            (Some(package), Some(settings)) => Some(Action::BuildPackage { package, settings }),
            _ => None,
        }
    }
}
