//! Process bootstrap, dispatch and the error taxonomy.

pub mod backend;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod scope;

pub use backend::{Backend, NativeBackend};
pub use context::{BootstrapError, BootstrapGate, ProcessContext};
pub use dispatch::{BuildSource, DispatchOutcome, Orchestrator, Parsed};
pub use error::CliError;
pub use scope::ScopedCurrentDir;

/// Serializes tests that change the process working directory.
#[cfg(test)]
pub(crate) static CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
