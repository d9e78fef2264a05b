//! Scoped working-directory changes.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Changes the working directory for its lifetime. The previous directory is
/// restored on drop, including on early return and error propagation.
#[derive(Debug)]
#[must_use = "the previous directory is restored as soon as the guard is dropped"]
pub struct ScopedCurrentDir {
    previous: PathBuf,
}

impl ScopedCurrentDir {
    pub fn enter(dir: &Path) -> std::io::Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        debug!("entered {}", dir.display());
        Ok(Self { previous })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for ScopedCurrentDir {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            warn!("Failed to restore {}: {e}", self.previous.display());
        }
    }
}
