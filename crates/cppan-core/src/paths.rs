use dirs::home_dir;
use std::path::{Path, PathBuf};

use cppan_schema::PackagePath;

/// Returns the primary configuration directory, or None if the user's home cannot be resolved.
pub fn try_cppan_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("CPPAN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".cppan"))
}

/// User configuration file: ~/.cppan/config.toml
pub fn user_config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Service database: ~/.cppan/service.db
pub fn service_db_path(home: &Path) -> PathBuf {
    home.join("service.db")
}

/// Local configuration file name looked up in the working directory.
pub const LOCAL_CONFIG_NAME: &str = "cppan.toml";

/// Fixed staging directory for unpacked client updates.
pub fn update_staging_dir() -> PathBuf {
    std::env::temp_dir().join("cppan.bak")
}

/// Storage layout rooted at `settings.storage_dir` (default `~/.cppan/storage`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build-system cache: storage/cache
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Cached results of configuration checks: storage/vars
    pub fn vars_dir(&self) -> PathBuf {
        self.root.join("vars")
    }

    /// Unpacked package sources: storage/src
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Source directory of one package: storage/src/org/boost/filesystem
    pub fn package_src_dir(&self, path: &PackagePath) -> PathBuf {
        self.src_dir().join(path.to_filesystem_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_src_dir_nests_elements() {
        let storage = Storage::new("/s");
        let path = PackagePath::parse("org.boost.filesystem").unwrap();
        assert_eq!(
            storage.package_src_dir(&path),
            PathBuf::from("/s/src/org/boost/filesystem")
        );
        assert_eq!(storage.vars_dir(), PathBuf::from("/s/vars"));
    }
}
