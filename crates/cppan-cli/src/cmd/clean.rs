//! Cache and package cleanup

use std::path::Path;

use anyhow::{Context, Result};
use cppan_core::paths::Storage;
use regex::Regex;
use tracing::info;

use crate::ProcessContext;

/// `--clear-cache`
pub fn clear_cache(storage: &Storage) -> Result<()> {
    remove_dir(&storage.cache_dir())
}

/// `--clear-vars-cache`
pub fn clear_vars_cache(storage: &Storage) -> Result<()> {
    remove_dir(&storage.vars_dir())
}

fn remove_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => info!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", dir.display())),
    }
    Ok(())
}

/// `--clean-packages <regex>`: forget matching packages and delete their
/// sources. Returns how many were removed.
pub fn clean_packages(ctx: &ProcessContext, pattern: &str) -> Result<usize> {
    let regex = Regex::new(pattern).with_context(|| format!("Invalid pattern '{pattern}'"))?;
    let storage = ctx.storage();
    let db = ctx.db();
    let matched = db.matching_packages(&regex)?;

    // A record outlives its sources only until they are gone.
    for package in &matched {
        remove_dir(&storage.package_src_dir(&package.path))?;
        db.remove_package(&package.path)?;
        info!("Removed {}-{}", package.path, package.version);
    }
    Ok(matched.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cppan_schema::PackageId;
    use tempfile::TempDir;

    #[test]
    fn test_clear_caches_tolerate_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        std::fs::create_dir_all(storage.vars_dir().join("x")).unwrap();

        clear_cache(&storage).unwrap();
        clear_vars_cache(&storage).unwrap();
        assert!(!storage.vars_dir().exists());
    }

    #[test]
    fn test_clean_packages_removes_records_and_sources() {
        let home = TempDir::new().unwrap();
        let ctx = ProcessContext::open(home.path()).unwrap();
        let keep = PackageId::parse("pvt.me.keep-1.0").unwrap();
        let stale = PackageId::parse("org.boost.filesystem-1.60.0").unwrap();
        for id in [&keep, &stale] {
            ctx.db().record_package(id).unwrap();
            std::fs::create_dir_all(ctx.storage().package_src_dir(&id.path)).unwrap();
        }

        assert_eq!(clean_packages(&ctx, "^org\\.boost").unwrap(), 1);

        assert!(!ctx.storage().package_src_dir(&stale.path).exists());
        assert!(ctx.storage().package_src_dir(&keep.path).exists());
        assert_eq!(ctx.db().list_packages(None).unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_source_removal_keeps_record() {
        let home = TempDir::new().unwrap();
        let ctx = ProcessContext::open(home.path()).unwrap();
        let stale = PackageId::parse("org.boost.filesystem-1.60.0").unwrap();
        ctx.db().record_package(&stale).unwrap();
        // A plain file where the source directory should be cannot be
        // removed as a directory tree.
        let src = ctx.storage().package_src_dir(&stale.path);
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, "not a directory").unwrap();

        assert!(clean_packages(&ctx, "^org\\.boost").is_err());

        let left = ctx.db().list_packages(None).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].path, stale.path);
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let home = TempDir::new().unwrap();
        let ctx = ProcessContext::open(home.path()).unwrap();
        assert!(clean_packages(&ctx, "(").is_err());
    }
}
