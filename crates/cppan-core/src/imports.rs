//! `internal-fix-imports`: add alias targets to an exported CMake import file.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Copy `old_file` to `new_file`, appending a guarded imported target for
/// every alias listed in `aliases_file` (one per line) that forwards to
/// `target`. The new file is left untouched when nothing changed.
pub fn fix_imports(target: &str, aliases_file: &Path, old_file: &Path, new_file: &Path) -> Result<()> {
    let aliases = std::fs::read_to_string(aliases_file)
        .with_context(|| format!("Failed to read aliases from {}", aliases_file.display()))?;
    let old = std::fs::read_to_string(old_file)
        .with_context(|| format!("Failed to read {}", old_file.display()))?;

    let aliases: BTreeSet<&str> = aliases
        .lines()
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != target)
        .collect();

    let content = render(target, &aliases, &old);
    if write_file_if_different(new_file, &content)? {
        debug!("updated {}", new_file.display());
    }
    Ok(())
}

fn render(target: &str, aliases: &BTreeSet<&str>, old: &str) -> String {
    let mut out = String::with_capacity(old.len() + aliases.len() * 160);
    out.push_str(old);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if aliases.is_empty() {
        return out;
    }
    let _ = write!(out, "\n# aliases for {target}\n");
    for alias in aliases {
        let _ = write!(
            out,
            "if (NOT TARGET {alias})\n    \
             add_library({alias} INTERFACE IMPORTED)\n    \
             set_target_properties({alias} PROPERTIES INTERFACE_LINK_LIBRARIES {target})\n\
             endif()\n"
        );
    }
    out
}

/// Write `content` unless the file already holds exactly that. Returns
/// whether a write happened.
pub fn write_file_if_different(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == content {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_aliases_are_appended_once_each() {
        let dir = TempDir::new().unwrap();
        let aliases = dir.path().join("aliases.txt");
        let old = dir.path().join("old.cmake");
        let new = dir.path().join("out/new.cmake");
        std::fs::write(&aliases, "boost::fs\n\ncppan::boost\nboost::fs\npvt_fs\n").unwrap();
        std::fs::write(&old, "add_library(pvt_fs STATIC IMPORTED)").unwrap();

        fix_imports("pvt_fs", &aliases, &old, &new).unwrap();

        let text = std::fs::read_to_string(&new).unwrap();
        assert!(text.starts_with("add_library(pvt_fs STATIC IMPORTED)\n"));
        assert_eq!(text.matches("if (NOT TARGET boost::fs)").count(), 1);
        assert!(text.contains("INTERFACE_LINK_LIBRARIES pvt_fs"));
        assert!(!text.contains("if (NOT TARGET pvt_fs)"));
    }

    #[test]
    fn test_unchanged_content_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        assert!(write_file_if_different(&path, "a").unwrap());
        assert!(!write_file_if_different(&path, "a").unwrap());
        assert!(write_file_if_different(&path, "b").unwrap());
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let new = dir.path().join("new.cmake");
        let missing = dir.path().join("missing");
        assert!(fix_imports("t", &missing, &missing, &new).is_err());
        assert!(!new.exists());
    }
}
