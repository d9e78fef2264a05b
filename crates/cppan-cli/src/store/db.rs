//! SQLite service database
//!
//! Tracks the client version that last ran and the packages built from
//! storage.

use std::path::Path;

use cppan_schema::{PackageId, PackagePath, PathError};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt package path in service database: {0}")]
    Path(#[from] PathError),
}

/// Stored package record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub path: PackagePath,
    pub version: String,
    pub installed_at: i64,
}

/// Process-local bookkeeping store
#[derive(Debug)]
pub struct ServiceDb {
    conn: Connection,
}

const CLIENT_VERSION_KEY: &str = "client_version";

impl ServiceDb {
    /// Open or create the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS startup (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS packages (
                path TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                installed_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM startup WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO startup (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Client version recorded by the last run.
    pub fn client_version(&self) -> Result<Option<String>, DbError> {
        self.get_value(CLIENT_VERSION_KEY)
    }

    /// Run once per process. When the client version changed since the
    /// last run, cached check results in `vars_dir` are dropped. Returns
    /// whether the version changed.
    pub fn perform_startup_actions(&self, version: &str, vars_dir: &Path) -> Result<bool, DbError> {
        if self.client_version()?.as_deref() == Some(version) {
            return Ok(false);
        }
        match std::fs::remove_dir_all(vars_dir) {
            Ok(()) => info!("Client changed to {version}, cleared {}", vars_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.set_value(CLIENT_VERSION_KEY, version)?;
        Ok(true)
    }

    /// Record a package built from storage.
    pub fn record_package(&self, id: &PackageId) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO packages (path, version, installed_at)
             VALUES (?1, ?2, ?3)",
            params![id.path.to_string(), id.version, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Packages whose path contains `filter`, in package path order.
    pub fn list_packages(&self, filter: Option<&str>) -> Result<Vec<PackageRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, version, installed_at FROM packages")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut packages = Vec::new();
        for row in rows {
            let (path, version, installed_at) = row?;
            if filter.is_some_and(|f| !path.contains(f)) {
                continue;
            }
            packages.push(PackageRecord {
                path: PackagePath::parse(&path)?,
                version,
                installed_at,
            });
        }
        packages.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(packages)
    }

    /// Packages whose path matches `pattern`, in package path order.
    pub fn matching_packages(&self, pattern: &Regex) -> Result<Vec<PackageRecord>, DbError> {
        Ok(self
            .list_packages(None)?
            .into_iter()
            .filter(|p| pattern.is_match(&p.path.to_string()))
            .collect())
    }

    pub fn remove_package(&self, path: &PackagePath) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM packages WHERE path = ?1",
            params![path.to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id(text: &str) -> PackageId {
        PackageId::parse(text).unwrap()
    }

    #[test]
    fn test_startup_clears_vars_once_per_version() {
        let dir = tempdir().unwrap();
        let vars = dir.path().join("vars");
        std::fs::create_dir_all(&vars).unwrap();
        std::fs::write(vars.join("checks.txt"), "HAVE_STDIO_H 1").unwrap();

        let db = ServiceDb::open_at(&dir.path().join("service.db")).unwrap();
        assert!(db.perform_startup_actions("1.0", &vars).unwrap());
        assert!(!vars.exists());
        assert_eq!(db.client_version().unwrap().as_deref(), Some("1.0"));

        std::fs::create_dir_all(&vars).unwrap();
        assert!(!db.perform_startup_actions("1.0", &vars).unwrap());
        assert!(vars.exists());

        assert!(db.perform_startup_actions("1.1", &vars).unwrap());
        assert!(!vars.exists());
    }

    #[test]
    fn test_list_is_in_path_order_and_filtered() {
        let dir = tempdir().unwrap();
        let db = ServiceDb::open_at(&dir.path().join("service.db")).unwrap();

        db.record_package(&id("org.boost.filesystem-1.60.0")).unwrap();
        db.record_package(&id("org.a-b.demo-1.0")).unwrap();
        db.record_package(&id("org.a.zlib-1.2.11")).unwrap();

        let names: Vec<String> = db
            .list_packages(None)
            .unwrap()
            .iter()
            .map(|p| p.path.to_string())
            .collect();
        assert_eq!(names, ["org.a.zlib", "org.a-b.demo", "org.boost.filesystem"]);

        let boost = db.list_packages(Some("boost")).unwrap();
        assert_eq!(boost.len(), 1);
        assert_eq!(boost[0].version, "1.60.0");
    }

    #[test]
    fn test_record_replaces_version() {
        let dir = tempdir().unwrap();
        let db = ServiceDb::open_at(&dir.path().join("service.db")).unwrap();

        db.record_package(&id("pvt.me.demo-0.1")).unwrap();
        db.record_package(&id("pvt.me.demo-0.2")).unwrap();

        let packages = db.list_packages(None).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version, "0.2");
    }

    #[test]
    fn test_match_then_remove_packages() {
        let dir = tempdir().unwrap();
        let db = ServiceDb::open_at(&dir.path().join("service.db")).unwrap();

        db.record_package(&id("org.boost.filesystem-1.60.0")).unwrap();
        db.record_package(&id("org.boost.system-1.60.0")).unwrap();
        db.record_package(&id("pvt.me.demo-0.1")).unwrap();

        let matched = db.matching_packages(&Regex::new(r"^org\.boost\.").unwrap()).unwrap();
        assert_eq!(matched.len(), 2);
        assert_eq!(db.list_packages(None).unwrap().len(), 3);

        for package in &matched {
            db.remove_package(&package.path).unwrap();
        }

        let left = db.list_packages(None).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].path.to_string(), "pvt.me.demo");
    }
}
