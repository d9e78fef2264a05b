//! User and local configuration.
//!
//! The user configuration lives in `~/.cppan/config.toml` and is materialized
//! with defaults on first use. A local configuration (`cppan.toml`) in the
//! working directory overrides settings and declares the projects to process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::builder::BuildDriver;
use crate::io::archive::pack_tar_gz;
use crate::paths::{LOCAL_CONFIG_NAME, Storage, user_config_path};
use cppan_schema::PackagePath;

/// Default package server.
pub const DEFAULT_HOST: &str = "https://cppan.org";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no cppan.toml found in {}", .0.display())]
    NotFound(PathBuf),
}

/// Settings shared by the user and local configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Package server base URL.
    pub host: String,
    /// Proxy for all network traffic.
    pub proxy: Option<String>,
    /// Where sources and caches are stored. Defaults to `~/.cppan/storage`.
    pub storage_dir: Option<PathBuf>,
    /// Personal namespace, used to resolve `pvt.<username>` shorthands.
    pub username: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            proxy: None,
            storage_dir: None,
            username: None,
        }
    }
}

impl Settings {
    /// Load `<home>/config.toml`, writing a default file when none exists.
    pub fn load_user(home: &Path) -> Result<Self, ConfigError> {
        let path = user_config_path(home);
        if !path.exists() {
            let settings = Self::default();
            let text = toml::to_string_pretty(&settings)?;
            std::fs::create_dir_all(home).map_err(|source| ConfigError::Io {
                path: home.to_path_buf(),
                source,
            })?;
            std::fs::write(&path, text).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            debug!("wrote default user config to {}", path.display());
            return Ok(settings);
        }
        read_toml(&path)
    }

    /// Storage layout for these settings.
    pub fn storage(&self, home: &Path) -> Storage {
        match &self.storage_dir {
            Some(dir) => Storage::new(dir),
            None => Storage::new(home.join("storage")),
        }
    }

    fn apply(&mut self, overrides: LocalSettings) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(proxy) = overrides.proxy {
            self.proxy = Some(proxy);
        }
        if let Some(dir) = overrides.storage_dir {
            self.storage_dir = Some(dir);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalSettings {
    host: Option<String>,
    proxy: Option<String>,
    storage_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalFile {
    settings: LocalSettings,
    projects: BTreeMap<PackagePath, ProjectSpec>,
}

#[derive(Debug, Deserialize)]
struct ProjectSpec {
    #[serde(default = "default_source")]
    source: PathBuf,
    version: Option<String>,
}

fn default_source() -> PathBuf {
    PathBuf::from(".")
}

/// A project declared in `cppan.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub path: PackagePath,
    /// Source root, relative to the configuration directory.
    pub source: PathBuf,
    pub version: Option<String>,
    files: Vec<PathBuf>,
}

impl Project {
    pub fn new(path: PackagePath, source: impl Into<PathBuf>) -> Self {
        Self {
            path,
            source: source.into(),
            version: None,
            files: Vec::new(),
        }
    }

    /// Collect regular files under the project source, relative to it.
    /// Hidden entries (`.git`, `.cppan`) are skipped.
    pub fn find_sources(&mut self, base: &Path) -> Result<&[PathBuf]> {
        let root = base.join(&self.source);
        let mut files = Vec::new();
        let walker = walkdir::WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
            if entry.file_type().is_file() {
                let rel = entry.path().strip_prefix(&root)?.to_path_buf();
                files.push(rel);
            }
        }
        self.files = files;
        Ok(&self.files)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Drop collected files that resolve to one of `outputs`, so archives
    /// written next to the sources are never packed into each other.
    pub fn exclude(&mut self, base: &Path, outputs: &[PathBuf]) {
        let root = base.join(&self.source);
        self.files.retain(|f| !outputs.contains(&root.join(f)));
    }

    /// Write the collected sources into a `.tar.gz` archive.
    pub fn write_archive(&self, base: &Path, archive: &Path) -> Result<()> {
        pack_tar_gz(&base.join(&self.source), &self.files, archive)
            .with_context(|| format!("Failed to write archive for {}", self.path))
    }
}

/// Archive file name for a project (`org.demo.hello.tar.gz`).
pub fn make_archive_name(name: &str) -> String {
    format!("{name}.tar.gz")
}

/// What the orchestrator needs from a loaded configuration.
pub trait ConfigSession {
    /// Effective settings (user settings with local overrides).
    fn settings(&self) -> &Settings;

    /// Load `cppan.toml` from the current working directory.
    fn load_current_config(&mut self) -> Result<()>;

    /// Projects declared by the local configuration, ordered by path.
    fn projects(&mut self) -> &mut BTreeMap<PackagePath, Project>;

    /// Run the full processing contract for the loaded configuration.
    fn process(&mut self, driver: &dyn BuildDriver) -> Result<()>;
}

/// File-backed configuration session.
#[derive(Debug, Clone)]
pub struct Config {
    settings: Settings,
    dir: Option<PathBuf>,
    projects: BTreeMap<PackagePath, Project>,
}

impl Config {
    /// Start a session from the user settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            dir: None,
            projects: BTreeMap::new(),
        }
    }

    /// Load the local configuration found in `dir`.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), ConfigError> {
        let path = dir.join(LOCAL_CONFIG_NAME);
        if !path.is_file() {
            return Err(ConfigError::NotFound(dir.to_path_buf()));
        }
        let local: LocalFile = read_toml(&path)?;
        self.settings.apply(local.settings);
        self.projects = local
            .projects
            .into_iter()
            .map(|(path, spec)| {
                let mut project = Project::new(path.clone(), spec.source);
                project.version = spec.version;
                (path, project)
            })
            .collect();
        self.dir = Some(dir.to_path_buf());
        debug!("loaded {} with {} project(s)", path.display(), self.projects.len());
        Ok(())
    }
}

impl ConfigSession for Config {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn load_current_config(&mut self) -> Result<()> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        self.load_dir(&cwd)?;
        Ok(())
    }

    fn projects(&mut self) -> &mut BTreeMap<PackagePath, Project> {
        &mut self.projects
    }

    fn process(&mut self, driver: &dyn BuildDriver) -> Result<()> {
        let Some(dir) = self.dir.clone() else {
            bail!("configuration was not loaded");
        };
        if self.projects.is_empty() {
            bail!("{} declares no projects", dir.join(LOCAL_CONFIG_NAME).display());
        }
        for (path, project) in &self.projects {
            let source = dir.join(&project.source);
            if !source.is_dir() {
                bail!("source of {path} not found: {}", source.display());
            }
            info!("Processing {path}");
        }
        let status = driver.generate(&dir, None)?;
        if status != 0 {
            bail!("build system generation failed with status {status}");
        }
        Ok(())
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
