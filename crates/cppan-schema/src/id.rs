//! Versioned package identifiers (`org.boost.filesystem-1.60.0`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::path::{PackagePath, PathError};

/// Errors produced while parsing a [`PackageId`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageIdError {
    /// The path part was not a valid [`PackagePath`].
    #[error(transparent)]
    Path(#[from] PathError),

    /// The text had no `-version` suffix.
    #[error("package '{0}' has no version (expected path-version)")]
    MissingVersion(String),
}

/// A package path pinned to a version.
///
/// # Example
///
/// ```
/// use cppan_schema::PackageId;
///
/// let id: PackageId = "org.boost.filesystem-1.60.0".parse().unwrap();
/// assert_eq!(id.path.to_string(), "org.boost.filesystem");
/// assert_eq!(id.version, "1.60.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    /// Which package.
    pub path: PackagePath,
    /// Version text, compared verbatim.
    pub version: String,
}

impl PackageId {
    /// Split `path-version` at the last `-`.
    pub fn parse(text: &str) -> Result<Self, PackageIdError> {
        let (path, version) = text
            .rsplit_once('-')
            .filter(|(path, version)| !path.is_empty() && !version.is_empty())
            .ok_or_else(|| PackageIdError::MissingVersion(text.to_string()))?;

        Ok(Self {
            path: PackagePath::parse(path)?,
            version: version.to_string(),
        })
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.path, self.version)
    }
}

impl FromStr for PackageId {
    type Err = PackageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
