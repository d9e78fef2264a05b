//! Hierarchical package identifiers.
//!
//! A package path is a non-empty sequence of non-empty elements written with
//! `.` as the delimiter: `org.boost.filesystem`. Paths that start with one of
//! the reserved [`RootNamespace`]s are *absolute*; everything else is relative
//! to some namespace supplied by the caller.

use std::fmt;
use std::ops::Div;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delimiter between path elements in the textual form.
pub const DELIMITER: char = '.';

/// Errors produced while building or inspecting a [`PackagePath`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The text contained an empty element (`a..b`, `.a`, `a.`).
    #[error("invalid package path '{0}': empty element")]
    InvalidPathFormat(String),

    /// The path does not start with a reserved root followed by an owner.
    #[error("package path '{0}' has no owner")]
    NoOwner(String),

    /// The path has no elements.
    #[error("package path is empty")]
    EmptyPath,

    /// The path has a single element and therefore no parent.
    #[error("package path '{0}' has no parent")]
    NoParent(String),
}

/// The four reserved top-level namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RootNamespace {
    /// Commercial packages (`com.`).
    Com,
    /// Local, never published packages (`loc.`).
    Loc,
    /// Open source organizations (`org.`).
    Org,
    /// Personal namespaces (`pvt.`).
    Pvt,
}

impl RootNamespace {
    /// All reserved roots in declaration order.
    pub const ALL: [Self; 4] = [Self::Com, Self::Loc, Self::Org, Self::Pvt];

    /// The element that spells this root.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Com => "com",
            Self::Loc => "loc",
            Self::Org => "org",
            Self::Pvt => "pvt",
        }
    }

    /// Look up a root by its element, returning `None` for anything else.
    pub fn from_element(element: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|root| root.as_str() == element)
    }

    /// The single-element path naming this root.
    pub fn path(self) -> PackagePath {
        PackagePath {
            elements: vec![self.as_str().to_string()],
        }
    }
}

impl fmt::Display for RootNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dotted package identifier.
///
/// Equality and ordering are element-wise, so `org.a` < `org.a.b` < `org.b`.
/// Values are never mutated in place; [`parent`](Self::parent),
/// [`join`](Self::join) and `/` produce new paths.
///
/// # Example
///
/// ```
/// use cppan_schema::PackagePath;
///
/// let path: PackagePath = "org.boost.filesystem".parse().unwrap();
/// assert_eq!(path.owner().unwrap(), "boost");
/// assert_eq!(path.name().unwrap(), "filesystem");
/// assert_eq!(path.parent().unwrap().to_string(), "org.boost");
/// ```
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct PackagePath {
    elements: Vec<String>,
}

impl PackagePath {
    /// The empty path. It is a root of every other path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse dotted text. The empty string yields the empty path.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Ok(Self::new());
        }
        if text.split(DELIMITER).any(str::is_empty) {
            return Err(PathError::InvalidPathFormat(text.to_string()));
        }
        Ok(Self {
            elements: text.split(DELIMITER).map(str::to_string).collect(),
        })
    }

    /// Build a path from explicit elements, rejecting empty ones.
    pub fn from_elements<I, S>(elements: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements: Vec<String> = elements.into_iter().map(Into::into).collect();
        if elements.iter().any(String::is_empty) {
            return Err(PathError::InvalidPathFormat(elements.join(".")));
        }
        Ok(Self { elements })
    }

    /// Join the elements with a custom delimiter.
    pub fn to_string_with(&self, delimiter: &str) -> String {
        self.elements.join(delimiter)
    }

    /// Map the elements onto nested directories, in order.
    pub fn to_filesystem_path(&self) -> PathBuf {
        self.elements.iter().collect()
    }

    /// The elements in order.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.elements.iter()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the path has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The reserved root this path starts with, if any.
    pub fn root(&self) -> Option<RootNamespace> {
        self.elements
            .first()
            .and_then(|first| RootNamespace::from_element(first))
    }

    /// Whether the path starts with a reserved root.
    pub fn has_namespace(&self) -> bool {
        self.root().is_some()
    }

    /// True when the first element is a reserved root, or equals `username`
    /// (a personal namespace written without its `pvt.` prefix).
    pub fn is_absolute(&self, username: Option<&str>) -> bool {
        let Some(first) = self.elements.first() else {
            return false;
        };
        if RootNamespace::from_element(first).is_some() {
            return true;
        }
        username.is_some_and(|user| !user.is_empty() && first == user)
    }

    /// Negation of [`is_absolute`](Self::is_absolute).
    pub fn is_relative(&self, username: Option<&str>) -> bool {
        !self.is_absolute(username)
    }

    /// True when `self` is an equal-or-strict prefix of `other`.
    pub fn is_root_of(&self, other: &PackagePath) -> bool {
        other.elements.starts_with(&self.elements)
    }

    /// The owner element that follows a reserved root.
    pub fn owner(&self) -> Result<&str, PathError> {
        if self.elements.len() < 2 || !self.has_namespace() {
            return Err(PathError::NoOwner(self.to_string()));
        }
        Ok(&self.elements[1])
    }

    /// The last element.
    pub fn name(&self) -> Result<&str, PathError> {
        self.elements
            .last()
            .map(String::as_str)
            .ok_or(PathError::EmptyPath)
    }

    /// Everything but the last element.
    pub fn parent(&self) -> Result<PackagePath, PathError> {
        match self.elements.len() {
            0 => Err(PathError::EmptyPath),
            1 => Err(PathError::NoParent(self.to_string())),
            n => Ok(Self {
                elements: self.elements[..n - 1].to_vec(),
            }),
        }
    }

    /// Append the elements of a dotted suffix. An empty suffix returns an
    /// unchanged copy.
    pub fn join(&self, suffix: &str) -> Result<PackagePath, PathError> {
        let suffix = Self::parse(suffix)?;
        Ok(self / &suffix)
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with("."))
    }
}

impl FromStr for PackagePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackagePath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl TryFrom<&str> for PackagePath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<PackagePath> for String {
    fn from(path: PackagePath) -> Self {
        path.to_string()
    }
}

impl Div<&PackagePath> for &PackagePath {
    type Output = PackagePath;

    fn div(self, rhs: &PackagePath) -> PackagePath {
        let mut elements = self.elements.clone();
        elements.extend(rhs.elements.iter().cloned());
        PackagePath { elements }
    }
}

impl Div<PackagePath> for PackagePath {
    type Output = PackagePath;

    fn div(mut self, rhs: PackagePath) -> PackagePath {
        self.elements.extend(rhs.elements);
        self
    }
}

impl<'a> IntoIterator for &'a PackagePath {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn p(s: &str) -> PackagePath {
        PackagePath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let path = p("org.boost.filesystem");
        assert_eq!(path.elements(), ["org", "boost", "filesystem"]);
        assert_eq!(path.to_string(), "org.boost.filesystem");
        assert_eq!(path.to_string_with("/"), "org/boost/filesystem");
    }

    #[test]
    fn test_parse_rejects_empty_elements() {
        for bad in [".org", "org.", "org..boost", "."] {
            assert!(
                matches!(PackagePath::parse(bad), Err(PathError::InvalidPathFormat(_))),
                "{bad} should be rejected"
            );
        }
        assert!(PackagePath::from_elements(["org", ""]).is_err());
    }

    #[test]
    fn test_empty_text_is_empty_path() {
        assert!(p("").is_empty());
    }

    #[test]
    fn test_filesystem_path() {
        let fs = p("pvt.egor.demo").to_filesystem_path();
        assert_eq!(fs, PathBuf::from("pvt").join("egor").join("demo"));
    }

    #[test]
    fn test_is_absolute_for_every_root() {
        for root in RootNamespace::ALL {
            let path = root.path().join("someone.pkg").unwrap();
            assert!(path.is_absolute(None), "{path}");
            assert!(!path.is_relative(None));
            assert_eq!(path.root(), Some(root));
        }
    }

    #[test]
    fn test_is_absolute_username_and_relative() {
        let path = p("egor.demo");
        assert!(path.is_relative(None));
        assert!(path.is_absolute(Some("egor")));
        assert!(path.is_relative(Some("other")));
        assert!(p("boost.filesystem").is_relative(Some("")));
        assert!(PackagePath::new().is_relative(None));
    }

    #[test]
    fn test_is_root_of() {
        let org = p("org");
        let boost = p("org.boost");
        let fs = p("org.boost.filesystem");
        assert!(org.is_root_of(&fs));
        assert!(boost.is_root_of(&fs));
        assert!(fs.is_root_of(&fs));
        assert!(PackagePath::new().is_root_of(&fs));
        assert!(!fs.is_root_of(&boost));
        assert!(!p("org.qt").is_root_of(&fs));
        assert!(!p("com.boost").is_root_of(&fs));
    }

    #[test]
    fn test_owner_name_parent() {
        let path = p("org.boost.filesystem");
        assert_eq!(path.owner().unwrap(), "boost");
        assert_eq!(path.name().unwrap(), "filesystem");
        assert_eq!(path.parent().unwrap(), p("org.boost"));

        assert!(matches!(p("org").owner(), Err(PathError::NoOwner(_))));
        assert!(matches!(p("boost.filesystem").owner(), Err(PathError::NoOwner(_))));
        assert_eq!(PackagePath::new().name(), Err(PathError::EmptyPath));
        assert!(matches!(p("org").parent(), Err(PathError::NoParent(_))));
        assert_eq!(PackagePath::new().parent(), Err(PathError::EmptyPath));
    }

    #[test]
    fn test_concatenation() {
        let base = p("org.boost");
        assert_eq!(base.join("").unwrap(), base);
        assert_eq!(base.join("filesystem").unwrap(), p("org.boost.filesystem"));
        assert_eq!(base.join("a.b").unwrap(), p("org.boost.a.b"));
        assert!(base.join("a..b").is_err());
        assert_eq!(&base / &p("asio"), p("org.boost.asio"));
        assert_eq!(base.clone() / PackagePath::new(), base);
    }

    #[test]
    fn test_ordering_is_element_wise() {
        let mut paths = vec![p("org.b"), p("org.a.c"), p("org.a"), p("com.x")];
        paths.sort();
        assert_eq!(paths, vec![p("com.x"), p("org.a"), p("org.a.c"), p("org.b")]);
        // plain string order would put "org.a-b" first
        assert!(p("org.a-b") > p("org.a.b"));
    }

    #[test]
    fn test_map_key() {
        let mut map = BTreeMap::new();
        map.insert(p("org.boost.filesystem"), 2);
        map.insert(p("org.boost.asio"), 1);
        let keys: Vec<String> = map.keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["org.boost.asio", "org.boost.filesystem"]);
    }

    #[test]
    fn test_string_conversions() {
        let text: String = p("org.boost.filesystem").into();
        assert_eq!(PackagePath::try_from(text).unwrap(), p("org.boost.filesystem"));
        assert!(PackagePath::try_from("org..x").is_err());
    }

    fn elements() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z0-9_]{1,6}", 1..6)
    }

    proptest! {
        #[test]
        fn prop_parse_inverts_display(elems in elements()) {
            let path = PackagePath::from_elements(elems).unwrap();
            prop_assert_eq!(PackagePath::parse(&path.to_string()).unwrap(), path);
        }

        #[test]
        fn prop_is_root_of_matches_prefix(a in elements(), b in elements()) {
            let pa = PackagePath::from_elements(a.clone()).unwrap();
            let pb = PackagePath::from_elements(b.clone()).unwrap();
            prop_assert_eq!(pa.is_root_of(&pb), b.starts_with(&a));
            prop_assert!(pa.is_root_of(&(&pa / &pb)));
        }

        #[test]
        fn prop_order_matches_elements(a in elements(), b in elements()) {
            let pa = PackagePath::from_elements(a.clone()).unwrap();
            let pb = PackagePath::from_elements(b.clone()).unwrap();
            prop_assert_eq!(pa.cmp(&pb), a.cmp(&b));
        }

        #[test]
        fn prop_sort_is_stable(mut set in prop::collection::vec(elements(), 0..8)) {
            let mut first: Vec<PackagePath> = set
                .drain(..)
                .map(|e| PackagePath::from_elements(e).unwrap())
                .collect();
            let mut second = first.clone();
            second.reverse();
            first.sort();
            second.sort();
            prop_assert_eq!(first, second);
        }
    }
}
