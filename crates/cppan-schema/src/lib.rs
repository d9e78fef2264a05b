//! Shared value types for cppan.
//!
//! Every layer of the tool addresses packages through [`PackagePath`], a
//! dotted hierarchical identifier such as `org.boost.filesystem`. The type is
//! ordered element-wise so it can key maps of package metadata and produce
//! stable listings.

pub mod id;
pub mod path;

// Re-exports
pub use id::{PackageId, PackageIdError};
pub use path::{PackagePath, PathError, RootNamespace};
