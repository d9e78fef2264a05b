//! IO operations: downloads, archive extraction and packing.

pub mod archive;
pub mod download;
pub mod extract;
