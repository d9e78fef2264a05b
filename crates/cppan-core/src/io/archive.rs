//! Archive creation for `--prepare-archive`.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;

/// Write `files` (relative to `root`) into a gzip-compressed tarball at `dest`.
pub fn pack_tar_gz(root: &Path, files: &[PathBuf], dest: &Path) -> Result<()> {
    let file = File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for rel in files {
        builder
            .append_path_with_name(root.join(rel), rel)
            .with_context(|| format!("Failed to add {}", rel.display()))?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}
