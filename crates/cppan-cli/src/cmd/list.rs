//! List command

use anyhow::Result;

use crate::ProcessContext;

/// List packages from the service database, optionally filtered by a
/// substring of their path.
pub fn list(ctx: &ProcessContext, filter: Option<&str>) -> Result<()> {
    let packages = ctx.db().list_packages(filter)?;

    if packages.is_empty() {
        println!("No packages found.");
        return Ok(());
    }

    for package in packages {
        let date = chrono::DateTime::from_timestamp(package.installed_at, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!("{:<40} {:<12} {date}", package.path.to_string(), package.version);
    }
    Ok(())
}
