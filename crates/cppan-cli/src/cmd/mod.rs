//! Command implementations

pub mod clean;
pub mod internal;
pub mod list;
pub mod self_upgrade;
