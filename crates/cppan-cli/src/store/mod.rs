//! Persistent bookkeeping

pub mod db;

pub use db::{DbError, PackageRecord, ServiceDb};
