//! Persistence collaborators for zonal statistics.
//!
//! Provides [`StatsSink`](zonal_stats::StatsSink) implementations for:
//! - PostgreSQL, one table per dataset plus a shared `qa` table
//! - An in-process store with the same natural-key semantics, for dry
//!   runs and tests

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStatsStore;
pub use postgres::PgStatsStore;
