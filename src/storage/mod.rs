//! Storage collaborator for readings and daily aggregates
//!
//! The pipeline never talks to a database directly. Everything goes through
//! the narrow [`StorageBackend`] contract:
//!
//! - append one reading keyed by elevator identity and timestamp
//! - append a batch of daily aggregate rows
//! - read readings for a time window (optionally for one elevator), oldest first
//! - read the full reading history of one elevator, oldest first
//! - read all aggregate rows of one elevator, most recent reference date first
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with WAL journaling
//! - **In-Memory**: No persistence, used for tests and `"backend": "none"`
//!
//! ## Usage
//!
//! ```no_run
//! use elevator_telemetry::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./telemetry.db").await?;
//!     let history = backend.query_history("elevator-1").await?;
//!     println!("{} readings", history.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, QueryRange, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::DailyAggregate;
