//! Greenpass Record Store
//!
//! Keyed, lockable persistent storage for [`CertificateRecord`]s. The store is the only
//! shared mutable resource in the system; every entry is guarded by its own lock so that
//! operations on different health-card ids never contend.
//!
//! Two implementations share the [`RecordStore`] interface:
//!
//! - [`FileRecordStore`]: one file per key in a sharded directory tree, locked with advisory
//!   `flock` locks on the record file itself
//! - [`InMemoryRecordStore`]: a map of per-key `RwLock`s, used by tests and ephemeral runs
//!
//! ## Lock discipline
//!
//! | Operation       | Lock      |
//! |-----------------|-----------|
//! | `create`        | exclusive |
//! | `update_report` | exclusive, held across the whole read-modify-write |
//! | `fetch`         | shared    |
//!
//! Locks are scoped to a single local call and are never held across a network round-trip.
//! All operations are blocking; async callers run them on a blocking thread.
//!
//! ## Example Usage
//!
//! ```no_run
//! use greenpass_store::{FileRecordStore, RecordStore};
//! use greenpass_types::HealthCardId;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileRecordStore::open(Path::new("greenpass_data"))?;
//! let id = HealthCardId::parse("RSSMRA80A01H501U")?;
//! if let Some(record) = store.fetch(&id)? {
//!     println!("{} expires {}", record.health_card_id, record.expires_on);
//! }
//! # Ok(())
//! # }
//! ```

mod file_store;
mod memory;

pub use file_store::{FileRecordStore, RECORD_FILE_EXTENSION};
pub use memory::InMemoryRecordStore;

use greenpass_types::{CertificateRecord, HealthCardId, TestResult, TypesError};
use std::path::PathBuf;

/// Errors that can occur during record store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Root directory is not usable
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// A record file exists but does not hold a valid record
    #[error("Corrupt record at {path}: {source}")]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: TypesError,
    },

    /// An in-memory lock was poisoned by a panicking writer
    #[error("Lock poisoned for record {0}")]
    LockPoisoned(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of [`RecordStore::update_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

/// Keyed storage of certificate records.
///
/// Implementations must serialise `create` and `update_report` per key and must never let
/// `fetch` observe a partially written record.
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Creates the record keyed by `record.health_card_id`, overwriting any earlier record
    /// for that id.
    fn create(&self, record: &CertificateRecord) -> StoreResult<()>;

    /// Returns the record for `id`, or `None` when no record exists.
    fn fetch(&self, id: &HealthCardId) -> StoreResult<Option<CertificateRecord>>;

    /// Overwrites only the test-result flag of the record for `id`.
    fn update_report(&self, id: &HealthCardId, test_result: TestResult)
        -> StoreResult<UpdateOutcome>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use greenpass_types::{CalendarDate, CertificateRecord, HealthCardId};

    pub fn id(raw: &str) -> HealthCardId {
        HealthCardId::parse(raw).unwrap()
    }

    pub fn record(raw_id: &str) -> CertificateRecord {
        CertificateRecord::new(
            id(raw_id),
            CalendarDate::new(10, 9, 2023),
            CalendarDate::new(10, 1, 2024),
        )
    }
}
