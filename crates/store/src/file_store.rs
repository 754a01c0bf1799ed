//! File-backed record store.
//!
//! Each record lives in its own file, sharded by the first four characters of the id:
//!
//! ```text
//! <root>/
//! └── RS/
//!     └── SM/
//!         └── RSSMRA80A01H501U.gp   # 44-byte CertificateRecord layout
//! ```
//!
//! Because a [`HealthCardId`] is exactly 16 ASCII alphanumerics, the derived path can never
//! escape the root directory.
//!
//! Locks are advisory `flock` locks taken on the record file itself, so they coordinate
//! every process that opens the same tree through this type. A record file of zero length
//! belongs to a `create` that has not finished writing and is reported as absent.

use crate::{RecordStore, StoreError, StoreResult, UpdateOutcome};
use fs2::FileExt;
use greenpass_types::{CertificateRecord, HealthCardId, TestResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File extension of a stored record.
pub const RECORD_FILE_EXTENSION: &str = "gp";

/// Record store rooted at a directory on the local filesystem.
#[derive(Debug)]
pub struct FileRecordStore {
    /// Canonicalised root directory of the record tree
    root_directory: PathBuf,
}

impl FileRecordStore {
    /// Opens the store rooted at `root_directory`, creating the directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRootDirectory` if the path exists but is not a directory,
    /// or if it cannot be created or canonicalised.
    pub fn open(root_directory: &Path) -> StoreResult<Self> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(StoreError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            StoreError::InvalidRootDirectory(format!(
                "Cannot create directory {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            StoreError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        tracing::debug!(root = %root_directory.display(), "opened file record store");

        Ok(Self { root_directory })
    }

    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Path of the file holding the record for `id`.
    #[must_use]
    pub fn record_path(&self, id: &HealthCardId) -> PathBuf {
        id.shard_dir(&self.root_directory)
            .join(format!("{id}.{RECORD_FILE_EXTENSION}"))
    }

    fn decode(path: &Path, bytes: &[u8]) -> StoreResult<CertificateRecord> {
        CertificateRecord::from_bytes(bytes).map_err(|source| StoreError::CorruptRecord {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl RecordStore for FileRecordStore {
    fn create(&self, record: &CertificateRecord) -> StoreResult<()> {
        let path = self.record_path(&record.health_card_id);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| io_context(e, "create record directory", parent))?;
        }

        // Truncation waits for the lock so a concurrent reader never sees a half-written file.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_context(e, "open record", &path))?;
        FileExt::lock_exclusive(&file).map_err(|e| io_context(e, "lock record", &path))?;

        let result = write_record(&mut file, record).map_err(|e| io_context(e, "write record", &path));
        FileExt::unlock(&file).map_err(|e| io_context(e, "unlock record", &path))?;
        result?;

        tracing::debug!(health_card_id = %record.health_card_id, "record created");
        Ok(())
    }

    fn fetch(&self, id: &HealthCardId) -> StoreResult<Option<CertificateRecord>> {
        let path = self.record_path(id);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_context(e, "open record", &path)),
        };
        FileExt::lock_shared(&file).map_err(|e| io_context(e, "lock record", &path))?;

        let mut bytes = Vec::new();
        let result = file.read_to_end(&mut bytes);
        FileExt::unlock(&file).map_err(|e| io_context(e, "unlock record", &path))?;
        result.map_err(|e| io_context(e, "read record", &path))?;

        if bytes.is_empty() {
            return Ok(None);
        }
        Self::decode(&path, &bytes).map(Some)
    }

    fn update_report(
        &self,
        id: &HealthCardId,
        test_result: TestResult,
    ) -> StoreResult<UpdateOutcome> {
        let path = self.record_path(id);

        let mut file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(UpdateOutcome::NotFound),
            Err(e) => return Err(io_context(e, "open record", &path)),
        };
        FileExt::lock_exclusive(&file).map_err(|e| io_context(e, "lock record", &path))?;

        let result = read_modify_write(&mut file, &path, test_result);
        FileExt::unlock(&file).map_err(|e| io_context(e, "unlock record", &path))?;
        let outcome = result?;

        tracing::debug!(
            health_card_id = %id,
            test_result = %test_result,
            ?outcome,
            "test report applied"
        );
        Ok(outcome)
    }
}

fn write_record(file: &mut File, record: &CertificateRecord) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&record.to_bytes())?;
    file.sync_data()
}

fn read_modify_write(
    file: &mut File,
    path: &Path,
    test_result: TestResult,
) -> StoreResult<UpdateOutcome> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| io_context(e, "read record", path))?;
    if bytes.is_empty() {
        return Ok(UpdateOutcome::NotFound);
    }

    let record = FileRecordStore::decode(path, &bytes)?.with_test_result(test_result);
    write_record(file, &record).map_err(|e| io_context(e, "write record", path))?;
    Ok(UpdateOutcome::Updated)
}

fn io_context(e: io::Error, action: &str, path: &Path) -> StoreError {
    StoreError::Io(io::Error::new(
        e.kind(),
        format!("Failed to {} {}: {}", action, path.display(), e),
    ))
}
