//! In-memory record store.

use crate::{RecordStore, StoreError, StoreResult, UpdateOutcome};
use greenpass_types::{CertificateRecord, HealthCardId, TestResult};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Slot = Arc<RwLock<CertificateRecord>>;

/// Record store holding every record in process memory.
///
/// The outer map lock is held only long enough to find or insert a slot; each slot carries its
/// own `RwLock`, so operations on one id never block operations on another.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<HealthCardId, Slot>>,
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    ///
    /// A poisoned map lock is read through: every map mutation is a single insert, so the
    /// count stays accurate after a panicking writer.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: &HealthCardId) -> StoreResult<Option<Slot>> {
        let map = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned(id.to_string()))?;
        Ok(map.get(id).cloned())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, record: &CertificateRecord) -> StoreResult<()> {
        let id = &record.health_card_id;
        let existing = {
            let mut map = self
                .records
                .write()
                .map_err(|_| StoreError::LockPoisoned(id.to_string()))?;
            if let Some(slot) = map.get(id).cloned() {
                slot
            } else {
                map.insert(id.clone(), Arc::new(RwLock::new(record.clone())));
                return Ok(());
            }
        };

        let mut slot = existing
            .write()
            .map_err(|_| StoreError::LockPoisoned(id.to_string()))?;
        *slot = record.clone();
        Ok(())
    }

    fn fetch(&self, id: &HealthCardId) -> StoreResult<Option<CertificateRecord>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        let record = slot
            .read()
            .map_err(|_| StoreError::LockPoisoned(id.to_string()))?;
        Ok(Some(record.clone()))
    }

    fn update_report(
        &self,
        id: &HealthCardId,
        test_result: TestResult,
    ) -> StoreResult<UpdateOutcome> {
        let Some(slot) = self.slot(id)? else {
            return Ok(UpdateOutcome::NotFound);
        };
        let mut record = slot
            .write()
            .map_err(|_| StoreError::LockPoisoned(id.to_string()))?;
        record.test_result = test_result;
        Ok(UpdateOutcome::Updated)
    }
}
