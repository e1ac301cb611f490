//! Seams to the host ledger: epoch-keyed BLS records, the durable
//! key-value store for validation state, and the event sink.
//!
//! All access is synchronous: the enclosing ledger executes one submission
//! at a time, so there are no suspension points anywhere in this crate.

use super::data::EpochBlsData;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(String),
    #[error("codec: {0}")]
    Codec(String),
}

/// Epoch-keyed BLS records. Records are never deleted; the previous
/// epoch's record is the trust anchor for the next validation round.
pub trait EpochStore {
    fn epoch_data(&self, epoch_id: u64) -> Result<Option<EpochBlsData>, StoreError>;
    fn set_epoch_data(&mut self, data: EpochBlsData) -> Result<(), StoreError>;
}

/// Raw durable key-value storage for validation state. Absent keys are
/// `Ok(None)`, not errors.
pub trait ValidationStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
}

/// Protocol notifications observed by off-chain collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    GroupKeyValidated {
        new_epoch_id: u64,
        final_signature: Vec<u8>,
    },
    GroupKeyValidationFailed {
        new_epoch_id: u64,
        reason: String,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

/// In-memory store backing tests and embedders without a durable host.
#[derive(Debug, Default)]
pub struct MemStore {
    epochs: BTreeMap<u64, EpochBlsData>,
    kv: BTreeMap<String, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EpochStore for MemStore {
    fn epoch_data(&self, epoch_id: u64) -> Result<Option<EpochBlsData>, StoreError> {
        Ok(self.epochs.get(&epoch_id).cloned())
    }

    fn set_epoch_data(&mut self, data: EpochBlsData) -> Result<(), StoreError> {
        self.epochs.insert(data.epoch_id, data);
        Ok(())
    }
}

impl ValidationStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.kv.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.kv.insert(key.to_string(), value);
        Ok(())
    }
}

/// Event sink that records everything emitted, for inspection in tests.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::data::DkgPhase;

    fn epoch(epoch_id: u64) -> EpochBlsData {
        EpochBlsData {
            epoch_id,
            participants: vec![],
            dealer_parts: vec![],
            valid_dealers: vec![],
            group_public_key: vec![],
            dkg_phase: DkgPhase::Completed,
            validation_signature: vec![],
            total_slots: 100,
        }
    }

    #[test]
    fn epoch_records_roundtrip() {
        let mut store = MemStore::new();
        assert!(store.epoch_data(2).expect("get should not fail").is_none());

        store.set_epoch_data(epoch(2)).expect("put should not fail");
        store.set_epoch_data(epoch(3)).expect("put should not fail");

        let record = store
            .epoch_data(2)
            .expect("get should not fail")
            .expect("epoch 2 was stored");
        assert_eq!(record.epoch_id, 2);
        assert_eq!(record.total_slots, 100);
    }

    #[test]
    fn kv_overwrites_in_place() {
        let mut store = MemStore::new();
        assert!(store.get("group_validation_3").expect("get").is_none());

        store
            .set("group_validation_3", vec![1, 2, 3])
            .expect("set should not fail");
        store
            .set("group_validation_3", vec![4, 5, 6])
            .expect("set should not fail");

        let value = store
            .get("group_validation_3")
            .expect("get")
            .expect("key was stored");
        assert_eq!(value, vec![4, 5, 6]);
    }
}
