// Copyright 2023-2025 StorSwift Inc.
// SPDX-License-Identifier: Apache-2.0

//! Group key validation: the per-epoch state machine that certifies a new
//! epoch's group public key by having it co-signed, slot by slot, under the
//! previous epoch's key.
//!
//! Submissions accumulate in a `GroupKeyValidationState` keyed by the new
//! epoch id (`absent -> collecting -> validated`). Once covered slots pass
//! the quorum gate, the partials are Lagrange-aggregated and the aggregate
//! is verified against the previous epoch's group public key; success flips
//! the new epoch's phase to `Signed`.

use super::data::{
    validation_state_key, DkgPhase, EpochBlsData, GroupKeyValidationState,
    MsgSubmitGroupKeyValidationSignature, PartialSignature, PhaseError, ValidationStatus,
};
use super::store::{EpochStore, Event, EventSink, StoreError, ValidationStore};
use crate::crypto::{
    aggregate_partial_signatures, g1_from_bytes, g1_to_limbs, g2_from_bytes, hash_to_g1,
    validation_message_hash, verify_partial_signature, CryptoError, G1_POINT_BYTES,
};
use blstrs::{pairing, G2Affine};
use group::prime::PrimeCurveAffine;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

/// Epoch 1 has no predecessor to certify under.
const GENESIS_EPOCH_ID: u64 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("epoch {GENESIS_EPOCH_ID} does not require group key validation (genesis case)")]
    GenesisEpoch,
    #[error("epoch {0} not found")]
    EpochNotFound(u64),
    #[error("epoch {epoch_id} DKG is not completed (current phase: {phase})")]
    InvalidDkgPhase { epoch_id: u64, phase: DkgPhase },
    #[error("participant {address} not found in previous epoch {epoch_id}")]
    UnknownParticipant { address: String, epoch_id: u64 },
    #[error("submitted slot {slot} outside participant range [{start}, {end}]")]
    SlotOutOfRange { slot: u32, start: u32, end: u32 },
    #[error("no new slots in submission")]
    NoNewSlots,
    #[error("failed to compute validation message hash: {0}")]
    MessageHash(CryptoError),
    #[error("partial signature rejected for participant {address}: {source}")]
    InvalidPartialSignature {
        address: String,
        source: CryptoError,
    },
    #[error("failed to aggregate partial signatures: {0}")]
    Aggregation(CryptoError),
    #[error("previous epoch {epoch_id} group public key is invalid: {source}")]
    InvalidGroupKey {
        epoch_id: u64,
        source: CryptoError,
    },
    #[error("final aggregated signature failed verification against previous epoch group key")]
    FinalSignatureInvalid,
    #[error("dkg phase: {0}")]
    Phase(#[from] PhaseError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The new epoch is already `Signed`; nothing was mutated.
    AlreadySigned,
    Accepted {
        slots_covered: u32,
        /// True when this submission reached quorum and the group key was
        /// certified.
        validated: bool,
    },
}

/// Handler for group key validation submissions.
///
/// All state lives behind the store seam; one submission runs to completion
/// at a time under the ledger's sequential execution. Embedders running
/// concurrently must serialize access per epoch key: the
/// read-check-append-write sequence is not safe under interleaving.
pub struct GroupKeyValidator<S, E> {
    store: S,
    events: E,
    chain_id: String,
}

impl<S, E> GroupKeyValidator<S, E>
where
    S: EpochStore + ValidationStore,
    E: EventSink,
{
    pub fn new(store: S, events: E, chain_id: impl Into<String>) -> Self {
        Self {
            store,
            events,
            chain_id: chain_id.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn into_parts(self) -> (S, E) {
        (self.store, self.events)
    }

    /// Processes one partial-signature submission.
    ///
    /// Every rejection leaves all persisted state untouched. The one
    /// asymmetry: when the final aggregate check fails, partials accepted
    /// by *earlier* submissions stay accepted, while the submission that
    /// triggered the failing quorum round is discarded with the error.
    pub fn submit_partial_signature(
        &mut self,
        msg: &MsgSubmitGroupKeyValidationSignature,
    ) -> Result<SubmitOutcome, ValidationError> {
        info!(
            new_epoch_id = msg.new_epoch_id,
            creator = %msg.creator,
            "processing group key validation signature"
        );

        if msg.new_epoch_id == GENESIS_EPOCH_ID {
            info!(new_epoch_id = msg.new_epoch_id, "rejecting group key validation for genesis epoch");
            return Err(ValidationError::GenesisEpoch);
        }

        let new_epoch = self
            .store
            .epoch_data(msg.new_epoch_id)?
            .ok_or(ValidationError::EpochNotFound(msg.new_epoch_id))?;

        if !matches!(new_epoch.dkg_phase, DkgPhase::Completed | DkgPhase::Signed) {
            error!(
                new_epoch_id = msg.new_epoch_id,
                current_phase = %new_epoch.dkg_phase,
                "invalid DKG phase for group key validation"
            );
            return Err(ValidationError::InvalidDkgPhase {
                epoch_id: msg.new_epoch_id,
                phase: new_epoch.dkg_phase,
            });
        }

        // Idempotent no-op: a certified epoch absorbs retried submissions.
        if new_epoch.dkg_phase == DkgPhase::Signed {
            info!(new_epoch_id = msg.new_epoch_id, "group key validation already completed");
            return Ok(SubmitOutcome::AlreadySigned);
        }

        let mut previous_epoch_id = msg.new_epoch_id - 1;
        let previous_epoch = match self.store.epoch_data(previous_epoch_id)? {
            Some(data) => data,
            None => {
                // Compatibility fallback: validate against the new epoch's
                // own data. This reduces the cross-epoch binding to a
                // self-signature; the emitted event is the audit hook.
                warn!(
                    previous_epoch_id,
                    new_epoch_id = msg.new_epoch_id,
                    "previous epoch not found - using current epoch for validation"
                );
                self.events.emit(Event::GroupKeyValidationFailed {
                    new_epoch_id: msg.new_epoch_id,
                    reason: format!("previous_epoch_missing_fallback:{previous_epoch_id}"),
                });
                previous_epoch_id = msg.new_epoch_id;
                new_epoch.clone()
            }
        };

        let participant = previous_epoch.participant(&msg.creator).ok_or_else(|| {
            ValidationError::UnknownParticipant {
                address: msg.creator.clone(),
                epoch_id: previous_epoch_id,
            }
        })?;
        let (range_start, range_end) = (participant.slot_start_index, participant.slot_end_index);

        for &slot in &msg.slot_indices {
            if slot < range_start || slot > range_end {
                error!(
                    slot_index = slot,
                    range_start,
                    range_end,
                    "submitted slot out of participant range"
                );
                return Err(ValidationError::SlotOutOfRange {
                    slot,
                    start: range_start,
                    end: range_end,
                });
            }
        }

        let state_key = validation_state_key(msg.new_epoch_id);
        let mut state = match ValidationStore::get(&self.store, &state_key)? {
            Some(bytes) => bcs::from_bytes(&bytes)
                .map_err(|e| StoreError::Codec(e.to_string()))
                .map_err(ValidationError::Store)?,
            None => {
                let message_hash = validation_message_hash(
                    &new_epoch.group_public_key,
                    previous_epoch_id,
                    &self.chain_id,
                )
                .map_err(ValidationError::MessageHash)?;
                info!(
                    new_epoch_id = msg.new_epoch_id,
                    previous_epoch_id, "created new validation state"
                );
                GroupKeyValidationState {
                    new_epoch_id: msg.new_epoch_id,
                    previous_epoch_id,
                    status: ValidationStatus::Collecting,
                    message_hash,
                    partial_signatures: vec![],
                    slots_covered: 0,
                    final_signature: vec![],
                }
            }
        };

        let (filtered_slots, filtered_signature) = filter_new_slots(msg, &state)?;
        if filtered_slots.is_empty() {
            return Err(ValidationError::NoNewSlots);
        }

        verify_partial_signature(
            &filtered_signature,
            &state.message_hash,
            &previous_epoch,
            &filtered_slots,
        )
        .map_err(|source| {
            error!(creator = %msg.creator, %source, "invalid BLS signature verification");
            ValidationError::InvalidPartialSignature {
                address: msg.creator.clone(),
                source,
            }
        })?;
        info!(
            creator = %msg.creator,
            slots_count = filtered_slots.len(),
            "valid signature received"
        );

        state.slots_covered += filtered_slots.len() as u32;
        state.partial_signatures.push(PartialSignature {
            participant_address: msg.creator.clone(),
            slot_indices: filtered_slots,
            signature: filtered_signature,
        });

        let required_slots = previous_epoch.total_slots / 2 + 1;
        info!(
            required_slots,
            slots_covered = state.slots_covered,
            "checking for signature readiness"
        );
        let mut validated = false;
        if state.slots_covered >= required_slots {
            info!("enough signatures collected, validating group key");
            self.certify_group_key(&mut state, new_epoch, &previous_epoch)?;
            validated = true;
        }

        let bytes = bcs::to_bytes(&state)
            .map_err(|e| StoreError::Codec(e.to_string()))
            .map_err(ValidationError::Store)?;
        ValidationStore::set(&mut self.store, &state_key, bytes)?;

        Ok(SubmitOutcome::Accepted {
            slots_covered: state.slots_covered,
            validated,
        })
    }

    /// Quorum step: aggregate all accepted partials and verify the result
    /// against the previous epoch's group public key with the stored
    /// message hash, `e(final, g2) == e(hash_to_g1(m), prev_group_key)`.
    fn certify_group_key(
        &mut self,
        state: &mut GroupKeyValidationState,
        mut new_epoch: EpochBlsData,
        previous_epoch: &EpochBlsData,
    ) -> Result<(), ValidationError> {
        let final_signature = aggregate_partial_signatures(&state.partial_signatures)
            .map_err(|e| {
                error!(%e, "failed to aggregate partial signatures");
                ValidationError::Aggregation(e)
            })?;
        let final_point = g1_from_bytes(&final_signature).map_err(ValidationError::Aggregation)?;

        let previous_group_key = g2_from_bytes(&previous_epoch.group_public_key).map_err(
            |source| ValidationError::InvalidGroupKey {
                epoch_id: previous_epoch.epoch_id,
                source,
            },
        )?;
        let message_point =
            hash_to_g1(&state.message_hash).map_err(ValidationError::MessageHash)?;

        if pairing(&final_point, &G2Affine::generator())
            != pairing(&message_point, &previous_group_key)
        {
            error!(
                previous_epoch_id = state.previous_epoch_id,
                hash32_hex = %hex::encode(state.message_hash),
                final_sig_uncompressed_128_hex = %hex::encode(g1_to_limbs(&final_point)),
                "final aggregated signature verification failed"
            );
            return Err(ValidationError::FinalSignatureInvalid);
        }

        state.final_signature = final_signature.to_vec();
        state.status = ValidationStatus::Validated;

        new_epoch.dkg_phase.is_valid_state_change(DkgPhase::Signed)?;
        new_epoch.validation_signature = state.final_signature.clone();
        new_epoch.dkg_phase = DkgPhase::Signed;
        let new_epoch_id = new_epoch.epoch_id;
        self.store.set_epoch_data(new_epoch)?;
        info!(
            new_epoch_id,
            slots_covered = state.slots_covered,
            "group key validation completed"
        );

        self.events.emit(Event::GroupKeyValidated {
            new_epoch_id,
            final_signature: state.final_signature.clone(),
        });

        Ok(())
    }
}

/// Drops slots already covered by accepted submissions (and repeats within
/// the message itself), keeping each surviving slot paired with its own
/// 48-byte signature chunk.
fn filter_new_slots(
    msg: &MsgSubmitGroupKeyValidationSignature,
    state: &GroupKeyValidationState,
) -> Result<(Vec<u32>, Vec<u8>), ValidationError> {
    if msg.partial_signature.len() % G1_POINT_BYTES != 0 {
        return Err(ValidationError::InvalidPartialSignature {
            address: msg.creator.clone(),
            source: CryptoError::SignatureLengthMismatch {
                len: msg.partial_signature.len(),
            },
        });
    }
    let chunks = msg.partial_signature.len() / G1_POINT_BYTES;
    if chunks != msg.slot_indices.len() {
        return Err(ValidationError::InvalidPartialSignature {
            address: msg.creator.clone(),
            source: CryptoError::SignatureCountMismatch {
                chunks,
                slots: msg.slot_indices.len(),
            },
        });
    }

    let mut seen: BTreeSet<u32> = state
        .partial_signatures
        .iter()
        .flat_map(|ps| ps.slot_indices.iter().copied())
        .collect();

    let mut filtered_slots = Vec::with_capacity(msg.slot_indices.len());
    let mut filtered_signature = Vec::with_capacity(msg.partial_signature.len());
    for (chunk, &slot) in msg
        .partial_signature
        .chunks_exact(G1_POINT_BYTES)
        .zip(&msg.slot_indices)
    {
        if !seen.insert(slot) {
            warn!(slot_index = slot, creator = %msg.creator, "ignoring duplicate slot submission");
            continue;
        }
        filtered_slots.push(slot);
        filtered_signature.extend_from_slice(chunk);
    }

    Ok((filtered_slots, filtered_signature))
}
