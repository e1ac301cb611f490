//! Epoch-keyed records of the key-rotation protocol.
//!
//! `EpochBlsData` is written once when an epoch's DKG completes and is
//! mutated only to attach the validation signature and flip the phase to
//! `Signed`; it is never deleted, because the next epoch's validation needs
//! it as the "previous" record.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of an epoch's DKG ceremony.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DkgPhase {
    Undefined,
    Started,
    Dealing,
    Verifying,
    Completed,
    /// Terminal: the group key has been certified under the previous
    /// epoch's key.
    Signed,
    Failed,
}

#[derive(thiserror::Error, Debug)]
pub enum PhaseError {
    #[error("invalid transition attempt from {from} to {to}")]
    InvalidStateChange { from: DkgPhase, to: DkgPhase },
    #[error("impossible DKG phase received: {0}")]
    ImpossiblePhase(u32),
}

impl TryFrom<u32> for DkgPhase {
    type Error = PhaseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DkgPhase::Undefined),
            1 => Ok(DkgPhase::Started),
            2 => Ok(DkgPhase::Dealing),
            3 => Ok(DkgPhase::Verifying),
            4 => Ok(DkgPhase::Completed),
            5 => Ok(DkgPhase::Signed),
            6 => Ok(DkgPhase::Failed),
            _ => Err(PhaseError::ImpossiblePhase(value)),
        }
    }
}

impl DkgPhase {
    #[rustfmt::skip]
    pub fn is_valid_state_change(self, next: Self) -> Result<(), PhaseError> {
        #[allow(clippy::enum_glob_use)]
        use self::DkgPhase::*;

        let is_valid = match self {
            Undefined => matches!(next, Started),
            Started   => matches!(next, Dealing | Failed),
            Dealing   => matches!(next, Verifying | Failed),
            Verifying => matches!(next, Completed | Failed),
            Completed => matches!(next, Signed | Failed),
            Signed    => false,
            Failed    => false,
        };

        if !is_valid {
            return Err(PhaseError::InvalidStateChange {
                from: self,
                to: next,
            });
        }

        Ok(())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DkgPhase::Signed | DkgPhase::Failed)
    }
}

impl fmt::Display for DkgPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Participant of one epoch with its assigned slot range, inclusive on
/// both ends. Ranges of all participants partition `[0, total_slots)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub address: String,
    #[serde(with = "decimal_string")]
    pub percentage_weight: BigDecimal,
    pub secp256k1_public_key: Vec<u8>,
    pub slot_start_index: u32,
    pub slot_end_index: u32,
}

/// One dealer's exponentiated polynomial commitments: a 96-byte compressed
/// G2 point per coefficient, degree = threshold - 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealerPart {
    pub commitments: Vec<Vec<u8>>,
}

/// BLS record of one epoch, created when its DKG finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochBlsData {
    pub epoch_id: u64,
    pub participants: Vec<ParticipantInfo>,
    pub dealer_parts: Vec<DealerPart>,
    /// Parallel to `dealer_parts`: only dealers flagged here contribute to
    /// derived public keys.
    pub valid_dealers: Vec<bool>,
    /// 96-byte compressed G2 group public key.
    pub group_public_key: Vec<u8>,
    pub dkg_phase: DkgPhase,
    /// 48-byte compressed G1 signature certifying the group key under the
    /// previous epoch's key; empty until the phase is `Signed`.
    pub validation_signature: Vec<u8>,
    pub total_slots: u32,
}

impl EpochBlsData {
    pub fn participant(&self, address: &str) -> Option<&ParticipantInfo> {
        self.participants.iter().find(|p| p.address == address)
    }
}

/// A participant's signature over a set of its slots: concatenated 48-byte
/// G1 chunks, order-matched with `slot_indices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSignature {
    pub participant_address: String,
    pub slot_indices: Vec<u32>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Collecting,
    Validated,
}

/// Accumulated validation progress for one new epoch, persisted after
/// every accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupKeyValidationState {
    pub new_epoch_id: u64,
    pub previous_epoch_id: u64,
    pub status: ValidationStatus,
    pub message_hash: [u8; 32],
    pub partial_signatures: Vec<PartialSignature>,
    pub slots_covered: u32,
    /// 48-byte aggregated signature, set once validated.
    pub final_signature: Vec<u8>,
}

/// Submission of a partial signature for a new epoch's group key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgSubmitGroupKeyValidationSignature {
    pub creator: String,
    pub new_epoch_id: u64,
    pub slot_indices: Vec<u32>,
    pub partial_signature: Vec<u8>,
}

/// Deterministic store key for an epoch's validation state.
pub fn validation_state_key(new_epoch_id: u64) -> String {
    format!("group_validation_{new_epoch_id}")
}

/// Weights travel as their exact decimal string form, matching the wire
/// representation of the host chain's decimal type.
mod decimal_string {
    use bigdecimal::BigDecimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
