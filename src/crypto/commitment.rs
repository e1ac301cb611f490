//! Evaluation of dealer commitment polynomials in the exponent.
//!
//! A dealer publishes `commitments[i] = g2 * a_i` for each coefficient of
//! its secret polynomial. Evaluating `Σ commitments[i] * x^i` at
//! `x = slot_index + 1` yields the public key of the share held by that
//! slot, without revealing any coefficient. The evaluation point is shifted
//! by one so x is never zero.

use super::{g2_from_bytes, CryptoError, G2_POINT_BYTES};
use crate::epoch::data::EpochBlsData;
use blstrs::{G2Projective, Scalar};
use ff::Field;
use group::{Curve, Group};

/// Evaluates a dealer's commitment polynomial at `x = slot_index + 1` with
/// incrementally accumulated powers.
pub fn evaluate_commitments(
    commitments: &[Vec<u8>],
    slot_index: u32,
) -> Result<G2Projective, CryptoError> {
    let x = Scalar::from(u64::from(slot_index) + 1);
    let mut power = Scalar::ONE;
    let mut result = G2Projective::identity();

    for bytes in commitments {
        if bytes.len() != G2_POINT_BYTES {
            return Err(CryptoError::InvalidPointLength {
                expected: G2_POINT_BYTES,
                got: bytes.len(),
            });
        }
        let commitment = g2_from_bytes(bytes)?;
        result += G2Projective::from(commitment) * power;
        power *= x;
    }

    Ok(result)
}

/// Public key of a single slot: the commitment evaluations at that slot
/// summed over every dealer marked valid. Dealers with missing or empty
/// parts are skipped, mirroring the parallel mask/parts layout.
pub fn slot_public_key(
    epoch_data: &EpochBlsData,
    slot_index: u32,
) -> Result<G2Projective, CryptoError> {
    let mut key = G2Projective::identity();

    for (dealer_idx, valid) in epoch_data.valid_dealers.iter().enumerate() {
        if !valid || dealer_idx >= epoch_data.dealer_parts.len() {
            continue;
        }
        let part = &epoch_data.dealer_parts[dealer_idx];
        if part.commitments.is_empty() {
            continue;
        }
        key += evaluate_commitments(&part.commitments, slot_index)?;
    }

    Ok(key)
}

/// Compressed public key covering all of a participant's slots: the sum of
/// every slot public key over all valid dealers. Participants use this to
/// verify their own derived key after DKG completes.
pub fn participant_public_key(
    epoch_data: &EpochBlsData,
    slot_indices: &[u32],
) -> Result<[u8; G2_POINT_BYTES], CryptoError> {
    let mut aggregated = G2Projective::identity();
    for &slot_index in slot_indices {
        aggregated += slot_public_key(epoch_data, slot_index)?;
    }
    Ok(aggregated.to_affine().to_compressed())
}
