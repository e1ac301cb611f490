//! Per-slot verification of partial signatures.

use super::{g1_from_bytes, hash_to_g1, slot_public_key, CryptoError, G1_POINT_BYTES};
use crate::epoch::data::EpochBlsData;
use blstrs::{pairing, G2Affine};
use group::{prime::PrimeCurveAffine, Curve};

/// Verifies a payload of concatenated 48-byte G1 signature chunks, one per
/// submitted slot index (order-matched 1:1).
///
/// Each chunk is checked independently against the slot's public key as
/// derived from the valid dealers' commitments:
/// `e(chunk, g2) == e(hash_to_g1(message), slot_key)`. A single failing
/// pair fails the whole call; there is no partial credit.
pub fn verify_partial_signature(
    signature: &[u8],
    message_hash: &[u8; 32],
    epoch_data: &EpochBlsData,
    slot_indices: &[u32],
) -> Result<(), CryptoError> {
    if signature.len() % G1_POINT_BYTES != 0 {
        return Err(CryptoError::SignatureLengthMismatch {
            len: signature.len(),
        });
    }
    let chunks = signature.len() / G1_POINT_BYTES;
    if chunks != slot_indices.len() {
        return Err(CryptoError::SignatureCountMismatch {
            chunks,
            slots: slot_indices.len(),
        });
    }

    // The message maps to G1 once; every pairing reuses the same point.
    let message_point = hash_to_g1(message_hash)?;
    let g2_generator = G2Affine::generator();

    for (chunk, &slot_index) in signature.chunks_exact(G1_POINT_BYTES).zip(slot_indices) {
        let chunk_point = g1_from_bytes(chunk)?;
        let slot_key = slot_public_key(epoch_data, slot_index)?.to_affine();

        if pairing(&chunk_point, &g2_generator) != pairing(&message_point, &slot_key) {
            return Err(CryptoError::PairingMismatch { slot: slot_index });
        }
    }

    Ok(())
}
