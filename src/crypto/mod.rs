// Copyright 2023-2025 StorSwift Inc.
// SPDX-License-Identifier: Apache-2.0

//! BLS12-381 primitives shared by the commitment, signature and message
//! modules. Point encodings follow the ZCash serialization convention:
//! 48-byte compressed G1, 96-byte compressed G2.

mod aggregate;
mod commitment;
mod message;
mod partial;

pub use aggregate::aggregate_partial_signatures;
pub use commitment::{evaluate_commitments, participant_public_key, slot_public_key};
pub use message::validation_message_hash;
pub use partial::verify_partial_signature;

use blst::{blst_fp, blst_fp_from_bendian, blst_map_to_g1, blst_p1, blst_p1_compress};
use blstrs::{G1Affine, G2Affine};

/// Compressed G1 point width: partial/final signatures, hashed messages.
pub const G1_POINT_BYTES: usize = 48;
/// Compressed G2 point width: dealer commitments, group public keys.
pub const G2_POINT_BYTES: usize = 96;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("invalid point encoding: expected {expected} bytes, got {got}")]
    InvalidPointLength { expected: usize, got: usize },
    #[error("bytes do not decode to a valid curve point")]
    InvalidPoint,
    #[error("signature payload length {len} is not a multiple of {G1_POINT_BYTES}")]
    SignatureLengthMismatch { len: usize },
    #[error("signature chunk count {chunks} does not match slot count {slots}")]
    SignatureCountMismatch { chunks: usize, slots: usize },
    #[error("signature for slot {slot} failed the pairing check")]
    PairingMismatch { slot: u32 },
    #[error("no slot indices present in partial signatures")]
    EmptySlotSet,
    #[error("Lagrange denominator for slot {slot} is non-invertible")]
    NonInvertibleDenominator { slot: u32 },
    #[error("missing Lagrange coefficient for slot {slot}")]
    MissingCoefficient { slot: u32 },
    #[error("invalid group public key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
}

/// Decodes a compressed G1 point, rejecting wrong lengths and points
/// outside the prime-order subgroup.
pub fn g1_from_bytes(bytes: &[u8]) -> Result<G1Affine, CryptoError> {
    let compressed: &[u8; G1_POINT_BYTES] =
        bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPointLength {
                expected: G1_POINT_BYTES,
                got: bytes.len(),
            })?;
    Option::from(G1Affine::from_compressed(compressed)).ok_or(CryptoError::InvalidPoint)
}

/// Decodes a compressed G2 point, rejecting wrong lengths and points
/// outside the prime-order subgroup.
pub fn g2_from_bytes(bytes: &[u8]) -> Result<G2Affine, CryptoError> {
    let compressed: &[u8; G2_POINT_BYTES] =
        bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPointLength {
                expected: G2_POINT_BYTES,
                got: bytes.len(),
            })?;
    Option::from(G2Affine::from_compressed(compressed)).ok_or(CryptoError::InvalidPoint)
}

/// Maps a 32-byte message hash to a G1 point with the EIP-2537
/// `MAP_FP_TO_G1` procedure: the hash is read as a big-endian base-field
/// element, passed through the simplified SWU map and the 11-isogeny, and
/// cofactor-cleared into the G1 subgroup.
///
/// External verifiers reproduce this mapping bit-for-bit; it is a wire
/// contract, not an implementation choice. The raw `blst` bindings are the
/// same code path Ethereum clients use for the precompile.
pub fn hash_to_g1(message_hash: &[u8; 32]) -> Result<G1Affine, CryptoError> {
    let mut element = [0u8; G1_POINT_BYTES];
    element[G1_POINT_BYTES - 32..].copy_from_slice(message_hash);

    let mut compressed = [0u8; G1_POINT_BYTES];
    // SAFETY: all pointers reference stack buffers of the widths the blst
    // API expects; a 32-byte hash is always below the field modulus.
    unsafe {
        let mut u = blst_fp::default();
        blst_fp_from_bendian(&mut u, element.as_ptr());
        let mut mapped = blst_p1::default();
        blst_map_to_g1(&mut mapped, &u, core::ptr::null());
        blst_p1_compress(compressed.as_mut_ptr(), &mapped);
    }

    Option::from(G1Affine::from_compressed(&compressed)).ok_or(CryptoError::InvalidPoint)
}

/// Re-encodes a G1 point as two 64-byte big-endian limbs `X ‖ Y` for
/// Ethereum-side verifiers (each 48-byte field element left-padded with
/// 16 zero bytes).
pub fn g1_to_limbs(point: &G1Affine) -> [u8; 128] {
    let uncompressed = point.to_uncompressed();
    let mut limbs = [0u8; 128];
    limbs[16..64].copy_from_slice(&uncompressed[..48]);
    limbs[80..128].copy_from_slice(&uncompressed[48..]);
    limbs
}

/// Re-encodes a G2 point as four 64-byte big-endian limbs in the order
/// `X.c0 ‖ X.c1 ‖ Y.c0 ‖ Y.c1`. The ZCash uncompressed form stores each
/// coordinate imaginary-part first, so the halves swap here.
pub fn g2_to_limbs(point: &G2Affine) -> [u8; 256] {
    let uncompressed = point.to_uncompressed();
    let mut limbs = [0u8; 256];
    limbs[16..64].copy_from_slice(&uncompressed[48..96]); // X.c0
    limbs[80..128].copy_from_slice(&uncompressed[..48]); // X.c1
    limbs[144..192].copy_from_slice(&uncompressed[144..192]); // Y.c0
    limbs[208..256].copy_from_slice(&uncompressed[96..144]); // Y.c1
    limbs
}
