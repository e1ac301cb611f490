//! Lagrange aggregation of per-slot partial signatures.
//!
//! Each slot holds a Shamir share of the group secret at `x = slot + 1`.
//! Scaling every slot signature by its Lagrange coefficient at 0 and
//! summing reconstructs, in the exponent, the signature the full group
//! secret would have produced. Any set of distinct slots works; quorum
//! size is protocol policy enforced by the caller, not here.

use super::{g1_from_bytes, CryptoError, G1_POINT_BYTES};
use crate::epoch::data::PartialSignature;
use blstrs::{G1Affine, G1Projective, Scalar};
use ff::Field;
use group::{Curve, Group};
use indexmap::{IndexMap, IndexSet};

/// Reconstructs the single 48-byte compressed aggregate signature from a
/// collection of partial signatures.
///
/// The result depends only on the set of `(slot, point)` pairs, not the
/// order they were submitted in.
pub fn aggregate_partial_signatures(
    partial_signatures: &[PartialSignature],
) -> Result<[u8; G1_POINT_BYTES], CryptoError> {
    // Flatten into per-slot points, re-validating the length invariant of
    // every entry. Distinct slots are kept in first-seen order.
    let mut slot_signatures: Vec<(u32, G1Affine)> = Vec::new();
    let mut slots: IndexSet<u32> = IndexSet::new();

    for partial in partial_signatures {
        if partial.signature.len() % G1_POINT_BYTES != 0 {
            return Err(CryptoError::SignatureLengthMismatch {
                len: partial.signature.len(),
            });
        }
        let chunks = partial.signature.len() / G1_POINT_BYTES;
        if chunks != partial.slot_indices.len() {
            return Err(CryptoError::SignatureCountMismatch {
                chunks,
                slots: partial.slot_indices.len(),
            });
        }
        for (chunk, &slot) in partial
            .signature
            .chunks_exact(G1_POINT_BYTES)
            .zip(&partial.slot_indices)
        {
            slot_signatures.push((slot, g1_from_bytes(chunk)?));
            slots.insert(slot);
        }
    }

    if slots.is_empty() {
        return Err(CryptoError::EmptySlotSet);
    }

    // Lagrange coefficients at evaluation point 0 over x_i = slot_i + 1:
    // lambda_i(0) = prod_{j!=i} (-x_j) / (x_i - x_j).
    let xs: Vec<Scalar> = slots
        .iter()
        .map(|&slot| Scalar::from(u64::from(slot) + 1))
        .collect();

    let mut lambda_by_slot: IndexMap<u32, Scalar> = IndexMap::with_capacity(slots.len());
    for (i, &slot) in slots.iter().enumerate() {
        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (j, x_j) in xs.iter().enumerate() {
            if j == i {
                continue;
            }
            numerator *= -x_j;
            denominator *= xs[i] - x_j;
        }
        // Distinct slots give distinct x's, so the denominator is a product
        // of nonzero factors.
        let inverse = Option::<Scalar>::from(denominator.invert())
            .ok_or(CryptoError::NonInvertibleDenominator { slot })?;
        lambda_by_slot.insert(slot, numerator * inverse);
    }

    let mut aggregated = G1Projective::identity();
    for (slot, signature) in &slot_signatures {
        let lambda = lambda_by_slot
            .get(slot)
            .ok_or(CryptoError::MissingCoefficient { slot: *slot })?;
        aggregated += G1Projective::from(*signature) * lambda;
    }

    Ok(aggregated.to_affine().to_compressed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_to_g1;
    use blstrs::{pairing, G2Affine, G2Projective};
    use group::prime::PrimeCurveAffine;

    const A0: u64 = 9;
    const A1: u64 = 4;
    const A2: u64 = 2;

    /// Share of the degree-2 test polynomial at x = slot + 1.
    fn share(slot: u32) -> Scalar {
        let x = Scalar::from(u64::from(slot) + 1);
        Scalar::from(A0) + Scalar::from(A1) * x + Scalar::from(A2) * x * x
    }

    fn partial(address: &str, message_hash: &[u8; 32], slots: &[u32]) -> PartialSignature {
        let message_point = G1Projective::from(hash_to_g1(message_hash).unwrap());
        let mut signature = Vec::new();
        for &slot in slots {
            let chunk = (message_point * share(slot)).to_affine();
            signature.extend_from_slice(&chunk.to_compressed());
        }
        PartialSignature {
            participant_address: address.to_string(),
            slot_indices: slots.to_vec(),
            signature,
        }
    }

    fn verifies_under_group_key(aggregate: &[u8; 48], message_hash: &[u8; 32]) -> bool {
        let signature = g1_from_bytes(aggregate).expect("aggregate must decode");
        let group_key = (G2Projective::generator() * Scalar::from(A0)).to_affine();
        let message_point = hash_to_g1(message_hash).unwrap();
        pairing(&signature, &G2Affine::generator()) == pairing(&message_point, &group_key)
    }

    #[test]
    fn quorum_reconstructs_group_signature() {
        // Threshold 3 (degree-2 polynomial): any 3 distinct slots suffice.
        let message_hash = [0x77u8; 32];
        let partials = vec![
            partial("alice", &message_hash, &[0, 1]),
            partial("bob", &message_hash, &[4]),
        ];

        let aggregate =
            aggregate_partial_signatures(&partials).expect("aggregation should succeed");
        assert!(verifies_under_group_key(&aggregate, &message_hash));
    }

    #[test]
    fn different_slot_subsets_reconstruct_the_same_signature() {
        let message_hash = [0x88u8; 32];
        let from_low = aggregate_partial_signatures(&[partial("a", &message_hash, &[0, 1, 2])])
            .expect("aggregation should succeed");
        let from_high = aggregate_partial_signatures(&[partial("b", &message_hash, &[2, 3, 4])])
            .expect("aggregation should succeed");

        assert_eq!(from_low, from_high);
        assert!(verifies_under_group_key(&from_low, &message_hash));
    }

    #[test]
    fn result_is_independent_of_submission_order() {
        let message_hash = [0x99u8; 32];
        let forward = vec![
            partial("alice", &message_hash, &[0, 1]),
            partial("bob", &message_hash, &[2, 3]),
        ];
        let reversed = vec![
            partial("bob", &message_hash, &[3, 2]),
            partial("alice", &message_hash, &[1, 0]),
        ];

        let a = aggregate_partial_signatures(&forward).expect("aggregation should succeed");
        let b = aggregate_partial_signatures(&reversed).expect("aggregation should succeed");
        assert_eq!(a, b);
    }

    #[test]
    fn single_slot_passes_through() {
        // With one slot the Lagrange coefficient is 1: the aggregate is the
        // chunk itself.
        let message_hash = [0xaau8; 32];
        let p = partial("solo", &message_hash, &[6]);
        let aggregate = aggregate_partial_signatures(&[p.clone()])
            .expect("aggregation should succeed");
        assert_eq!(aggregate.as_slice(), p.signature.as_slice());
    }

    #[test]
    fn rejects_empty_and_malformed_input() {
        assert!(matches!(
            aggregate_partial_signatures(&[]),
            Err(CryptoError::EmptySlotSet)
        ));

        let message_hash = [0xbbu8; 32];
        let mut truncated = partial("alice", &message_hash, &[0]);
        truncated.signature.truncate(40);
        assert!(matches!(
            aggregate_partial_signatures(&[truncated]),
            Err(CryptoError::SignatureLengthMismatch { len: 40 })
        ));

        let mut mismatched = partial("bob", &message_hash, &[0, 1]);
        mismatched.slot_indices.pop();
        assert!(matches!(
            aggregate_partial_signatures(&[mismatched]),
            Err(CryptoError::SignatureCountMismatch { chunks: 2, slots: 1 })
        ));
    }
}
