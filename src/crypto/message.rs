//! Canonical digest bound to an epoch transition.
//!
//! The digest is co-signed by the previous epoch's slot holders and checked
//! again by external bridge verifiers, so the preimage layout is a wire
//! contract: `abi.encodePacked(previous_epoch_id, chain_id_hash,
//! group_key_uncompressed)` hashed with Keccak-256.

use super::{g2_from_bytes, g2_to_limbs, CryptoError, G2_POINT_BYTES};
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// Computes the 32-byte validation message hash for a new epoch's group
/// public key.
///
/// Preimage, in order:
/// - previous epoch id, 8-byte big-endian
/// - `sha256(chain_id)`, 32 bytes
/// - the group key decompressed into 4 base-field elements ordered
///   `X.c0, X.c1, Y.c0, Y.c1`, each left-padded to 64 bytes
pub fn validation_message_hash(
    group_public_key: &[u8],
    previous_epoch_id: u64,
    chain_id: &str,
) -> Result<[u8; 32], CryptoError> {
    if group_public_key.len() != G2_POINT_BYTES {
        return Err(CryptoError::InvalidKeyLength {
            expected: G2_POINT_BYTES,
            got: group_public_key.len(),
        });
    }
    let group_key = g2_from_bytes(group_public_key)?;

    let chain_id_hash = Sha256::digest(chain_id.as_bytes());

    let mut encoded = Vec::with_capacity(8 + 32 + 256);
    encoded.extend_from_slice(&previous_epoch_id.to_be_bytes());
    encoded.extend_from_slice(&chain_id_hash);
    encoded.extend_from_slice(&g2_to_limbs(&group_key));

    Ok(Keccak256::digest(&encoded).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blstrs::{G2Projective, Scalar};
    use group::{Curve, Group};

    #[test]
    fn digest_matches_manual_preimage() {
        let group_key = (G2Projective::generator() * Scalar::from(11u64)).to_affine();
        let hash = validation_message_hash(&group_key.to_compressed(), 7, "testchain-1")
            .expect("hashing should succeed");

        // Assemble the preimage independently from the uncompressed point,
        // swapping each coordinate back into c0-first order.
        let uncompressed = group_key.to_uncompressed();
        let mut expected = Vec::new();
        expected.extend_from_slice(&7u64.to_be_bytes());
        expected.extend_from_slice(&Sha256::digest(b"testchain-1"));
        for range in [48..96, 0..48, 144..192, 96..144] {
            expected.extend_from_slice(&[0u8; 16]);
            expected.extend_from_slice(&uncompressed[range]);
        }
        let expected: [u8; 32] = Keccak256::digest(&expected).into();

        assert_eq!(hash, expected);
    }

    #[test]
    fn digest_binds_all_inputs() {
        let key = |s: u64| {
            (G2Projective::generator() * Scalar::from(s))
                .to_affine()
                .to_compressed()
        };

        let base = validation_message_hash(&key(3), 7, "testchain-1").unwrap();
        assert_ne!(
            base,
            validation_message_hash(&key(4), 7, "testchain-1").unwrap(),
            "different group keys must produce different digests"
        );
        assert_ne!(
            base,
            validation_message_hash(&key(3), 8, "testchain-1").unwrap(),
            "different previous epochs must produce different digests"
        );
        assert_ne!(
            base,
            validation_message_hash(&key(3), 7, "testchain-2").unwrap(),
            "different chains must produce different digests"
        );
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!(
            validation_message_hash(&[0u8; 95], 7, "testchain-1"),
            Err(CryptoError::InvalidKeyLength { expected: 96, got: 95 })
        ));
        assert!(matches!(
            validation_message_hash(&[0xff; 96], 7, "testchain-1"),
            Err(CryptoError::InvalidPoint)
        ));
    }
}
