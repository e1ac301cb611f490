// Copyright 2023-2025 StorSwift Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stake-weighted allocation of threshold-signing slots.
//!
//! Each epoch the slot space `[0, total_slots)` is partitioned into
//! contiguous per-participant ranges proportional to stake weight. The
//! partition is the unit of quorum counting for group key validation, so
//! identical inputs must always produce byte-identical output: weights are
//! exact decimals and every proportional step runs in integer arithmetic.

use crate::epoch::data::ParticipantInfo;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;

#[derive(thiserror::Error, Debug)]
pub enum SlotError {
    #[error("no candidates to allocate slots for")]
    EmptyParticipants,
    #[error("total slot count must be positive")]
    ZeroTotalSlots,
    #[error("candidate {address} has a negative weight")]
    NegativeWeight { address: String },
    #[error("total weight of candidates is zero")]
    ZeroTotalWeight,
}

/// Candidate for slot allocation: an address with its stake weight and the
/// key material carried through into the epoch record.
#[derive(Debug, Clone)]
pub struct SlotCandidate {
    pub address: String,
    pub percentage_weight: BigDecimal,
    pub secp256k1_public_key: Vec<u8>,
}

impl SlotCandidate {
    pub fn new(
        address: impl Into<String>,
        percentage_weight: BigDecimal,
        secp256k1_public_key: Vec<u8>,
    ) -> Self {
        Self {
            address: address.into(),
            percentage_weight,
            secp256k1_public_key,
        }
    }
}

/// Partitions `[0, total_slots)` into contiguous ranges proportional to the
/// candidates' weights.
///
/// When candidates outnumber slots, exactly `total_slots` of them are kept,
/// ranked by weight descending with ties broken by address ascending; the
/// survivors keep their input order. Every surviving candidate with nonzero
/// weight is guaranteed at least one slot; rounding leftovers go to the
/// heaviest participant. Zero-weight candidates receive nothing.
pub fn assign_slots(
    candidates: &[SlotCandidate],
    total_slots: u32,
) -> Result<Vec<ParticipantInfo>, SlotError> {
    if candidates.is_empty() {
        return Err(SlotError::EmptyParticipants);
    }
    if total_slots == 0 {
        return Err(SlotError::ZeroTotalSlots);
    }
    for c in candidates {
        if c.percentage_weight.sign() == Sign::Minus {
            return Err(SlotError::NegativeWeight {
                address: c.address.clone(),
            });
        }
    }

    let weights = rescaled_weights(candidates);
    if weights.iter().sum::<BigInt>().is_zero() {
        return Err(SlotError::ZeroTotalWeight);
    }

    // Rank by weight descending, ties by address ascending. The ranking
    // decides who survives when candidates outnumber slots; survivors keep
    // their input order.
    let mut ranked: Vec<usize> = (0..candidates.len()).collect();
    ranked.sort_by(|&a, &b| {
        weights[b]
            .cmp(&weights[a])
            .then_with(|| candidates[a].address.cmp(&candidates[b].address))
    });
    ranked.truncate(total_slots as usize);

    let mut selected = vec![false; candidates.len()];
    for &i in &ranked {
        selected[i] = true;
    }

    let survivors: Vec<usize> = (0..candidates.len())
        .filter(|&i| selected[i] && !weights[i].is_zero())
        .collect();
    let survivor_weight: BigInt = survivors.iter().map(|&i| &weights[i]).sum();

    // One slot is reserved per survivor up front so that no nonzero-weight
    // participant is rounded down to nothing; the remainder is split by
    // floored proportion.
    let reserved = survivors.len() as u32;
    let remainder = total_slots - reserved;
    let mut counts: Vec<u32> = survivors
        .iter()
        .map(|&i| {
            let baseline = (&weights[i] * remainder) / &survivor_weight;
            1 + u32::try_from(baseline).expect("baseline is bounded by the slot remainder")
        })
        .collect();

    // Flooring can leave slots unassigned; they all go to the heaviest
    // survivor (ties by address) so the counts sum exactly to total_slots.
    let leftover = total_slots - counts.iter().sum::<u32>();
    if leftover > 0 {
        let heaviest = survivors
            .iter()
            .enumerate()
            .max_by(|(_, &a), (_, &b)| {
                weights[a]
                    .cmp(&weights[b])
                    .then_with(|| candidates[b].address.cmp(&candidates[a].address))
            })
            .map(|(pos, _)| pos)
            .expect("survivors are non-empty when total weight is nonzero");
        counts[heaviest] += leftover;
    }

    let mut next_slot = 0u32;
    let assigned = survivors
        .iter()
        .zip(&counts)
        .map(|(&i, &count)| {
            let c = &candidates[i];
            let start = next_slot;
            next_slot += count;
            ParticipantInfo {
                address: c.address.clone(),
                percentage_weight: c.percentage_weight.clone(),
                secp256k1_public_key: c.secp256k1_public_key.clone(),
                slot_start_index: start,
                slot_end_index: next_slot - 1,
            }
        })
        .collect();

    Ok(assigned)
}

/// Rescales all decimal weights to a common power-of-ten denominator so the
/// proportional math happens on exact integers.
fn rescaled_weights(candidates: &[SlotCandidate]) -> Vec<BigInt> {
    let parts: Vec<(BigInt, i64)> = candidates
        .iter()
        .map(|c| c.percentage_weight.normalized().as_bigint_and_exponent())
        .collect();
    let max_scale = parts.iter().map(|(_, scale)| *scale).max().unwrap_or(0);

    parts
        .into_iter()
        .map(|(digits, scale)| digits * BigInt::from(10u8).pow((max_scale - scale) as u32))
        .collect()
}
