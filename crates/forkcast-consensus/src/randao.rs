//! RANDAO-driven proposer selection.
//!
//! The proposer for slot `s` in epoch `e` is
//! `validators[H(mix(e) || s) mod |validators|]`, with the digest read as a
//! big-endian integer. Schedules are computed per epoch and cached by the
//! beacon state.

use crate::error::ConsensusError;
use forkcast_types::{Address, Hash, ValidatorSet};

/// Compute the slot -> proposer mapping for one epoch.
pub fn proposer_schedule(
    mix: &Hash,
    epoch: u64,
    validators: &ValidatorSet,
    slots_per_epoch: u64,
) -> Result<Vec<Address>, ConsensusError> {
    if validators.is_empty() {
        return Err(ConsensusError::EmptyValidatorSet);
    }

    let first_slot = epoch * slots_per_epoch;
    let mut schedule = Vec::with_capacity(slots_per_epoch as usize);
    for offset in 0..slots_per_epoch {
        let slot = first_slot + offset;
        let index = select_index(mix, slot, validators.len());
        let proposer = validators
            .at(index)
            .expect("index reduced modulo set size")
            .address;
        schedule.push(proposer);
    }
    Ok(schedule)
}

/// Selection index for a single slot.
fn select_index(mix: &Hash, slot: u64, validator_count: usize) -> usize {
    let digest = Hash::compute_multi(&[mix.as_bytes(), &slot.to_be_bytes()]);
    digest.to_index(validator_count)
}
