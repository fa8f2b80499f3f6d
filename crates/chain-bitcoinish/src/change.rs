use tracing::debug;

use crate::error::BitcoinishError;
use crate::types::{TxOutputSatoshis, WeightedChangeOutput};

/// Largest number of change slots; keeps `2^i` weights within `u64`.
pub const MAX_CHANGE_SLOTS: usize = 64;

/// `count` change slots paying to `address`, slot `i` weighted `2^i`.
pub fn weighted_change_outputs(address: &str, count: usize) -> Vec<WeightedChangeOutput> {
    (0..count.min(MAX_CHANGE_SLOTS))
        .map(|i| WeightedChangeOutput { address: address.to_string(), weight: 1u64 << i })
        .collect()
}

/// Change outputs that survived allocation plus whatever could not be
/// placed in one. The caller adds `unallocated_sat` to the fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeAllocation {
    pub outputs: Vec<TxOutputSatoshis>,
    pub unallocated_sat: u64,
}

impl ChangeAllocation {
    pub fn allocated_sat(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis).sum()
    }
}

/// Splits change proportionally to slot weights.
#[derive(Debug, Clone, Copy)]
pub struct ChangeAllocator {
    dust_threshold_sat: u64,
    min_change_sat: u64,
}

impl ChangeAllocator {
    pub fn new(dust_threshold_sat: u64, min_change_sat: u64) -> Self {
        Self { dust_threshold_sat, min_change_sat }
    }

    fn keeps(&self, share: u64) -> bool {
        share > self.dust_threshold_sat && share >= self.min_change_sat
    }

    /// Each slot receives `floor(total * weight / total_weight)`. Shares at or
    /// below dust, or below the minimum change, become loose change. Loose
    /// change is spread evenly over the surviving outputs when there is at
    /// least one satoshi per output; with no survivors it becomes a single
    /// output on the first slot's address if it is above dust.
    pub fn allocate(
        &self,
        total_change_sat: u64,
        slots: &[WeightedChangeOutput],
    ) -> Result<ChangeAllocation, BitcoinishError> {
        let total_weight: u128 = slots.iter().map(|slot| u128::from(slot.weight)).sum();
        if total_weight == 0 {
            return Ok(ChangeAllocation { outputs: Vec::new(), unallocated_sat: total_change_sat });
        }

        let mut loose_sat = total_change_sat;
        let mut outputs = Vec::with_capacity(slots.len());
        for slot in slots {
            let share = u128::from(total_change_sat) * u128::from(slot.weight) / total_weight;
            let share = u64::try_from(share).map_err(|_| {
                BitcoinishError::Invariant(format!("change share {share} exceeds u64"))
            })?;
            if !self.keeps(share) {
                debug!(share, weight = slot.weight, "change slot dropped into loose change");
                continue;
            }
            loose_sat -= share;
            outputs.push(TxOutputSatoshis { address: slot.address.clone(), satoshis: share });
        }

        if !outputs.is_empty() {
            let count = outputs.len() as u64;
            if loose_sat >= count {
                let per_output = loose_sat / count;
                for output in &mut outputs {
                    output.satoshis += per_output;
                }
                loose_sat -= per_output * count;
            }
        } else if loose_sat > self.dust_threshold_sat {
            outputs.push(TxOutputSatoshis {
                address: slots[0].address.clone(),
                satoshis: loose_sat,
            });
            loose_sat = 0;
        }

        debug!(outputs = outputs.len(), unallocated_sat = loose_sat, "change allocated");
        Ok(ChangeAllocation { outputs, unallocated_sat: loose_sat })
    }
}
