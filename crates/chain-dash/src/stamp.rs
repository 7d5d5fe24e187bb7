//! Even distribution of dust, in whole stamps, across a set of outputs.

use tracing::debug;

use crate::error::PlanError;

/// Result of spreading dust over `per_output.len()` outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampAllocation {
    /// Stamp count for each output, in output order.
    pub per_output: Vec<u64>,
    /// Total whole stamps that fit in the dust.
    pub num_stamps: u64,
    /// Stamps every output receives.
    pub stamps_each: u64,
    /// Outputs (counted from the end) that receive one more.
    pub extra_stamps: u64,
    /// Sub-stamp remainder that stays in the fee.
    pub extra_dust: u64,
}

/// Spread `dust` over `outputs` outputs in quanta of `stamp_size`.
///
/// Every output gets `num_stamps / outputs` stamps; the remainder goes one
/// apiece to the trailing outputs, last output first. Fails when there are
/// fewer stamps than outputs, since every output must carry at least one.
pub fn allocate_stamps(
    dust: u64,
    stamp_size: u64,
    outputs: usize,
) -> Result<StampAllocation, PlanError> {
    debug_assert!(stamp_size > 0);
    let num_stamps = dust / stamp_size;
    let extra_dust = dust % stamp_size;

    let n = outputs as u64;
    if outputs == 0 || num_stamps < n {
        return Err(PlanError::InsufficientPadding {
            required: outputs.max(1),
            available: num_stamps,
        });
    }

    let stamps_each = num_stamps / n;
    let extra_stamps = num_stamps % n;

    let mut per_output = vec![stamps_each; outputs];
    for count in per_output.iter_mut().rev().take(extra_stamps as usize) {
        *count += 1;
    }

    debug!(
        dust,
        num_stamps, stamps_each, extra_stamps, extra_dust, "allocated stamps"
    );

    Ok(StampAllocation {
        per_output,
        num_stamps,
        stamps_each,
        extra_stamps,
        extra_dust,
    })
}
