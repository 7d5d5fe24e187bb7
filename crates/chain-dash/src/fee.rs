use serde::{Deserialize, Serialize};

use crate::error::BoxError;

/// Version (4) + locktime (4). The input/output counts are varints on top.
const TX_HEADER_BYTES: u64 = 8;

/// Smallest P2PKH input: outpoint (36) + script length (1) + push (1)
/// + shortest DER signature with sighash byte (71) + push (1)
/// + compressed key (33) + sequence (4).
const MIN_INPUT_BYTES: u64 = 147;

/// A DER signature may be up to two bytes longer than the shortest one.
const MAX_INPUT_PAD_BYTES: u64 = 2;

/// P2PKH output: value (8) + script length (1) + script (25).
const OUTPUT_BYTES: u64 = 34;

/// Fee rate in satoshis per byte.
const FEE_RATE_SAT_BYTE: u64 = 1;

/// Fee bounds for a transaction shape, in satoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub min: u64,
    pub mid: u64,
    pub max: u64,
}

/// Prices a transaction from its shape alone.
///
/// Implementations must be pure functions of the counts: the engine calls
/// them more than once for the same draft and relies on getting the same
/// answer.
pub trait FeeAppraiser {
    fn appraise(&self, inputs: usize, outputs: usize) -> Result<FeeEstimate, BoxError>;
}

impl<F> FeeAppraiser for F
where
    F: Fn(usize, usize) -> Result<FeeEstimate, BoxError>,
{
    fn appraise(&self, inputs: usize, outputs: usize) -> Result<FeeEstimate, BoxError> {
        self(inputs, outputs)
    }
}

/// Size-based appraisal for P2PKH transactions at 1 sat/byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashFeeAppraiser;

impl DashFeeAppraiser {
    /// Same as [`FeeAppraiser::appraise`] without the `Result` wrapper.
    pub fn estimate(inputs: usize, outputs: usize) -> FeeEstimate {
        let (n_in, n_out) = (inputs as u64, outputs as u64);
        let min_bytes = TX_HEADER_BYTES
            + varint_len(n_in)
            + varint_len(n_out)
            + n_in * MIN_INPUT_BYTES
            + n_out * OUTPUT_BYTES;
        let max_bytes = min_bytes + n_in * MAX_INPUT_PAD_BYTES;
        let mid_bytes = min_bytes + (max_bytes - min_bytes).div_ceil(2);

        FeeEstimate {
            min: min_bytes * FEE_RATE_SAT_BYTE,
            mid: mid_bytes * FEE_RATE_SAT_BYTE,
            max: max_bytes * FEE_RATE_SAT_BYTE,
        }
    }
}

impl FeeAppraiser for DashFeeAppraiser {
    fn appraise(&self, inputs: usize, outputs: usize) -> Result<FeeEstimate, BoxError> {
        Ok(Self::estimate(inputs, outputs))
    }
}

/// Encoded length of a Bitcoin-style compact size integer.
fn varint_len(n: u64) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}
