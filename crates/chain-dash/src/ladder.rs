use crate::amount::SATOSHIS_PER_COIN;
use crate::error::PlanError;

/// Default Dash ladder in thousandths of a coin, largest first.
/// 1000, 500, 200, ... 0.005, 0.002, 0.001 coins.
const DASH_LADDER_MILLI: [u64; 19] = [
    1_000_000, 500_000, 200_000, 100_000, 50_000, 20_000, 10_000, 5_000, 2_000, 1_000, 500, 200,
    100, 50, 20, 10, 5, 2, 1,
];

/// An ordered set of canonical output sizes, strictly descending, in satoshis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ladder {
    denoms: Vec<u64>,
}

impl Ladder {
    /// The standard 1-2-5 ladder from 1000 coins down to 0.001 coins.
    pub fn dash() -> Self {
        let per_milli = SATOSHIS_PER_COIN / 1000;
        Self {
            denoms: DASH_LADDER_MILLI.iter().map(|m| m * per_milli).collect(),
        }
    }

    /// Build a custom ladder. Rejects empty, zero-valued and non-descending tables.
    pub fn new(denoms: Vec<u64>) -> Result<Self, PlanError> {
        if denoms.is_empty() {
            return Err(PlanError::InvalidLadder("ladder is empty".into()));
        }
        if denoms.contains(&0) {
            return Err(PlanError::InvalidLadder("denominations must be positive".into()));
        }
        if let Some(pair) = denoms.windows(2).find(|w| w[0] <= w[1]) {
            return Err(PlanError::InvalidLadder(format!(
                "{} is not larger than {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { denoms })
    }

    pub fn denominations(&self) -> &[u64] {
        &self.denoms
    }

    /// Smallest denomination; anything below it is dust.
    pub fn smallest(&self) -> u64 {
        // Non-empty by construction.
        self.denoms[self.denoms.len() - 1]
    }

    pub fn contains(&self, satoshis: u64) -> bool {
        self.denoms.binary_search_by(|d| satoshis.cmp(d)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.denoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.denoms.is_empty()
    }
}

impl Default for Ladder {
    fn default() -> Self {
        Self::dash()
    }
}
