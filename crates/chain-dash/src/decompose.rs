//! Greedy change-making against a [`Ladder`].

use tracing::debug;

use crate::error::PlanError;
use crate::ladder::Ladder;

/// A value split into ladder denominations plus whatever did not fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    /// Denominations, largest first, one entry per output.
    pub denoms: Vec<u64>,
    /// Remainder smaller than the smallest denomination.
    pub dust: u64,
}

impl Decomposition {
    /// Sum of the emitted denominations.
    pub fn face_value(&self) -> u64 {
        self.denoms.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.denoms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.denoms.len()
    }

    /// `(denomination, count)` pairs, largest first.
    pub fn counts(&self) -> Vec<(u64, usize)> {
        let mut counts: Vec<(u64, usize)> = Vec::new();
        for &d in &self.denoms {
            match counts.last_mut() {
                Some((last, n)) if *last == d => *n += 1,
                _ => counts.push((d, 1)),
            }
        }
        counts
    }
}

/// Split `value` into as few ladder denominations as the greedy walk allows.
///
/// For every denomination, largest first, take as many as fit and carry the
/// remainder down. What is left after the smallest denomination is dust.
/// `face_value() + dust == value` always holds.
pub fn decompose(value: u64, ladder: &Ladder) -> Decomposition {
    let (denoms, dust) = ladder.denominations().iter().fold(
        (Vec::new(), value),
        |(mut denoms, remaining), &d| {
            let n = remaining / d;
            if n > 0 {
                denoms.extend(std::iter::repeat(d).take(n as usize));
            }
            (denoms, remaining % d)
        },
    );
    debug!(value, outputs = denoms.len(), dust, "decomposed");
    Decomposition { denoms, dust }
}

/// [`decompose`] plus an eager check of the conservation invariant.
pub fn decompose_checked(value: u64, ladder: &Ladder) -> Result<Decomposition, PlanError> {
    let decomposition = decompose(value, ladder);
    let actual = decomposition.face_value() + decomposition.dust;
    if actual != value {
        return Err(PlanError::DecompositionMismatch { value, actual });
    }
    Ok(decomposition)
}

/// Decompose a payment that must be expressible in whole denominations.
pub fn decompose_exact(amount: u64, ladder: &Ladder) -> Result<Decomposition, PlanError> {
    let decomposition = decompose_checked(amount, ladder)?;
    if decomposition.is_empty() {
        return Err(PlanError::TooSmallToDecompose {
            value: amount,
            minimum: ladder.smallest(),
        });
    }
    if decomposition.dust != 0 {
        return Err(PlanError::AmountNotDenominable {
            amount,
            remainder: decomposition.dust,
        });
    }
    Ok(decomposition)
}
