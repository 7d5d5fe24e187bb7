//! Second pass: settle the padded draft against the final fee appraisal.

use tracing::{debug, info};

use crate::draft::{Stage, TransactionDraft};
use crate::error::PlanError;
use crate::fee::FeeEstimate;

/// Hand every whole stamp paid above `estimate.max` back to the outputs.
///
/// Stamps go one at a time to successive outputs, wrapping around to the
/// first. The sub-stamp remainder stays in the fee. Accepts an address-bound
/// draft, or an already reconciled one, in which case nothing moves.
pub fn reconcile_fee(
    mut draft: TransactionDraft,
    estimate: &FeeEstimate,
) -> Result<TransactionDraft, PlanError> {
    let already = match draft.stage() {
        Stage::AddressBound => false,
        Stage::FeeReconciled => true,
        from => {
            return Err(PlanError::StageViolation {
                from,
                to: Stage::FeeReconciled,
            })
        }
    };

    let implied = draft.implied_fee();
    let fee = u64::try_from(implied).map_err(|_| PlanError::FeeMismatch {
        declared: estimate.max,
        actual: implied,
    })?;
    if fee < estimate.max {
        return Err(PlanError::FeeShortfall {
            fee,
            required: estimate.max,
        });
    }

    let stamp_size = draft.stamp_size();
    let dust_stamps = (fee - estimate.max) / stamp_size;
    let declared = fee - dust_stamps * stamp_size;

    if dust_stamps > 0 && draft.outputs.is_empty() {
        return Err(PlanError::InsufficientPadding {
            required: 1,
            available: dust_stamps,
        });
    }
    let n = draft.outputs.len() as u64;
    for (i, entry) in draft.outputs.iter_mut().enumerate() {
        let i = i as u64;
        // Output i receives every stamp whose round-robin slot lands on it.
        if i < dust_stamps {
            entry.stamps += (dust_stamps - i).div_ceil(n);
        }
    }
    debug!(fee, max = estimate.max, dust_stamps, declared, "reconciled fee");

    let actual = draft.implied_fee();
    if actual != i128::from(declared) {
        return Err(PlanError::FeeMismatch { declared, actual });
    }

    draft.estimate = Some(*estimate);
    draft.declared_fee = Some(declared);
    if !already {
        draft.advance(Stage::FeeReconciled)?;
        info!(fee = declared, returned_stamps = dust_stamps, "fee reconciled");
    }
    Ok(draft)
}
