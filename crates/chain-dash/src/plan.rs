//! First pass: decompose the request and pad it against a provisional fee.

use tracing::{debug, info};

use crate::decompose::{decompose, decompose_checked, decompose_exact, Decomposition};
use crate::draft::{OutputEntry, PayeeRequest, Stage, TransactionDraft};
use crate::error::PlanError;
use crate::fee::FeeAppraiser;
use crate::ladder::Ladder;
use crate::stamp::allocate_stamps;
use crate::amount::{check_money, MAX_MONEY};
use crate::utxo::{checked_total, select_coins, Coin};
use crate::STAMP;

/// Balances at or below this many satoshis are not worth denominating.
pub const DUST_THRESHOLD: u64 = 10_000;

/// Fee set aside before decomposing a balance: enough for a few
/// transactions, so a freshly denominated coin set is spendable.
pub const FEE_RESERVE: u64 = 1_200;

/// Knobs for the denomination pass.
#[derive(Debug, Clone)]
pub struct PlanParams {
    pub ladder: Ladder,
    pub stamp_size: u64,
    /// Balances at or below this are refused.
    pub dust_threshold: u64,
    /// Held back from the decomposed value of a balance and returned to the
    /// dust before padding.
    pub fee_reserve: u64,
    /// Stamps every payment or change output must be able to carry.
    pub min_stamps: u64,
}

impl Default for PlanParams {
    fn default() -> Self {
        Self {
            ladder: Ladder::dash(),
            stamp_size: STAMP,
            dust_threshold: DUST_THRESHOLD,
            fee_reserve: FEE_RESERVE,
            min_stamps: 1,
        }
    }
}

/// A requested payment to one payee, in satoshis of face value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub handle: String,
    pub satoshis: u64,
}

/// What the transaction should accomplish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Spend every given coin, denominated, to `handle`.
    Balance { handle: String },
    /// Pay these exact amounts, choosing coins from the pool; the rest is change.
    Payouts(Vec<Payout>),
}

/// Coins to draw from plus the target.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub coins: Vec<Coin>,
    pub target: Target,
}

/// Build the padded (but not yet address-bound) draft for `request`.
///
/// The returned draft is at [`Stage::Padded`]. Its implied fee equals
/// [`TransactionDraft::provisional_fee`] plus the sub-stamp dust, and the
/// provisional fee is never lower than the final appraisal for the draft's
/// shape, so [`reconcile_fee`](crate::reconcile::reconcile_fee) only ever
/// hands stamps back to outputs.
pub fn build_transfer_plan(
    request: TransferRequest,
    params: &PlanParams,
    appraiser: &dyn FeeAppraiser,
) -> Result<TransactionDraft, PlanError> {
    if params.stamp_size == 0 {
        return Err(PlanError::InvalidAmount("stamp size must be positive".into()));
    }
    match request.target {
        Target::Balance { handle } => plan_balance(request.coins, handle, params, appraiser),
        Target::Payouts(payouts) => plan_payouts(request.coins, payouts, params, appraiser),
    }
}

fn plan_balance(
    coins: Vec<Coin>,
    handle: String,
    params: &PlanParams,
    appraiser: &dyn FeeAppraiser,
) -> Result<TransactionDraft, PlanError> {
    if coins.is_empty() {
        return Err(PlanError::NoCoins);
    }
    let balance = checked_total(&coins)?;
    let minimum = (params.dust_threshold + 1).max(params.ladder.smallest() + params.fee_reserve);
    if balance <= params.dust_threshold || balance < params.fee_reserve {
        return Err(PlanError::TooSmallToDecompose {
            value: balance,
            minimum,
        });
    }

    let decomposition = decompose_checked(balance - params.fee_reserve, &params.ladder)?;
    if decomposition.is_empty() {
        return Err(PlanError::TooSmallToDecompose {
            value: balance,
            minimum,
        });
    }
    info!(
        balance,
        outputs = decomposition.len(),
        dust = decomposition.dust,
        "denominating balance"
    );

    let mut draft = TransactionDraft::new(coins, params.stamp_size);
    draft.payees = vec![PayeeRequest {
        handle,
        satoshis: decomposition.face_value(),
        denoms: decomposition.denoms.clone(),
    }];
    draft.outputs = decomposition.denoms.iter().map(|&d| OutputEntry::unbound(d)).collect();
    draft.advance(Stage::Decomposed)?;

    let dust = decomposition.dust + params.fee_reserve;
    let fee = appraiser
        .appraise(draft.inputs.len(), draft.outputs.len())
        .map_err(PlanError::Appraiser)?
        .max;
    if dust < fee {
        return Err(PlanError::InsufficientFee {
            available: dust,
            required: fee,
        });
    }
    let available = (dust - fee) / params.stamp_size;
    let outputs = draft.outputs.len();
    if available < (outputs as u64).saturating_mul(params.min_stamps) {
        return Err(PlanError::BelowMinimumStamps {
            outputs,
            min_stamps: params.min_stamps,
            available,
        });
    }

    pad(draft, dust - fee, fee)
}

fn plan_payouts(
    pool: Vec<Coin>,
    payouts: Vec<Payout>,
    params: &PlanParams,
    appraiser: &dyn FeeAppraiser,
) -> Result<TransactionDraft, PlanError> {
    if payouts.is_empty() {
        return Err(PlanError::InvalidAmount("no payouts requested".into()));
    }

    let mut payees = Vec::with_capacity(payouts.len());
    let mut payee_denoms: Vec<u64> = Vec::new();
    let mut face: u64 = 0;
    for payout in payouts {
        check_money("payment", payout.satoshis)?;
        face = face
            .checked_add(payout.satoshis)
            .filter(|&f| f <= MAX_MONEY)
            .ok_or_else(|| {
                PlanError::InvalidAmount(format!(
                    "payments add up to more than {MAX_MONEY} sat"
                ))
            })?;
        let decomposition = decompose_exact(payout.satoshis, &params.ladder)?;
        payee_denoms.extend_from_slice(&decomposition.denoms);
        payees.push(PayeeRequest {
            handle: payout.handle,
            satoshis: payout.satoshis,
            denoms: decomposition.denoms,
        });
    }
    let n_pay = payee_denoms.len();
    let per_output = params
        .min_stamps
        .checked_mul(params.stamp_size)
        .ok_or_else(|| PlanError::InvalidAmount("minimum stamps overflow".into()))?;

    let selection = select_coins(&pool, face, n_pay, per_output, appraiser)?;
    let n_in = selection.selected.len();
    // What is left once the payee outputs have their face value and minimum stamps.
    let spare = selection.total_sat - face - n_pay as u64 * per_output;

    let (change, provisional_fee) = size_change(spare, n_in, n_pay, per_output, params, appraiser)?;
    info!(
        face,
        inputs = n_in,
        payee_outputs = n_pay,
        change_outputs = change.len(),
        provisional_fee,
        "planned payment"
    );

    let mut draft = TransactionDraft::new(selection.selected, params.stamp_size);
    draft.payees = payees;
    draft.outputs = payee_denoms
        .iter()
        .chain(change.denoms.iter())
        .map(|&d| OutputEntry::unbound(d))
        .collect();
    draft.advance(Stage::Decomposed)?;

    let dust = selection.total_sat - face - change.face_value() - provisional_fee;
    pad(draft, dust, provisional_fee)
}

/// Decompose what remains after the payees into change outputs.
///
/// Each change output needs its own stamps and makes the transaction bigger,
/// so the fee and padding are reserved for a guessed number of change
/// outputs, starting at zero. If the decomposition needs more outputs than
/// were reserved, reserve that many and try again. The reservation only
/// grows, and the change it leaves only shrinks, so this stops.
///
/// Returns the change and the fee reserved for its shape.
fn size_change(
    spare: u64,
    inputs: usize,
    payee_outputs: usize,
    per_output: u64,
    params: &PlanParams,
    appraiser: &dyn FeeAppraiser,
) -> Result<(Decomposition, u64), PlanError> {
    let fee_for = |outputs: usize| -> Result<u64, PlanError> {
        appraiser
            .appraise(inputs, outputs)
            .map(|f| f.max)
            .map_err(PlanError::Appraiser)
    };
    let no_change = || Decomposition {
        denoms: Vec::new(),
        dust: 0,
    };

    let mut reserved = 0usize;
    loop {
        let fee = fee_for(payee_outputs + reserved)?;
        let held = fee + reserved as u64 * per_output;
        let Some(available) = spare.checked_sub(held) else {
            // Cannot afford the change outputs the last guess asked for;
            // everything left pads the payee outputs instead.
            return Ok((no_change(), fee_for(payee_outputs)?));
        };

        let change = decompose(available, &params.ladder);
        debug!(reserved, available, change_outputs = change.len(), "sizing change");
        if change.len() <= reserved {
            return Ok((change, fee));
        }
        reserved = change.len();
    }
}

/// Spread `dust` as stamps over every output and record the fee it was
/// computed against.
fn pad(mut draft: TransactionDraft, dust: u64, provisional_fee: u64) -> Result<TransactionDraft, PlanError> {
    let allocation = allocate_stamps(dust, draft.stamp_size(), draft.outputs.len())?;
    for (entry, stamps) in draft.outputs.iter_mut().zip(&allocation.per_output) {
        entry.stamps = *stamps;
    }
    draft.provisional_fee = provisional_fee;
    draft.extra_dust = allocation.extra_dust;

    let expected = provisional_fee + allocation.extra_dust;
    let actual = draft.implied_fee();
    if actual != i128::from(expected) {
        return Err(PlanError::FeeMismatch {
            declared: expected,
            actual,
        });
    }

    draft.advance(Stage::Padded)?;
    Ok(draft)
}
