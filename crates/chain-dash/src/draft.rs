//! The in-flight transaction and the stages it moves through.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlanError;
use crate::fee::FeeEstimate;
use crate::utxo::{total_satoshis, Coin};

/// Lifecycle of a [`TransactionDraft`]. Stages are never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Requested,
    Decomposed,
    Padded,
    AddressBound,
    FeeReconciled,
    Finalized,
}

impl Stage {
    /// The only stage this one may move to.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Requested => Some(Stage::Decomposed),
            Stage::Decomposed => Some(Stage::Padded),
            Stage::Padded => Some(Stage::AddressBound),
            Stage::AddressBound => Some(Stage::FeeReconciled),
            Stage::FeeReconciled => Some(Stage::Finalized),
            Stage::Finalized => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Requested => "requested",
            Stage::Decomposed => "decomposed",
            Stage::Padded => "padded",
            Stage::AddressBound => "address-bound",
            Stage::FeeReconciled => "fee-reconciled",
            Stage::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// One planned output: a face value, its padding, and (once bound) where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub denomination: u64,
    pub stamps: u64,
    pub address: Option<String>,
    /// Account or payee handle the address was allocated from.
    pub handle: Option<String>,
    pub change: bool,
}

impl OutputEntry {
    pub fn unbound(denomination: u64) -> Self {
        Self {
            denomination,
            stamps: 0,
            address: None,
            handle: None,
            change: false,
        }
    }

    /// Face value plus stamps.
    pub fn satoshis(&self, stamp_size: u64) -> u64 {
        self.denomination + self.stamps * stamp_size
    }
}

/// What a payee asked for and how it was split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeRequest {
    pub handle: String,
    pub satoshis: u64,
    pub denoms: Vec<u64>,
}

/// An unsigned transaction being shaped: inputs, planned outputs, payees.
///
/// Built by [`build_transfer_plan`](crate::plan::build_transfer_plan) and
/// moved through the stages by value; a failed stage drops the draft.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    stage: Stage,
    stamp_size: u64,
    pub(crate) inputs: Vec<Coin>,
    pub(crate) outputs: Vec<OutputEntry>,
    pub(crate) payees: Vec<PayeeRequest>,
    /// Fee the padding was computed against.
    pub(crate) provisional_fee: u64,
    /// Sub-stamp remainder left in the fee by padding.
    pub(crate) extra_dust: u64,
    pub(crate) estimate: Option<FeeEstimate>,
    pub(crate) declared_fee: Option<u64>,
}

impl TransactionDraft {
    pub(crate) fn new(inputs: Vec<Coin>, stamp_size: u64) -> Self {
        Self {
            stage: Stage::Requested,
            stamp_size,
            inputs,
            outputs: Vec::new(),
            payees: Vec::new(),
            provisional_fee: 0,
            extra_dust: 0,
            estimate: None,
            declared_fee: None,
        }
    }

    /// Move to `to`, which must be the stage right after the current one.
    pub(crate) fn advance(&mut self, to: Stage) -> Result<(), PlanError> {
        if self.stage.next() != Some(to) {
            return Err(PlanError::StageViolation {
                from: self.stage,
                to,
            });
        }
        debug!(from = %self.stage, %to, "draft stage");
        self.stage = to;
        Ok(())
    }

    /// Fail unless the draft is at `expected`.
    pub(crate) fn expect_stage(&self, expected: Stage, to: Stage) -> Result<(), PlanError> {
        if self.stage != expected {
            return Err(PlanError::StageViolation {
                from: self.stage,
                to,
            });
        }
        Ok(())
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn stamp_size(&self) -> u64 {
        self.stamp_size
    }

    pub fn inputs(&self) -> &[Coin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputEntry] {
        &self.outputs
    }

    pub fn payees(&self) -> &[PayeeRequest] {
        &self.payees
    }

    pub fn provisional_fee(&self) -> u64 {
        self.provisional_fee
    }

    pub fn extra_dust(&self) -> u64 {
        self.extra_dust
    }

    pub fn fee_estimate(&self) -> Option<FeeEstimate> {
        self.estimate
    }

    pub fn declared_fee(&self) -> Option<u64> {
        self.declared_fee
    }

    pub fn total_in(&self) -> u64 {
        total_satoshis(&self.inputs)
    }

    pub fn total_out(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis(self.stamp_size)).sum()
    }

    pub fn total_face_out(&self) -> u64 {
        self.outputs.iter().map(|o| o.denomination).sum()
    }

    pub fn total_stamps_out(&self) -> u64 {
        self.outputs.iter().map(|o| o.stamps).sum()
    }

    /// `inputs - outputs`, signed so an overdrawn draft is visible.
    pub fn implied_fee(&self) -> i128 {
        i128::from(self.total_in()) - i128::from(self.total_out())
    }

    /// Face values of outputs not yet bound to an address.
    pub fn unbound_denoms(&self) -> Vec<u64> {
        self.outputs
            .iter()
            .filter(|o| o.address.is_none())
            .map(|o| o.denomination)
            .collect()
    }
}

/// An output as handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalOutput {
    pub address: String,
    pub satoshis: u64,
    pub face_value: u64,
    pub stamps: u64,
    pub change: bool,
}

/// A fully accounted transaction: `sum(inputs) - sum(outputs) == fee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedTransaction {
    pub inputs: Vec<Coin>,
    pub outputs: Vec<FinalOutput>,
    pub fee: u64,
    pub fee_estimate: FeeEstimate,
    pub stamp_size: u64,
}

impl FinalizedTransaction {
    pub fn total_in(&self) -> u64 {
        total_satoshis(&self.inputs)
    }

    pub fn total_out(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis).sum()
    }

    /// Fee paid above the appraised maximum (always less than one stamp).
    pub fn fee_dust(&self) -> u64 {
        self.fee - self.fee_estimate.max
    }
}

/// Seal a reconciled draft after re-checking the books.
pub fn finalize(mut draft: TransactionDraft) -> Result<FinalizedTransaction, PlanError> {
    draft.expect_stage(Stage::FeeReconciled, Stage::Finalized)?;

    let declared = draft.declared_fee.ok_or(PlanError::FeeMismatch {
        declared: 0,
        actual: draft.implied_fee(),
    })?;
    let actual = draft.implied_fee();
    if actual != i128::from(declared) {
        return Err(PlanError::FeeMismatch { declared, actual });
    }
    let estimate = draft.estimate.ok_or(PlanError::StageViolation {
        from: draft.stage,
        to: Stage::Finalized,
    })?;

    let stamp_size = draft.stamp_size;
    let mut outputs = Vec::with_capacity(draft.outputs.len());
    for entry in &draft.outputs {
        let address = entry.address.clone().ok_or_else(|| PlanError::UnmatchedDenomination {
            handle: entry.handle.clone().unwrap_or_default(),
            denom: entry.denomination,
        })?;
        outputs.push(FinalOutput {
            address,
            satoshis: entry.satoshis(stamp_size),
            face_value: entry.denomination,
            stamps: entry.stamps,
            change: entry.change,
        });
    }

    draft.advance(Stage::Finalized)?;

    Ok(FinalizedTransaction {
        inputs: draft.inputs,
        outputs,
        fee: declared,
        fee_estimate: estimate,
        stamp_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(satoshis: u64) -> Coin {
        Coin {
            address: "Xaddr".into(),
            tx_id: "ff".repeat(32),
            output_index: 0,
            satoshis,
        }
    }

    #[test]
    fn stages_advance_in_order() {
        let mut draft = TransactionDraft::new(vec![coin(1)], 200);
        for to in [
            Stage::Decomposed,
            Stage::Padded,
            Stage::AddressBound,
            Stage::FeeReconciled,
            Stage::Finalized,
        ] {
            draft.advance(to).unwrap();
            assert_eq!(draft.stage(), to);
        }
        assert_eq!(Stage::Finalized.next(), None);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut draft = TransactionDraft::new(vec![coin(1)], 200);
        let err = draft.advance(Stage::Padded).unwrap_err();
        assert!(matches!(
            err,
            PlanError::StageViolation {
                from: Stage::Requested,
                to: Stage::Padded
            }
        ));
        assert_eq!(err.to_string(), "draft cannot move from requested to padded");
        assert!(err.is_internal());
    }

    #[test]
    fn totals_include_stamps() {
        let mut draft = TransactionDraft::new(vec![coin(150_012_345)], 200);
        draft.outputs = vec![
            OutputEntry {
                stamps: 30,
                ..OutputEntry::unbound(100_000_000)
            },
            OutputEntry {
                stamps: 30,
                ..OutputEntry::unbound(50_000_000)
            },
        ];
        assert_eq!(draft.total_face_out(), 150_000_000);
        assert_eq!(draft.total_stamps_out(), 60);
        assert_eq!(draft.total_out(), 150_012_000);
        assert_eq!(draft.implied_fee(), 345);
    }

    #[test]
    fn implied_fee_can_go_negative() {
        let mut draft = TransactionDraft::new(vec![coin(100)], 200);
        draft.outputs = vec![OutputEntry::unbound(1_000)];
        assert_eq!(draft.implied_fee(), -900);
    }

    #[test]
    fn finalize_requires_reconciled_stage() {
        let draft = TransactionDraft::new(vec![coin(1)], 200);
        assert!(matches!(
            finalize(draft),
            Err(PlanError::StageViolation { .. })
        ));
    }

    #[test]
    fn finalize_detects_tampered_books() {
        let mut draft = TransactionDraft::new(vec![coin(10_000)], 200);
        draft.outputs = vec![OutputEntry {
            address: Some("Xout".into()),
            stamps: 1,
            ..OutputEntry::unbound(9_000)
        }];
        for to in [
            Stage::Decomposed,
            Stage::Padded,
            Stage::AddressBound,
            Stage::FeeReconciled,
        ] {
            draft.advance(to).unwrap();
        }
        draft.estimate = Some(FeeEstimate { min: 1, mid: 2, max: 3 });
        draft.declared_fee = Some(801);

        let err = finalize(draft).unwrap_err();
        assert!(matches!(
            err,
            PlanError::FeeMismatch {
                declared: 801,
                actual: 800
            }
        ));
    }
}
