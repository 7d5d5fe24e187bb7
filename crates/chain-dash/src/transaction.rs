//! The full planning chain and the hand-off to a signer.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assemble::{assemble_outputs, AddressAllocator, ChangePolicy};
use crate::draft::{finalize, FinalOutput, FinalizedTransaction};
use crate::error::{BoxError, PlanError};
use crate::fee::FeeAppraiser;
use crate::plan::{build_transfer_plan, PlanParams, TransferRequest};
use crate::reconcile::reconcile_fee;
use crate::utxo::Coin;

/// A signed transaction as returned by a [`Signer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    /// Raw transaction, hex encoded.
    pub transaction: String,
    pub inputs: Vec<Coin>,
    pub outputs: Vec<FinalOutput>,
}

/// Signs a finalized transaction. The engine never looks at key material.
pub trait Signer {
    fn sign(&self, tx: &FinalizedTransaction) -> Result<SignedTransaction, BoxError>;
}

/// Run a request through every stage up to [`FinalizedTransaction`].
///
/// The fee is appraised twice: once while padding, for the largest shape
/// the plan might take, and again here for the shape it actually took.
pub fn prepare_transfer(
    request: TransferRequest,
    params: &PlanParams,
    appraiser: &dyn FeeAppraiser,
    allocator: &mut dyn AddressAllocator,
    change_policy: &ChangePolicy,
) -> Result<FinalizedTransaction, PlanError> {
    let draft = build_transfer_plan(request, params, appraiser)?;
    let draft = assemble_outputs(draft, allocator, change_policy)?;

    let estimate = appraiser
        .appraise(draft.inputs().len(), draft.outputs().len())
        .map_err(PlanError::Appraiser)?;
    let draft = reconcile_fee(draft, &estimate)?;
    let finalized = finalize(draft)?;

    info!(
        inputs = finalized.inputs.len(),
        outputs = finalized.outputs.len(),
        fee = finalized.fee,
        "transaction finalized"
    );
    Ok(finalized)
}

/// Pass a finalized transaction to `signer`, re-checking the books first.
pub fn hand_off(
    finalized: &FinalizedTransaction,
    signer: &dyn Signer,
) -> Result<SignedTransaction, PlanError> {
    let actual = i128::from(finalized.total_in()) - i128::from(finalized.total_out());
    if actual != i128::from(finalized.fee) {
        return Err(PlanError::FeeMismatch {
            declared: finalized.fee,
            actual,
        });
    }

    let signed = signer.sign(finalized).map_err(PlanError::Signer)?;
    if hex::decode(&signed.transaction).is_err() {
        return Err(PlanError::Signer(
            "signer returned a transaction that is not hex".into(),
        ));
    }
    info!(bytes = signed.transaction.len() / 2, "transaction signed");
    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::tests::FakeAllocator;
    use crate::fee::{DashFeeAppraiser, FeeEstimate};
    use crate::plan::{Payout, Target};
    use pretty_assertions::assert_eq;

    const COIN: u64 = 100_000_000;

    fn coin(tag: &str, satoshis: u64) -> Coin {
        Coin {
            address: format!("X{tag}"),
            tx_id: tag.repeat(32),
            output_index: 0,
            satoshis,
        }
    }

    struct EchoSigner;

    impl Signer for EchoSigner {
        fn sign(&self, tx: &FinalizedTransaction) -> Result<SignedTransaction, BoxError> {
            Ok(SignedTransaction {
                transaction: "0200".into(),
                inputs: tx.inputs.clone(),
                outputs: tx.outputs.clone(),
            })
        }
    }

    fn assert_conserved(tx: &FinalizedTransaction) {
        assert_eq!(tx.total_in() - tx.total_out(), tx.fee);
        assert!(tx.fee >= tx.fee_estimate.max);
        assert!(tx.fee_dust() < tx.stamp_size);
    }

    #[test]
    fn reference_balance_end_to_end() {
        let request = TransferRequest {
            coins: vec![coin("ab", 150_012_345)],
            target: Target::Balance {
                handle: "main".into(),
            },
        };
        let mut allocator = FakeAllocator::default();
        let tx = prepare_transfer(
            request,
            &PlanParams::default(),
            &DashFeeAppraiser,
            &mut allocator,
            &ChangePolicy::forbid(),
        )
        .unwrap();

        let sats: Vec<u64> = tx.outputs.iter().map(|o| o.satoshis).collect();
        assert_eq!(sats, vec![100_006_000, 50_006_000]);
        assert_eq!(tx.fee, 345);
        assert_eq!(tx.fee_estimate, FeeEstimate { min: 225, mid: 226, max: 227 });
        assert_eq!(tx.fee_dust(), 118);
        assert_conserved(&tx);
    }

    #[test]
    fn payments_conserve_value() {
        let pools = [
            vec![coin("ab", 3 * COIN)],
            vec![coin("ab", COIN / 2), coin("cd", COIN / 3), coin("ef", 7 * COIN / 10)],
            vec![coin("ab", 123_456_789), coin("cd", 98_765)],
        ];
        for pool in pools {
            let request = TransferRequest {
                coins: pool,
                target: Target::Payouts(vec![Payout {
                    handle: "@bob".into(),
                    satoshis: COIN / 5 + COIN / 100,
                }]),
            };
            let mut allocator = FakeAllocator::default();
            let tx = prepare_transfer(
                request,
                &PlanParams::default(),
                &DashFeeAppraiser,
                &mut allocator,
                &ChangePolicy::to_account("main"),
            )
            .unwrap();
            assert_conserved(&tx);
            assert!(tx.outputs.iter().all(|o| o.stamps >= 1));
            let paid: u64 = tx
                .outputs
                .iter()
                .filter(|o| !o.change)
                .map(|o| o.face_value)
                .sum();
            assert_eq!(paid, COIN / 5 + COIN / 100);
        }
    }

    #[test]
    fn forbidden_change_finalizes_nothing() {
        let request = TransferRequest {
            coins: vec![coin("ab", 2 * COIN)],
            target: Target::Payouts(vec![Payout {
                handle: "@bob".into(),
                satoshis: COIN,
            }]),
        };
        let mut allocator = FakeAllocator::default();
        let err = prepare_transfer(
            request,
            &PlanParams::default(),
            &DashFeeAppraiser,
            &mut allocator,
            &ChangePolicy::forbid(),
        )
        .unwrap_err();
        match err {
            PlanError::ChangeNotAllowed { denoms } => {
                assert!(!denoms.is_empty());
                assert!(denoms.iter().all(|d| *d < COIN));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hand_off_returns_signer_output() {
        let request = TransferRequest {
            coins: vec![coin("ab", 150_012_345)],
            target: Target::Balance {
                handle: "main".into(),
            },
        };
        let mut allocator = FakeAllocator::default();
        let tx = prepare_transfer(
            request,
            &PlanParams::default(),
            &DashFeeAppraiser,
            &mut allocator,
            &ChangePolicy::forbid(),
        )
        .unwrap();
        let signed = hand_off(&tx, &EchoSigner).unwrap();
        assert_eq!(signed.outputs, tx.outputs);
        assert_eq!(signed.transaction, "0200");
    }

    #[test]
    fn hand_off_refuses_unbalanced_books() {
        let tx = FinalizedTransaction {
            inputs: vec![coin("ab", 1_000)],
            outputs: vec![FinalOutput {
                address: "Xout".into(),
                satoshis: 700,
                face_value: 500,
                stamps: 1,
                change: false,
            }],
            fee: 200,
            fee_estimate: FeeEstimate { min: 1, mid: 2, max: 3 },
            stamp_size: 200,
        };
        let err = hand_off(&tx, &EchoSigner).unwrap_err();
        assert!(matches!(
            err,
            PlanError::FeeMismatch {
                declared: 200,
                actual: 300
            }
        ));
    }

    #[test]
    fn signer_failure_passes_through() {
        struct Broken;
        impl Signer for Broken {
            fn sign(&self, _tx: &FinalizedTransaction) -> Result<SignedTransaction, BoxError> {
                Err("hardware wallet unplugged".into())
            }
        }
        let tx = FinalizedTransaction {
            inputs: vec![coin("ab", 1_000)],
            outputs: vec![],
            fee: 1_000,
            fee_estimate: FeeEstimate { min: 1, mid: 2, max: 3 },
            stamp_size: 200,
        };
        let err = hand_off(&tx, &Broken).unwrap_err();
        assert!(matches!(err, PlanError::Signer(_)));
        assert!(err.to_string().contains("unplugged"));
    }
}
