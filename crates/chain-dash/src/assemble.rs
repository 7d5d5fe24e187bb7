//! Binding planned outputs to payee and change addresses.

use tracing::{debug, info, warn};

use crate::draft::{Stage, TransactionDraft};
use crate::error::{AllocatorError, PlanError};

/// Fresh addresses handed out by an [`AddressAllocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBatch {
    pub addresses: Vec<String>,
    /// Derivation index of the first address in the batch.
    pub index: u32,
}

/// Hands out unused receive/change addresses for an account or contact.
pub trait AddressAllocator {
    /// Reserve the next `count` addresses for `handle`.
    ///
    /// Must return exactly `count` addresses, or
    /// [`AllocatorError::Exhausted`] when there are not enough fresh ones.
    fn next_addresses(&mut self, handle: &str, count: usize) -> Result<AddressBatch, AllocatorError>;
}

/// Where leftover value may go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePolicy {
    pub allow_change: bool,
    /// Account change addresses are drawn from.
    pub change_handle: String,
}

impl ChangePolicy {
    pub fn forbid() -> Self {
        Self {
            allow_change: false,
            change_handle: String::new(),
        }
    }

    pub fn to_account(handle: impl Into<String>) -> Self {
        Self {
            allow_change: true,
            change_handle: handle.into(),
        }
    }
}

/// Bind every output of a padded draft to an address.
///
/// Payees are served in request order. Each payee denomination claims the
/// first unbound output of the same face value and the next address from
/// that payee's batch. Whatever is unclaimed afterwards is change.
pub fn assemble_outputs(
    mut draft: TransactionDraft,
    allocator: &mut dyn AddressAllocator,
    policy: &ChangePolicy,
) -> Result<TransactionDraft, PlanError> {
    draft.expect_stage(Stage::Padded, Stage::AddressBound)?;

    let payees = draft.payees.clone();
    for payee in &payees {
        let batch = allocator.next_addresses(&payee.handle, payee.denoms.len())?;
        debug!(handle = %payee.handle, count = batch.addresses.len(), index = batch.index, "payee addresses");
        let mut addresses = batch.addresses.into_iter();

        let mut assigned = 0u64;
        for &denom in &payee.denoms {
            let entry = draft
                .outputs
                .iter_mut()
                .find(|o| o.address.is_none() && o.denomination == denom)
                .ok_or_else(|| PlanError::UnmatchedDenomination {
                    handle: payee.handle.clone(),
                    denom,
                })?;
            let address = addresses.next().ok_or_else(|| PlanError::UnmatchedDenomination {
                handle: payee.handle.clone(),
                denom,
            })?;
            entry.address = Some(address);
            entry.handle = Some(payee.handle.clone());
            entry.change = false;
            assigned += denom;
        }

        let leftover = addresses.count();
        if leftover > 0 {
            return Err(PlanError::LeftoverAddresses {
                handle: payee.handle.clone(),
                count: leftover,
            });
        }
        if assigned != payee.satoshis {
            return Err(PlanError::PayeeAmountMismatch {
                handle: payee.handle.clone(),
                requested: payee.satoshis,
                assigned,
            });
        }
    }

    let change = draft.unbound_denoms();
    if !change.is_empty() {
        if !policy.allow_change {
            warn!(count = change.len(), "refusing to create change outputs");
            return Err(PlanError::ChangeNotAllowed { denoms: change });
        }

        let handle = &policy.change_handle;
        let batch = allocator.next_addresses(handle, change.len())?;
        let mut addresses = batch.addresses.into_iter();
        for entry in draft.outputs.iter_mut().filter(|o| o.address.is_none()) {
            let address = addresses.next().ok_or_else(|| PlanError::UnmatchedDenomination {
                handle: handle.clone(),
                denom: entry.denomination,
            })?;
            entry.address = Some(address);
            entry.handle = Some(handle.clone());
            entry.change = true;
        }
        let leftover = addresses.count();
        if leftover > 0 {
            return Err(PlanError::LeftoverAddresses {
                handle: handle.clone(),
                count: leftover,
            });
        }
    }

    info!(
        outputs = draft.outputs.len(),
        change = change.len(),
        "bound outputs to addresses"
    );
    draft.advance(Stage::AddressBound)?;
    Ok(draft)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::fee::DashFeeAppraiser;
    use crate::plan::{build_transfer_plan, PlanParams, Payout, Target, TransferRequest};
    use crate::utxo::Coin;

    const COIN: u64 = 100_000_000;

    /// Sequential fake addresses, `<handle>-<n>`, with an optional cap.
    #[derive(Default)]
    pub(crate) struct FakeAllocator {
        pub cursors: HashMap<String, u32>,
        pub cap: Option<u32>,
        /// Hand out this many more addresses than asked for.
        pub surplus: usize,
    }

    impl AddressAllocator for FakeAllocator {
        fn next_addresses(
            &mut self,
            handle: &str,
            count: usize,
        ) -> Result<AddressBatch, AllocatorError> {
            let cursor = self.cursors.entry(handle.to_string()).or_default();
            let index = *cursor;
            if let Some(cap) = self.cap {
                let available = cap.saturating_sub(index) as usize;
                if available < count {
                    return Err(AllocatorError::Exhausted {
                        handle: handle.to_string(),
                        requested: count,
                        available,
                    });
                }
            }
            let n = count + self.surplus;
            let addresses = (index..index + n as u32)
                .map(|i| format!("{handle}-{i}"))
                .collect();
            *cursor += count as u32;
            Ok(AddressBatch { addresses, index })
        }
    }

    fn coin(satoshis: u64) -> Coin {
        Coin {
            address: "Xsource".into(),
            tx_id: "ab".repeat(32),
            output_index: 0,
            satoshis,
        }
    }

    fn padded_payment(total: u64, payouts: &[(&str, u64)]) -> TransactionDraft {
        build_transfer_plan(
            TransferRequest {
                coins: vec![coin(total)],
                target: Target::Payouts(
                    payouts
                        .iter()
                        .map(|(h, s)| Payout {
                            handle: h.to_string(),
                            satoshis: *s,
                        })
                        .collect(),
                ),
            },
            &PlanParams::default(),
            &DashFeeAppraiser,
        )
        .unwrap()
    }

    #[test]
    fn binds_payee_and_change() {
        let draft = padded_payment(2 * COIN, &[("@bob", COIN + COIN / 2)]);
        let mut allocator = FakeAllocator::default();
        let bound =
            assemble_outputs(draft, &mut allocator, &ChangePolicy::to_account("main")).unwrap();

        assert_eq!(bound.stage(), Stage::AddressBound);
        let outs = bound.outputs();
        assert_eq!(outs[0].address.as_deref(), Some("@bob-0"));
        assert_eq!(outs[1].address.as_deref(), Some("@bob-1"));
        assert!(!outs[0].change && !outs[1].change);
        assert!(outs[2..].iter().all(|o| o.change));
        assert_eq!(outs[2].address.as_deref(), Some("main-0"));
        assert!(bound.unbound_denoms().is_empty());
    }

    #[test]
    fn payee_sum_matches_request_for_each_payee() {
        let draft = padded_payment(
            10 * COIN,
            &[("@alice", 3 * COIN + COIN / 5), ("@bob", COIN / 1000)],
        );
        let mut allocator = FakeAllocator::default();
        let bound =
            assemble_outputs(draft, &mut allocator, &ChangePolicy::to_account("main")).unwrap();
        let sum_for = |h: &str| -> u64 {
            bound
                .outputs()
                .iter()
                .filter(|o| o.handle.as_deref() == Some(h))
                .map(|o| o.denomination)
                .sum()
        };
        assert_eq!(sum_for("@alice"), 3 * COIN + COIN / 5);
        assert_eq!(sum_for("@bob"), COIN / 1000);
    }

    #[test]
    fn change_is_refused_when_forbidden() {
        let draft = padded_payment(2 * COIN, &[("@bob", COIN)]);
        let expected_change: Vec<u64> = draft.outputs()[1..].iter().map(|o| o.denomination).collect();
        let mut allocator = FakeAllocator::default();
        let err = assemble_outputs(draft, &mut allocator, &ChangePolicy::forbid()).unwrap_err();
        match err {
            PlanError::ChangeNotAllowed { denoms } => {
                assert_eq!(denoms, expected_change);
                assert!(!denoms.is_empty());
                assert!(denoms.iter().all(|&d| d < COIN));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exhausted_allocator_is_a_user_fault() {
        let draft = padded_payment(2 * COIN, &[("@bob", COIN + COIN / 2)]);
        let mut allocator = FakeAllocator {
            cap: Some(1),
            ..FakeAllocator::default()
        };
        let err = assemble_outputs(draft, &mut allocator, &ChangePolicy::to_account("main"))
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::AddressesExhausted {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert!(!err.is_internal());
    }

    #[test]
    fn surplus_addresses_are_an_internal_fault() {
        let draft = padded_payment(2 * COIN, &[("@bob", COIN)]);
        let mut allocator = FakeAllocator {
            surplus: 1,
            ..FakeAllocator::default()
        };
        let err = assemble_outputs(draft, &mut allocator, &ChangePolicy::to_account("main"))
            .unwrap_err();
        assert!(matches!(err, PlanError::LeftoverAddresses { count: 1, .. }));
        assert!(err.is_internal());
    }

    #[test]
    fn short_batch_is_an_internal_fault() {
        struct Stingy;
        impl AddressAllocator for Stingy {
            fn next_addresses(
                &mut self,
                _handle: &str,
                _count: usize,
            ) -> Result<AddressBatch, AllocatorError> {
                Ok(AddressBatch {
                    addresses: vec![],
                    index: 0,
                })
            }
        }
        let draft = padded_payment(2 * COIN, &[("@bob", COIN)]);
        let err =
            assemble_outputs(draft, &mut Stingy, &ChangePolicy::to_account("main")).unwrap_err();
        assert!(matches!(
            err,
            PlanError::UnmatchedDenomination { denom, .. } if denom == COIN
        ));
    }

    #[test]
    fn requires_padded_stage() {
        let draft = padded_payment(2 * COIN, &[("@bob", COIN)]);
        let mut allocator = FakeAllocator::default();
        let bound =
            assemble_outputs(draft, &mut allocator, &ChangePolicy::to_account("main")).unwrap();
        let err = assemble_outputs(bound, &mut allocator, &ChangePolicy::to_account("main"))
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::StageViolation {
                from: Stage::AddressBound,
                to: Stage::AddressBound
            }
        ));
    }
}
