use thiserror::Error;

use crate::draft::Stage;

/// Boxed error returned by external collaborators (appraiser, allocator, signer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which part of the system a [`PlanError`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The request cannot be satisfied as given; report it and abort cleanly.
    UserInput,
    /// An accounting invariant broke. Never retried.
    Internal,
    /// An external collaborator failed; passed through untouched.
    Collaborator,
}

/// Denomination, padding and fee-reconciliation errors.
#[derive(Debug, Error)]
pub enum PlanError {
    // ─── user-input faults ───────────────────────────────────────────
    #[error("{value} sat is too small to denominate (minimum {minimum} sat)")]
    TooSmallToDecompose { value: u64, minimum: u64 },

    #[error("not enough dust to pad {required} outputs: only {available} stamps available")]
    InsufficientPadding { required: usize, available: u64 },

    #[error("{outputs} outputs need {min_stamps} stamps each: only {available} stamps available")]
    BelowMinimumStamps {
        outputs: usize,
        min_stamps: u64,
        available: u64,
    },

    #[error("transaction would create {count} change outputs: {denoms:?} (allow change to send it)", count = .denoms.len())]
    ChangeNotAllowed { denoms: Vec<u64> },

    #[error("account '{handle}' has {available} unused addresses, {requested} requested")]
    AddressesExhausted {
        handle: String,
        requested: usize,
        available: usize,
    },

    #[error("insufficient funds: have {have} sat, need {need} sat")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("dust of {available} sat cannot cover the {required} sat fee")]
    InsufficientFee { available: u64, required: u64 },

    #[error("draft pays {fee} sat in fees, appraisal requires {required} sat")]
    FeeShortfall { fee: u64, required: u64 },

    #[error("{amount} sat cannot be paid in whole denominations ({remainder} sat left over)")]
    AmountNotDenominable { amount: u64, remainder: u64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("no coins to spend")]
    NoCoins,

    // ─── internal-consistency faults ─────────────────────────────────
    #[error("decomposition of {value} sat sums to {actual} sat")]
    DecompositionMismatch { value: u64, actual: u64 },

    #[error("payee '{handle}' denomination {denom} sat has no matching output")]
    UnmatchedDenomination { handle: String, denom: u64 },

    #[error("{count} addresses allocated for '{handle}' were left unused")]
    LeftoverAddresses { handle: String, count: usize },

    #[error("payee '{handle}' requested {requested} sat but was assigned {assigned} sat")]
    PayeeAmountMismatch {
        handle: String,
        requested: u64,
        assigned: u64,
    },

    #[error("fee sanity check failed: declared {declared} sat, inputs - outputs = {actual} sat")]
    FeeMismatch { declared: u64, actual: i128 },

    #[error("draft cannot move from {from} to {to}")]
    StageViolation { from: Stage, to: Stage },

    #[error("invalid denomination ladder: {0}")]
    InvalidLadder(String),

    // ─── collaborator faults ─────────────────────────────────────────
    #[error("fee appraisal failed: {0}")]
    Appraiser(#[source] BoxError),

    #[error("address allocation failed: {0}")]
    Allocator(#[source] BoxError),

    #[error("signing failed: {0}")]
    Signer(#[source] BoxError),
}

impl PlanError {
    /// Classify the error for reporting.
    pub fn kind(&self) -> FaultKind {
        match self {
            PlanError::TooSmallToDecompose { .. }
            | PlanError::InsufficientPadding { .. }
            | PlanError::BelowMinimumStamps { .. }
            | PlanError::ChangeNotAllowed { .. }
            | PlanError::AddressesExhausted { .. }
            | PlanError::InsufficientFunds { .. }
            | PlanError::InsufficientFee { .. }
            | PlanError::FeeShortfall { .. }
            | PlanError::AmountNotDenominable { .. }
            | PlanError::InvalidAmount(_)
            | PlanError::NoCoins => FaultKind::UserInput,

            PlanError::DecompositionMismatch { .. }
            | PlanError::UnmatchedDenomination { .. }
            | PlanError::LeftoverAddresses { .. }
            | PlanError::PayeeAmountMismatch { .. }
            | PlanError::FeeMismatch { .. }
            | PlanError::StageViolation { .. }
            | PlanError::InvalidLadder(_) => FaultKind::Internal,

            PlanError::Appraiser(_) | PlanError::Allocator(_) | PlanError::Signer(_) => {
                FaultKind::Collaborator
            }
        }
    }

    /// True when the error indicates a defect rather than a bad request.
    pub fn is_internal(&self) -> bool {
        self.kind() == FaultKind::Internal
    }
}

/// Errors an [`AddressAllocator`](crate::assemble::AddressAllocator) may return.
#[derive(Debug, Error)]
pub enum AllocatorError {
    /// Not enough fresh addresses and reuse is disallowed.
    #[error("account '{handle}' has {available} unused addresses, {requested} requested")]
    Exhausted {
        handle: String,
        requested: usize,
        available: usize,
    },

    #[error("{0}")]
    Backend(#[source] BoxError),
}

impl From<AllocatorError> for PlanError {
    fn from(e: AllocatorError) -> Self {
        match e {
            AllocatorError::Exhausted {
                handle,
                requested,
                available,
            } => PlanError::AddressesExhausted {
                handle,
                requested,
                available,
            },
            AllocatorError::Backend(source) => PlanError::Allocator(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_change_not_allowed_lists_denoms() {
        let err = PlanError::ChangeNotAllowed {
            denoms: vec![100_000_000, 500_000],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 change outputs"));
        assert!(msg.contains("100000000"));
        assert!(msg.contains("500000"));
    }

    #[test]
    fn display_insufficient_padding() {
        let err = PlanError::InsufficientPadding {
            required: 3,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "not enough dust to pad 3 outputs: only 2 stamps available"
        );
    }

    #[test]
    fn display_below_minimum_stamps() {
        let err = PlanError::BelowMinimumStamps {
            outputs: 2,
            min_stamps: 3,
            available: 5,
        };
        assert_eq!(
            err.to_string(),
            "2 outputs need 3 stamps each: only 5 stamps available"
        );
        assert_eq!(err.kind(), FaultKind::UserInput);
    }

    #[test]
    fn display_fee_mismatch() {
        let err = PlanError::FeeMismatch {
            declared: 345,
            actual: -55,
        };
        assert_eq!(
            err.to_string(),
            "fee sanity check failed: declared 345 sat, inputs - outputs = -55 sat"
        );
    }

    #[test]
    fn user_faults_are_classified() {
        let err = PlanError::TooSmallToDecompose {
            value: 5,
            minimum: 10_000,
        };
        assert_eq!(err.kind(), FaultKind::UserInput);
        assert!(!err.is_internal());
    }

    #[test]
    fn internal_faults_are_classified() {
        let err = PlanError::LeftoverAddresses {
            handle: "main".into(),
            count: 1,
        };
        assert_eq!(err.kind(), FaultKind::Internal);
        assert!(err.is_internal());
    }

    #[test]
    fn exhausted_allocator_maps_to_user_fault() {
        let err: PlanError = AllocatorError::Exhausted {
            handle: "@bob".into(),
            requested: 4,
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            PlanError::AddressesExhausted {
                requested: 4,
                available: 1,
                ..
            }
        ));
        assert_eq!(err.kind(), FaultKind::UserInput);
    }

    #[test]
    fn backend_allocator_error_passes_through() {
        let source: BoxError = "disk on fire".into();
        let err: PlanError = AllocatorError::Backend(source).into();
        assert_eq!(err.kind(), FaultKind::Collaborator);
        assert!(err.to_string().contains("disk on fire"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(PlanError::NoCoins);
        assert_eq!(err.to_string(), "no coins to spend");
    }
}
