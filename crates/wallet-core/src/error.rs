use std::path::PathBuf;

use chain_dash::{BoxError, FaultKind, PlanError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown account '{0}'")]
    UnknownAccount(String),

    #[error("invalid coin '{0}': expected addr:txid:vout")]
    InvalidCoinSpec(String),

    #[error("no coin matches '{0}'")]
    CoinNotFound(String),

    #[error("'{spec}' matches {matches} coins, use a longer prefix")]
    AmbiguousCoin { spec: String, matches: usize },

    #[error("coin '{0}' was listed twice")]
    DuplicateCoin(String),

    #[error("transactions with {inputs} inputs and {outputs} outputs are not valid")]
    EmptyShape { inputs: usize, outputs: usize },

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("balance lookup failed: {0}")]
    Balance(#[source] BoxError),
}

impl WalletError {
    /// True when the error comes from a broken accounting invariant.
    pub fn is_internal(&self) -> bool {
        matches!(self, WalletError::Plan(e) if e.kind() == FaultKind::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_ambiguous_coin() {
        let err = WalletError::AmbiguousCoin {
            spec: "Xa:ab:0".into(),
            matches: 2,
        };
        assert_eq!(err.to_string(), "'Xa:ab:0' matches 2 coins, use a longer prefix");
    }

    #[test]
    fn display_io_includes_path() {
        let err = WalletError::Io {
            path: PathBuf::from("/tmp/wallet.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "cannot access /tmp/wallet.json: gone");
    }

    #[test]
    fn plan_errors_convert_transparently() {
        let err: WalletError = PlanError::NoCoins.into();
        assert_eq!(err.to_string(), "no coins to spend");
        assert!(!err.is_internal());

        let err: WalletError = PlanError::LeftoverAddresses {
            handle: "main".into(),
            count: 1,
        }
        .into();
        assert!(err.is_internal());
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(WalletError::UnknownAccount("x".into()));
        assert_eq!(err.to_string(), "unknown account 'x'");
    }
}
