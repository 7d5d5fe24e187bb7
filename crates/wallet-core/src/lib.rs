//! Wallet state and commands around the `chain-dash` accounting engine.
//!
//! The store implements the engine's address and balance collaborators on
//! top of a JSON wallet file; `commands` holds one function per CLI
//! subcommand.

pub mod commands;
pub mod config;
pub mod error;
pub mod store;

pub use commands::{
    appraise, balances, denominate, list_coins, pay, AccountBalance, AppraisalReport,
    BalanceReport, CoinListing, CoinSort, PayOptions,
};
pub use config::{data_dir, WalletConfig};
pub use error::WalletError;
pub use store::{Account, WalletDoc, WalletStore};
