//! Dash denomination-and-stamp transaction accounting.
//!
//! Turns a balance or a requested payment into a set of ladder-denominated,
//! stamp-padded outputs, binds them to addresses, and reconciles the plan
//! against an appraised network fee until `inputs - outputs == fee` exactly.
//! Signing, broadcast and wallet persistence live outside this crate behind
//! the collaborator traits re-exported below.

pub mod amount;
pub mod assemble;
pub mod decompose;
pub mod draft;
pub mod error;
pub mod fee;
pub mod ladder;
pub mod plan;
pub mod reconcile;
pub mod stamp;
pub mod summary;
pub mod transaction;
pub mod utxo;

pub use assemble::{assemble_outputs, AddressAllocator, AddressBatch, ChangePolicy};
pub use draft::{finalize, FinalizedTransaction, OutputEntry, PayeeRequest, Stage, TransactionDraft};
pub use error::{AllocatorError, BoxError, FaultKind, PlanError};
pub use fee::{DashFeeAppraiser, FeeAppraiser, FeeEstimate};
pub use ladder::Ladder;
pub use plan::{build_transfer_plan, PlanParams, Payout, Target, TransferRequest};
pub use reconcile::reconcile_fee;
pub use summary::{summarize_coins, CoinSummary};
pub use transaction::{hand_off, prepare_transfer, SignedTransaction, Signer};
pub use utxo::{BalanceSource, Coin};

/// Padding quantum added on top of a denomination's face value.
pub const STAMP: u64 = 200;
