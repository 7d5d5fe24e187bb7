use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::check_money;
use crate::error::{BoxError, PlanError};
use crate::fee::FeeAppraiser;

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    /// Address holding the coin.
    pub address: String,
    /// Transaction ID as a hex string (display order).
    pub tx_id: String,
    /// Output index within the transaction.
    pub output_index: u32,
    /// Value in satoshis.
    pub satoshis: u64,
}

impl Coin {
    /// `txid:vout`.
    pub fn outpoint(&self) -> String {
        format!("{}:{}", self.tx_id, self.output_index)
    }

    /// Short human identifier: `addrPrefix:txidPrefix:vout`.
    pub fn short_id(&self) -> String {
        let addr: String = self.address.chars().take(9).collect();
        let txid: String = self.tx_id.chars().take(6).collect();
        format!("{addr}:{txid}:{}", self.output_index)
    }

    /// True when the txid is 32 bytes of hex.
    pub fn has_valid_txid(&self) -> bool {
        matches!(hex::decode(&self.tx_id), Ok(bytes) if bytes.len() == 32)
    }
}

/// Looks up the spendable coins held by an account.
pub trait BalanceSource {
    fn coins_for(&self, handle: &str) -> Result<Vec<Coin>, BoxError>;
}

/// Sum of coin values, saturating.
pub fn total_satoshis(coins: &[Coin]) -> u64 {
    coins.iter().fold(0u64, |acc, c| acc.saturating_add(c.satoshis))
}

/// Sum of coin values, refusing sums past the money supply.
pub fn checked_total(coins: &[Coin]) -> Result<u64, PlanError> {
    let total = coins
        .iter()
        .try_fold(0u64, |acc, c| acc.checked_add(c.satoshis))
        .ok_or_else(|| PlanError::InvalidAmount("coin values overflow".into()))?;
    check_money("balance", total)
}

fn overflow(what: &str) -> PlanError {
    PlanError::InvalidAmount(format!("{what} overflows"))
}

/// Result of coin selection: the chosen coins and their aggregate value.
#[derive(Debug, Clone)]
pub struct CoinSelection {
    /// The selected coins, largest first.
    pub selected: Vec<Coin>,
    /// Total value of the selected coins in satoshis.
    pub total_sat: u64,
}

/// Select coins to cover `target_sat`, `per_output_sat` for each of `outputs`
/// outputs, and the maximum appraised fee.
///
/// Largest-first: coins are taken in descending order of value and the fee
/// is re-appraised for the current input count after each pick.
pub fn select_coins(
    coins: &[Coin],
    target_sat: u64,
    outputs: usize,
    per_output_sat: u64,
    appraiser: &dyn FeeAppraiser,
) -> Result<CoinSelection, PlanError> {
    if coins.is_empty() {
        return Err(PlanError::NoCoins);
    }

    let mut sorted: Vec<&Coin> = coins.iter().collect();
    sorted.sort_by(|a, b| b.satoshis.cmp(&a.satoshis));

    let base = per_output_sat
        .checked_mul(outputs as u64)
        .and_then(|padding| padding.checked_add(target_sat))
        .ok_or_else(|| overflow("payment target"))?;
    let mut selected: Vec<Coin> = Vec::new();
    let mut total_sat: u64 = 0;
    let mut need = base;

    for coin in sorted {
        selected.push(coin.clone());
        total_sat = total_sat
            .checked_add(coin.satoshis)
            .ok_or_else(|| overflow("selected coin total"))?;

        let fee = appraiser
            .appraise(selected.len(), outputs)
            .map_err(PlanError::Appraiser)?;
        need = base
            .checked_add(fee.max)
            .ok_or_else(|| overflow("payment target"))?;
        if total_sat >= need {
            debug!(
                inputs = selected.len(),
                total_sat, need, "selected coins largest-first"
            );
            return Ok(CoinSelection {
                selected,
                total_sat,
            });
        }
    }

    Err(PlanError::InsufficientFunds {
        have: total_sat,
        need,
    })
}
