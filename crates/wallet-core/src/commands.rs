//! Wallet operations behind the CLI subcommands.
//!
//! Each operation borrows the store mutably and leaves address cursors
//! advanced in memory only; callers persist with [`WalletStore::save`] once
//! the finalized transaction has been handed off.

use std::cmp::Ordering;
use std::str::FromStr;

use chain_dash::amount::parse_amount;
use chain_dash::summary::CoinLine;
use chain_dash::{
    prepare_transfer, summarize_coins, BalanceSource, ChangePolicy, Coin, CoinSummary,
    DashFeeAppraiser, FeeEstimate, FinalizedTransaction, Payout, PlanError, Target,
    TransferRequest,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::store::WalletStore;

/// Fee bounds for a hypothetical transaction shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppraisalReport {
    pub inputs: usize,
    pub outputs: usize,
    pub fees: FeeEstimate,
    /// Odds that the minimum fee is enough.
    pub chance: String,
}

impl AppraisalReport {
    pub fn range(&self) -> u64 {
        self.fees.max - self.fees.min
    }
}

/// Odds that every input's signature comes out at the shortest length.
pub fn acceptance_chance(inputs: usize) -> String {
    if inputs <= 1 {
        return "25%".to_string();
    }
    u32::try_from(inputs)
        .ok()
        .and_then(|n| 4u128.checked_pow(n))
        .map(|odds| format!("1 in {}", group_thousands(odds)))
        .unwrap_or_else(|| format!("1 in 4^{inputs}"))
}

fn group_thousands(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Appraise `inputs` inputs and `outputs` outputs (defaulting to as many as inputs).
pub fn appraise(inputs: usize, outputs: Option<usize>) -> Result<AppraisalReport, WalletError> {
    let outputs = outputs.unwrap_or(inputs);
    if inputs == 0 || outputs == 0 {
        warn!(inputs, outputs, "theoretical transaction shape");
        return Err(WalletError::EmptyShape { inputs, outputs });
    }
    Ok(AppraisalReport {
        inputs,
        outputs,
        fees: DashFeeAppraiser::estimate(inputs, outputs),
        chance: acceptance_chance(inputs),
    })
}

/// Spendable value held by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub handle: String,
    pub coins: usize,
    pub satoshis: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReport {
    pub accounts: Vec<AccountBalance>,
    pub total: u64,
}

/// Coins of every account in `handles`, read through the balance source.
fn coins_from(source: &dyn BalanceSource, handles: &[String]) -> Result<Vec<Coin>, WalletError> {
    let mut coins = Vec::new();
    for handle in handles {
        let held = source
            .coins_for(handle)
            .map_err(|e| match e.downcast::<WalletError>() {
                Ok(wallet) => *wallet,
                Err(other) => WalletError::Balance(other),
            })?;
        coins.extend(held);
    }
    Ok(coins)
}

/// Balance per account in `handles`, plus the total.
pub fn balances(source: &dyn BalanceSource, handles: &[String]) -> Result<BalanceReport, WalletError> {
    let mut accounts = Vec::with_capacity(handles.len());
    let mut total: u64 = 0;
    for handle in handles {
        let coins = coins_from(source, std::slice::from_ref(handle))?;
        let satoshis = chain_dash::utxo::checked_total(&coins)?;
        total = total
            .checked_add(satoshis)
            .ok_or_else(|| PlanError::InvalidAmount("wallet total overflows".into()))?;
        accounts.push(AccountBalance {
            handle: handle.clone(),
            coins: coins.len(),
            satoshis,
        });
    }
    Ok(BalanceReport { accounts, total })
}

/// Sort keys for [`list_coins`], applied in order until one differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinSort {
    /// Owning account, ascending.
    Wallet,
    /// Value, largest first.
    Amount,
    /// Address, ascending.
    Addr,
}

impl CoinSort {
    pub const DEFAULT: &'static [CoinSort] = &[CoinSort::Wallet, CoinSort::Amount, CoinSort::Addr];
}

impl FromStr for CoinSort {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet" => Ok(CoinSort::Wallet),
            "amount" | "satoshis" => Ok(CoinSort::Amount),
            "addr" => Ok(CoinSort::Addr),
            _ => Err(WalletError::BadInput(format!(
                "unrecognized sort '{s}' (expected wallet, amount or addr)"
            ))),
        }
    }
}

/// A coin summary plus the account each listed coin belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinListing {
    pub summary: CoinSummary,
    pub owners: Vec<String>,
}

impl CoinListing {
    pub fn rows(&self) -> impl Iterator<Item = (&CoinLine, &str)> {
        self.summary
            .lines
            .iter()
            .zip(self.owners.iter().map(String::as_str))
    }
}

/// Summarize the coins of `account`, or of every own account, ordered by
/// `sort` (owner, then value, then address when empty).
pub fn list_coins(
    store: &WalletStore,
    config: &WalletConfig,
    account: Option<&str>,
    sort: &[CoinSort],
) -> Result<CoinListing, WalletError> {
    let handles = match account {
        Some(handle) => vec![handle.to_string()],
        None => store.own_accounts(),
    };
    let mut coins = coins_from(store, &handles)?;
    let keys = if sort.is_empty() { CoinSort::DEFAULT } else { sort };
    coins.sort_by(|a, b| {
        keys.iter().fold(Ordering::Equal, |order, key| {
            order.then_with(|| match key {
                CoinSort::Wallet => store.account_of(&a.address).cmp(&store.account_of(&b.address)),
                CoinSort::Amount => b.satoshis.cmp(&a.satoshis),
                CoinSort::Addr => a.address.cmp(&b.address),
            })
        })
    });
    let owners = coins
        .iter()
        .map(|c| store.account_of(&c.address).unwrap_or_default().to_string())
        .collect();
    Ok(CoinListing {
        summary: summarize_coins(&coins, &config.plan_params()),
        owners,
    })
}

/// Re-denominate the listed coins into `account` (the change account by default).
pub fn denominate(
    store: &mut WalletStore,
    config: &WalletConfig,
    coin_list: &str,
    account: Option<&str>,
) -> Result<FinalizedTransaction, WalletError> {
    let coins = store.resolve_coins(coin_list)?;
    let handle = account.unwrap_or(&config.change_account).to_string();
    info!(coins = coins.len(), %handle, "denominating");

    let request = TransferRequest {
        coins,
        target: Target::Balance { handle },
    };
    Ok(prepare_transfer(
        request,
        &config.plan_params(),
        &DashFeeAppraiser,
        store,
        &ChangePolicy::forbid(),
    )?)
}

/// Arguments of [`pay`].
#[derive(Debug, Clone, Default)]
pub struct PayOptions {
    pub handle: String,
    /// A decimal amount, or a coin list to send in full.
    pub amount_or_coins: String,
    /// More `(handle, amount)` payees in the same transaction.
    pub extra_payouts: Vec<(String, String)>,
    pub coins: Option<String>,
    pub accounts: Option<Vec<String>>,
    pub change_account: Option<String>,
    pub allow_change: bool,
}

fn looks_like_coins(arg: &str) -> bool {
    arg.contains(':')
}

/// Pay an amount (or the full value of some coins) to `handle`.
pub fn pay(
    store: &mut WalletStore,
    config: &WalletConfig,
    opts: &PayOptions,
) -> Result<FinalizedTransaction, WalletError> {
    let params = config.plan_params();
    let change_policy = ChangePolicy {
        allow_change: opts.allow_change,
        change_handle: opts
            .change_account
            .clone()
            .unwrap_or_else(|| config.change_account.clone()),
    };

    if looks_like_coins(&opts.amount_or_coins) {
        if let Some(coins) = &opts.coins {
            return Err(WalletError::BadInput(format!(
                "cannot specify '{}' and --coins '{coins}'",
                opts.amount_or_coins
            )));
        }
        if let Some(accounts) = &opts.accounts {
            return Err(WalletError::BadInput(format!(
                "cannot specify '{}' and --accounts '{}'",
                opts.amount_or_coins,
                accounts.join(",")
            )));
        }
        if !opts.extra_payouts.is_empty() {
            return Err(WalletError::BadInput(
                "each payout must have an amount when paying several payees".into(),
            ));
        }

        let coins = store.resolve_coins(&opts.amount_or_coins)?;
        info!(coins = coins.len(), handle = %opts.handle, "sending coins in full");
        let request = TransferRequest {
            coins,
            target: Target::Balance {
                handle: opts.handle.clone(),
            },
        };
        return Ok(prepare_transfer(
            request,
            &params,
            &DashFeeAppraiser,
            store,
            &change_policy,
        )?);
    }

    let mut payouts = vec![Payout {
        handle: opts.handle.clone(),
        satoshis: parse_amount(&opts.amount_or_coins)?,
    }];
    for (handle, amount) in &opts.extra_payouts {
        payouts.push(Payout {
            handle: handle.clone(),
            satoshis: parse_amount(amount)?,
        });
    }

    let pool = match (&opts.coins, &opts.accounts) {
        (Some(coins), Some(accounts)) => {
            return Err(WalletError::BadInput(format!(
                "cannot specify --accounts '{}' and --coins '{coins}'",
                accounts.join(",")
            )))
        }
        (Some(coins), None) => store.resolve_coins(coins)?,
        (None, Some(accounts)) => coins_from(&*store, accounts)?,
        (None, None) => coins_from(&*store, &store.own_accounts())?,
    };
    info!(payees = payouts.len(), pool = pool.len(), "paying");

    let request = TransferRequest {
        coins: pool,
        target: Target::Payouts(payouts),
    };
    Ok(prepare_transfer(
        request,
        &params,
        &DashFeeAppraiser,
        store,
        &change_policy,
    )?)
}

/// Parse a `handle=amount` payout argument.
pub fn parse_payout(arg: &str) -> Result<(String, String), WalletError> {
    match arg.split_once('=') {
        Some((handle, amount)) if !handle.is_empty() && !amount.is_empty() => {
            Ok((handle.to_string(), amount.to_string()))
        }
        _ => Err(WalletError::BadInput(format!(
            "expected handle=amount, got '{arg}'"
        ))),
    }
}
