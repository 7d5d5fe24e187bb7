//! The on-disk wallet: accounts with their address lists, and known coins.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chain_dash::error::BoxError;
use chain_dash::{AddressAllocator, AddressBatch, AllocatorError, BalanceSource, Coin};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WalletError;

pub const WALLET_FILE: &str = "wallet.json";

/// Addresses known for one of our accounts, or for a contact (`@handle`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub addresses: Vec<String>,
    /// Index of the first address not yet handed out.
    #[serde(default)]
    pub next_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDoc {
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    #[serde(default)]
    pub coins: Vec<Coin>,
}

/// Contacts are handles starting with `@`; everything else is ours.
pub fn is_contact(handle: &str) -> bool {
    handle.starts_with('@')
}

#[derive(Debug)]
pub struct WalletStore {
    path: PathBuf,
    doc: WalletDoc,
    allow_reuse: bool,
}

impl WalletStore {
    /// Open `wallet.json` in `dir`. A missing file is an empty wallet.
    pub fn open(dir: &Path, allow_reuse: bool) -> Result<Self, WalletError> {
        let path = dir.join(WALLET_FILE);
        let doc: WalletDoc = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|source| WalletError::Json {
                    path: path.clone(),
                    source,
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => WalletDoc::default(),
            Err(source) => return Err(WalletError::Io { path, source }),
        };
        for coin in doc.coins.iter().filter(|c| !c.has_valid_txid()) {
            warn!(coin = %coin.short_id(), "stored coin has a malformed txid");
        }
        debug!(path = %path.display(), "opened wallet");
        Ok(Self {
            path,
            doc,
            allow_reuse,
        })
    }

    /// Write the wallet back, replacing the file in one rename.
    pub fn save(&self) -> Result<(), WalletError> {
        let io_err = |source: std::io::Error| WalletError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.doc).map_err(|source| WalletError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        info!(path = %self.path.display(), "saved wallet");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn doc(&self) -> &WalletDoc {
        &self.doc
    }

    pub fn insert_account(&mut self, handle: &str, addresses: Vec<String>) {
        self.doc
            .accounts
            .entry(handle.to_string())
            .or_default()
            .addresses
            .extend(addresses);
    }

    pub fn insert_coin(&mut self, coin: Coin) {
        if !self.doc.coins.contains(&coin) {
            self.doc.coins.push(coin);
        }
    }

    pub fn account(&self, handle: &str) -> Result<&Account, WalletError> {
        self.doc
            .accounts
            .get(handle)
            .ok_or_else(|| WalletError::UnknownAccount(handle.to_string()))
    }

    /// Handle of the account an address belongs to.
    pub fn account_of(&self, address: &str) -> Option<&str> {
        self.doc
            .accounts
            .iter()
            .find(|(_, account)| account.addresses.iter().any(|a| a == address))
            .map(|(handle, _)| handle.as_str())
    }

    /// Our own account handles, contacts excluded.
    pub fn own_accounts(&self) -> Vec<String> {
        self.doc
            .accounts
            .keys()
            .filter(|h| !is_contact(h))
            .cloned()
            .collect()
    }

    /// Coins held by any of `handles`, in stored order.
    pub fn coins_for_accounts(&self, handles: &[String]) -> Result<Vec<Coin>, WalletError> {
        let mut addresses = HashSet::new();
        for handle in handles {
            addresses.extend(self.account(handle)?.addresses.iter().map(String::as_str));
        }
        Ok(self
            .doc
            .coins
            .iter()
            .filter(|c| addresses.contains(c.address.as_str()))
            .cloned()
            .collect())
    }

    /// Find the one coin matching `addrPrefix:txidPrefix:vout`.
    pub fn resolve_coin(&self, spec: &str) -> Result<Coin, WalletError> {
        let parts: Vec<&str> = spec.split(':').collect();
        let [addr, txid, vout] = parts[..] else {
            return Err(WalletError::InvalidCoinSpec(spec.to_string()));
        };
        let vout: u32 = vout
            .parse()
            .map_err(|_| WalletError::InvalidCoinSpec(spec.to_string()))?;
        if addr.is_empty() || txid.is_empty() {
            return Err(WalletError::InvalidCoinSpec(spec.to_string()));
        }

        let matches: Vec<&Coin> = self
            .doc
            .coins
            .iter()
            .filter(|c| {
                c.address.starts_with(addr) && c.tx_id.starts_with(txid) && c.output_index == vout
            })
            .collect();
        match matches[..] {
            [coin] => Ok(coin.clone()),
            [] => Err(WalletError::CoinNotFound(spec.to_string())),
            _ => Err(WalletError::AmbiguousCoin {
                spec: spec.to_string(),
                matches: matches.len(),
            }),
        }
    }

    /// Resolve a comma separated coin list. Each coin may appear once.
    pub fn resolve_coins(&self, list: &str) -> Result<Vec<Coin>, WalletError> {
        let mut seen = HashSet::new();
        let mut coins = Vec::new();
        for spec in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let coin = self.resolve_coin(spec)?;
            if !seen.insert(coin.outpoint()) {
                return Err(WalletError::DuplicateCoin(spec.to_string()));
            }
            coins.push(coin);
        }
        Ok(coins)
    }
}

impl AddressAllocator for WalletStore {
    fn next_addresses(&mut self, handle: &str, count: usize) -> Result<AddressBatch, AllocatorError> {
        let allow_reuse = self.allow_reuse;
        let account = self.doc.accounts.get_mut(handle).ok_or_else(|| {
            AllocatorError::Backend(Box::new(WalletError::UnknownAccount(handle.to_string())))
        })?;

        let start = account.next_index as usize;
        let len = account.addresses.len();
        let available = len.saturating_sub(start);
        if count > available && (!allow_reuse || len == 0) {
            return Err(AllocatorError::Exhausted {
                handle: handle.to_string(),
                requested: count,
                available,
            });
        }

        // Past the end of the list only happens with reuse allowed.
        let addresses = (start..start + count)
            .map(|i| account.addresses[i % len].clone())
            .collect();
        account.next_index = u32::try_from(start + count).unwrap_or(u32::MAX);
        debug!(handle, count, index = start, "allocated addresses");

        Ok(AddressBatch {
            addresses,
            index: start as u32,
        })
    }
}

impl BalanceSource for WalletStore {
    fn coins_for(&self, handle: &str) -> Result<Vec<Coin>, BoxError> {
        Ok(self.coins_for_accounts(&[handle.to_string()])?)
    }
}
