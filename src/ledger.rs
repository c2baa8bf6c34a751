//! Asset ledger interface.
//!
//! The ledger is the external system of record for balances, transfers, and
//! spending allowances. The engine consumes it through two calls: an
//! allowance query and a transfer authorization. Both are treated as atomic
//! and synchronous per call, and both can fail.
//!
//! `Err` from either call means the ledger itself misbehaved (transport,
//! storage). A transfer the ledger executed but declined — insufficient
//! balance or allowance — comes back as `Ok(false)`.

use crate::{AccountId, Amount, AssetId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub type Result<T> = anyhow::Result<T>;

#[async_trait]
pub trait AssetLedger: Send + Sync {
    /// Remaining amount of `asset` that `spender` is authorized to move out
    /// of `owner`'s balance.
    async fn allowance(
        &self,
        owner: &AccountId,
        spender: &AccountId,
        asset: &AssetId,
    ) -> Result<Amount>;

    /// Move `amount` of `asset` from `owner` to `recipient` under the
    /// caller's standing allowance. Returns `Ok(false)` if the ledger
    /// declines the transfer.
    async fn transfer_from(
        &self,
        owner: &AccountId,
        recipient: &AccountId,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<bool>;
}

/// In-memory ledger for tests and demos: balances plus allowances granted to
/// a single spender (the engine account).
pub struct MemoryLedger {
    spender: AccountId,
    inner: Mutex<LedgerBooks>,
}

#[derive(Default)]
struct LedgerBooks {
    balances: HashMap<(AccountId, AssetId), Amount>,
    allowances: HashMap<(AccountId, AssetId), Amount>,
}

impl MemoryLedger {
    /// `spender` is the engine identity all allowances are granted to.
    pub fn new(spender: AccountId) -> Self {
        Self {
            spender,
            inner: Mutex::new(LedgerBooks::default()),
        }
    }

    pub fn credit(&self, owner: &AccountId, asset: &AssetId, amount: Amount) {
        let mut books = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let balance = books
            .balances
            .entry((owner.clone(), asset.clone()))
            .or_insert(Amount::ZERO);
        *balance = balance.checked_add(amount).unwrap_or(*balance);
    }

    /// Record an allowance grant from `owner` to the configured spender.
    pub fn approve(&self, owner: &AccountId, asset: &AssetId, amount: Amount) {
        let mut books = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        books
            .allowances
            .insert((owner.clone(), asset.clone()), amount);
    }

    pub fn balance_of(&self, owner: &AccountId, asset: &AssetId) -> Amount {
        let books = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        books
            .balances
            .get(&(owner.clone(), asset.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }
}

#[async_trait]
impl AssetLedger for MemoryLedger {
    async fn allowance(
        &self,
        owner: &AccountId,
        spender: &AccountId,
        asset: &AssetId,
    ) -> Result<Amount> {
        if spender != &self.spender {
            return Ok(Amount::ZERO);
        }
        let books = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(books
            .allowances
            .get(&(owner.clone(), asset.clone()))
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    async fn transfer_from(
        &self,
        owner: &AccountId,
        recipient: &AccountId,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<bool> {
        let mut books = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let allowance_key = (owner.clone(), asset.clone());
        let Some(remaining) = books
            .allowances
            .get(&allowance_key)
            .copied()
            .and_then(|a| a.checked_sub(amount))
        else {
            return Ok(false);
        };

        let Some(debited) = books
            .balances
            .get(&allowance_key)
            .copied()
            .and_then(|b| b.checked_sub(amount))
        else {
            return Ok(false);
        };

        books.allowances.insert(allowance_key.clone(), remaining);
        books.balances.insert(allowance_key, debited);

        let credit = books
            .balances
            .entry((recipient.clone(), asset.clone()))
            .or_insert(Amount::ZERO);
        *credit = credit.checked_add(amount).unwrap_or(*credit);

        Ok(true)
    }
}
