// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Thread-safe transaction ledger with idempotent inserts.
//!
//! The [`TransactionRepository`] trait is the storage contract the
//! [`Engine`](crate::Engine) relies on. [`Ledger`] is the volatile in-memory
//! implementation.

use crate::base::{IdempotencyKey, TransactionId};
use crate::transaction::{Adjustment, Purchase};
use crate::validation::{approved_total, validate_against_purchase};
use crate::TransactionError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage contract for purchases, adjustments and idempotency records.
///
/// Saves must perform their duplicate checks and the insert atomically.
/// Reads return owned values.
pub trait TransactionRepository: Send + Sync {
    /// Records a purchase.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::DuplicateIdempotencyKey`] - The key is already recorded.
    /// - [`TransactionError::DuplicateTransactionID`] - The ID is already recorded
    ///   under another key.
    fn save_transaction(&self, purchase: Purchase) -> Result<(), TransactionError>;

    /// Records an adjustment against its original purchase.
    ///
    /// The adjustment rules are re-checked against the stored history in the
    /// same critical section as the insert.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::DuplicateIdempotencyKey`] - The key is already recorded.
    /// - [`TransactionError::TransactionNotFound`] - The original purchase is not recorded.
    /// - [`TransactionError::PurchaseNotApproved`] - The original purchase was rejected.
    /// - [`TransactionError::ExceedsOriginalAmount`] - The purchase budget is exhausted.
    fn save_adjustment(&self, adjustment: Adjustment) -> Result<(), TransactionError>;

    /// # Errors
    ///
    /// Returns [`TransactionError::TransactionNotFound`] if no purchase has `id`.
    fn get_transaction_by_id(&self, id: &TransactionId) -> Result<Purchase, TransactionError>;

    /// Returns the adjustments recorded against purchase `id`, in commit order.
    fn get_adjustments_by_transaction_id(
        &self,
        id: &TransactionId,
    ) -> Result<Vec<Adjustment>, TransactionError>;

    /// Advisory lookup; only the save operations are authoritative.
    fn get_by_idempotency_key(&self, key: &IdempotencyKey) -> Option<TransactionId>;

    fn list_transactions(&self) -> Vec<Purchase>;
}

#[derive(Debug, Default)]
struct LedgerState {
    transactions: HashMap<TransactionId, Purchase>,
    /// Adjustments keyed by the purchase they reference.
    adjustments: HashMap<TransactionId, Vec<Adjustment>>,
    idempotency_keys: HashMap<IdempotencyKey, TransactionId>,
}

impl LedgerState {
    /// Fails with the owning transaction if `key` is already recorded.
    fn ensure_unclaimed(&self, key: &IdempotencyKey) -> Result<(), TransactionError> {
        match self.idempotency_keys.get(key) {
            Some(existing) => Err(TransactionError::DuplicateIdempotencyKey(existing.clone())),
            None => Ok(()),
        }
    }

    /// Re-applies the adjustment rules against the history held under the
    /// write lock, so concurrent adjustments cannot overspend a purchase.
    fn revalidate(&self, adjustment: &Adjustment) -> Result<(), TransactionError> {
        let original = self
            .transactions
            .get(adjustment.original_transaction_id())
            .ok_or(TransactionError::TransactionNotFound)?;
        let existing = self
            .adjustments
            .get(adjustment.original_transaction_id())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let total = approved_total(existing, original.amount().local.currency())?;
        validate_against_purchase(adjustment, original, &total)
    }
}

/// In-memory ledger.
///
/// All three maps sit behind a single [`RwLock`]: readers run concurrently,
/// writers are exclusive, and every check-and-insert happens inside one write
/// critical section.
#[derive(Debug, Default)]
pub struct Ledger {
    inner: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded purchases.
    pub fn len(&self) -> usize {
        self.inner.read().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded adjustments across all purchases.
    pub fn adjustment_count(&self) -> usize {
        self.inner.read().adjustments.values().map(Vec::len).sum()
    }
}

impl TransactionRepository for Ledger {
    fn save_transaction(&self, purchase: Purchase) -> Result<(), TransactionError> {
        let mut state = self.inner.write();

        state.ensure_unclaimed(purchase.idempotency_key())?;
        if state.transactions.contains_key(purchase.id()) {
            return Err(TransactionError::DuplicateTransactionID);
        }

        state
            .idempotency_keys
            .insert(purchase.idempotency_key().clone(), purchase.id().clone());
        state.transactions.insert(purchase.id().clone(), purchase);
        Ok(())
    }

    fn save_adjustment(&self, adjustment: Adjustment) -> Result<(), TransactionError> {
        let mut state = self.inner.write();

        state.ensure_unclaimed(adjustment.idempotency_key())?;
        state.revalidate(&adjustment)?;

        state
            .idempotency_keys
            .insert(adjustment.idempotency_key().clone(), adjustment.id().clone());
        state
            .adjustments
            .entry(adjustment.original_transaction_id().clone())
            .or_default()
            .push(adjustment);
        Ok(())
    }

    fn get_transaction_by_id(&self, id: &TransactionId) -> Result<Purchase, TransactionError> {
        self.inner
            .read()
            .transactions
            .get(id)
            .cloned()
            .ok_or(TransactionError::TransactionNotFound)
    }

    fn get_adjustments_by_transaction_id(
        &self,
        id: &TransactionId,
    ) -> Result<Vec<Adjustment>, TransactionError> {
        Ok(self
            .inner
            .read()
            .adjustments
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_by_idempotency_key(&self, key: &IdempotencyKey) -> Option<TransactionId> {
        self.inner.read().idempotency_keys.get(key).cloned()
    }

    fn list_transactions(&self) -> Vec<Purchase> {
        self.inner.read().transactions.values().cloned().collect()
    }
}
