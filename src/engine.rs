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

//! Webhook event processing engine.
//!
//! The [`Engine`] turns a primitive [`ProcessTransactionCommand`] into domain
//! objects, applies the adjustment rules and commits the result to its
//! [`TransactionRepository`].
//!
//! # Event Processing
//!
//! - **Purchases**: Recorded once per idempotency key; amount must be within bounds.
//! - **Reversals / Refunds**: Must reference a recorded, approved purchase; approved
//!   adjustments may not sum past the purchase amount.
//!
//! # Idempotency
//!
//! Each path first does an advisory key lookup to skip building domain objects
//! for obvious redeliveries. The authoritative check happens inside the
//! repository's write lock at commit time; a duplicate found there is reported
//! as an idempotent replay as well.

use crate::base::{IdempotencyKey, TransactionId};
use crate::command::{ProcessResult, ProcessTransactionCommand};
use crate::ledger::{Ledger, TransactionRepository};
use crate::money::{AmountBreakdown, Money};
use crate::transaction::{
    Adjustment, CardContext, Event, Merchant, Purchase, TransactionStatus, TransactionType,
};
use crate::validation::{approved_total, validate_against_purchase};
use crate::TransactionError;
use tracing::{debug, info, warn};

/// Fields shared by purchases and adjustments, built from primitives.
struct Components {
    status: TransactionStatus,
    amount: AmountBreakdown,
    merchant: Merchant,
    event: Event,
    context: CardContext,
}

impl Components {
    fn build(command: &ProcessTransactionCommand) -> Result<Self, TransactionError> {
        let amount = AmountBreakdown {
            local: Money::new(command.local_amount, command.local_currency.as_str())?,
            transaction: Money::new(
                command.transaction_amount,
                command.transaction_currency.as_str(),
            )?,
            settlement: Money::new(
                command.settlement_amount,
                command.settlement_currency.as_str(),
            )?,
            original: Money::new(command.original_amount, command.original_currency.as_str())?,
        };
        let status = command.transaction_status.parse()?;

        Ok(Self {
            status,
            amount,
            merchant: Merchant {
                id: command.merchant_id.clone(),
                mcc: command.merchant_mcc.clone(),
                address: command.merchant_address.clone(),
                name: command.merchant_name.clone(),
                city: command.merchant_city.clone(),
                state: command.merchant_state.clone(),
            },
            event: Event {
                id: command.event_id.clone(),
                created_at: command.event_created_at,
                idempotency_key: IdempotencyKey::from(command.idempotency_key.as_str()),
            },
            context: CardContext {
                user_id: command.user_id.clone(),
                card_id: command.card_id.clone(),
                country: command.country.clone(),
                currency: command.currency.clone(),
                point_of_sale: command.point_of_sale.clone(),
            },
        })
    }
}

/// Maps a repository save outcome to the engine's result.
///
/// A duplicate key at commit time means a concurrent delivery of the same
/// event won the race; that is a replay, not a failure.
fn commit_outcome(
    saved: Result<(), TransactionError>,
    transaction_id: &TransactionId,
) -> Result<ProcessResult, TransactionError> {
    match saved {
        Ok(()) => Ok(ProcessResult::committed(transaction_id.as_str())),
        Err(TransactionError::DuplicateIdempotencyKey(existing)) => {
            Ok(ProcessResult::replay(existing.0))
        }
        Err(err) => Err(err),
    }
}

/// Event processing engine over a transaction repository.
///
/// # Invariants
///
/// - An idempotency key is recorded for at most one transaction.
/// - A purchase ID is recorded under at most one idempotency key.
/// - Approved adjustments never sum past their purchase's local amount.
/// - Only approved purchases receive adjustments.
pub struct Engine<R = Ledger> {
    repository: R,
}

impl Engine<Ledger> {
    /// Creates an engine over an empty in-memory [`Ledger`].
    pub fn new() -> Self {
        Self::with_repository(Ledger::new())
    }
}

impl Default for Engine<Ledger> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TransactionRepository> Engine<R> {
    pub fn with_repository(repository: R) -> Self {
        Engine { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Processes one webhook event.
    ///
    /// # Event Types
    ///
    /// | Type | Behavior |
    /// |------|----------|
    /// | PURCHASE | Validates bounds, records the purchase |
    /// | REVERSAL_PURCHASE | Validates against the purchase, records the adjustment |
    /// | REFUND | Same as REVERSAL_PURCHASE |
    ///
    /// A redelivered event returns `Ok` with [`ProcessResult::idempotent`] set.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::InvalidTransactionType`] - Unknown type.
    /// - [`TransactionError::NegativeAmount`] - Any of the four amounts is negative.
    /// - [`TransactionError::AmountOutOfRange`] - Purchase amount outside bounds.
    /// - [`TransactionError::InvalidInput`] - Missing id, event id, key, or bad status.
    /// - [`TransactionError::DuplicateTransactionID`] - Purchase ID reused under a new key.
    /// - [`TransactionError::OriginalTransactionRequired`] - Adjustment without reference.
    /// - [`TransactionError::TransactionNotFound`] - Referenced purchase not recorded (yet).
    /// - [`TransactionError::PurchaseNotApproved`] - Referenced purchase was rejected.
    /// - [`TransactionError::ExceedsOriginalAmount`] - Adjustment exceeds remaining budget.
    /// - [`TransactionError::CurrencyMismatch`] - Adjustment currency differs from purchase.
    pub fn process(
        &self,
        command: ProcessTransactionCommand,
    ) -> Result<ProcessResult, TransactionError> {
        let result = command
            .transaction_type
            .parse::<TransactionType>()
            .and_then(|transaction_type| match transaction_type {
                TransactionType::Purchase => self.process_purchase(&command),
                TransactionType::ReversalPurchase | TransactionType::Refund => {
                    self.process_adjustment(transaction_type, &command)
                }
            });

        match &result {
            Ok(outcome) if outcome.idempotent => info!(
                transaction_id = %outcome.transaction_id,
                idempotency_key = %command.idempotency_key,
                "duplicate event, already processed"
            ),
            Ok(outcome) => debug!(
                transaction_id = %outcome.transaction_id,
                transaction_type = %command.transaction_type,
                "transaction processed"
            ),
            Err(err) => warn!(
                transaction_id = %command.transaction_id,
                transaction_type = %command.transaction_type,
                code = err.code(),
                error = %err,
                "event rejected"
            ),
        }

        result
    }

    /// Retrieves a purchase by ID.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::TransactionNotFound`] if no purchase has `id`.
    pub fn get_transaction(&self, id: &str) -> Result<Purchase, TransactionError> {
        self.repository
            .get_transaction_by_id(&TransactionId::from(id))
    }

    /// Snapshot of all recorded purchases, in no particular order.
    pub fn list_transactions(&self) -> Vec<Purchase> {
        self.repository.list_transactions()
    }

    fn replay_of(&self, key: &str) -> Option<ProcessResult> {
        self.repository
            .get_by_idempotency_key(&IdempotencyKey::from(key))
            .map(|existing| ProcessResult::replay(existing.0))
    }

    fn process_purchase(
        &self,
        command: &ProcessTransactionCommand,
    ) -> Result<ProcessResult, TransactionError> {
        if let Some(replay) = self.replay_of(&command.idempotency_key) {
            return Ok(replay);
        }

        let components = Components::build(command)?;
        let purchase = Purchase::new(
            TransactionId::from(command.transaction_id.as_str()),
            components.status,
            components.amount,
            components.merchant,
            components.event,
            components.context,
        )?;

        let id = purchase.id().clone();
        commit_outcome(self.repository.save_transaction(purchase), &id)
    }

    fn process_adjustment(
        &self,
        transaction_type: TransactionType,
        command: &ProcessTransactionCommand,
    ) -> Result<ProcessResult, TransactionError> {
        // Before any lookup, so a missing reference is not reported as not-found
        if command.original_transaction_id.is_empty() {
            return Err(TransactionError::OriginalTransactionRequired);
        }

        if let Some(replay) = self.replay_of(&command.idempotency_key) {
            return Ok(replay);
        }

        let original_id = TransactionId::from(command.original_transaction_id.as_str());
        let original = self.repository.get_transaction_by_id(&original_id)?;

        let components = Components::build(command)?;
        let adjustment = Adjustment::new(
            TransactionId::from(command.transaction_id.as_str()),
            transaction_type,
            components.status,
            components.amount,
            components.merchant,
            components.event,
            original_id.clone(),
            components.context,
        )?;

        let existing = self.repository.get_adjustments_by_transaction_id(&original_id)?;
        let existing_total = approved_total(&existing, &command.local_currency)?;
        validate_against_purchase(&adjustment, &original, &existing_total)?;

        let id = adjustment.id().clone();
        commit_outcome(self.repository.save_adjustment(adjustment), &id)
    }
}
