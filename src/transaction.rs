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

//! Purchases and the adjustments that reference them.
//!
//! Both are immutable once constructed. A purchase is either approved or
//! rejected; only an approved purchase can receive adjustments:
//!
//! ```text
//!  Purchase (APPROVED) ◄──original_transaction_id── Reversal / Refund (APPROVED | REJECTED)
//!  Purchase (REJECTED) ✕ no adjustments
//! ```

use crate::base::{IdempotencyKey, TransactionId};
use crate::money::AmountBreakdown;
use crate::TransactionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest accepted purchase, in minor units.
pub const MIN_PURCHASE_AMOUNT: i64 = 100;

/// Largest accepted purchase, in minor units.
pub const MAX_PURCHASE_AMOUNT: i64 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Purchase,
    ReversalPurchase,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::ReversalPurchase => "REVERSAL_PURCHASE",
            Self::Refund => "REFUND",
        }
    }

    /// Reversals and refunds are adjustments; purchases are not.
    pub fn is_adjustment(&self) -> bool {
        matches!(self, Self::ReversalPurchase | Self::Refund)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(Self::Purchase),
            "REVERSAL_PURCHASE" => Ok(Self::ReversalPurchase),
            "REFUND" => Ok(Self::Refund),
            other => Err(TransactionError::InvalidTransactionType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Approved,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(TransactionError::InvalidInput(format!(
                "status must be APPROVED or REJECTED, got: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub mcc: String,
    pub address: String,
    pub name: String,
    pub city: String,
    pub state: String,
}

/// Delivery descriptor of the webhook event that carried a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub idempotency_key: IdempotencyKey,
}

/// Cardholder and point-of-sale context, carried through unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContext {
    pub user_id: String,
    pub card_id: String,
    pub country: String,
    pub currency: String,
    pub point_of_sale: String,
}

fn require_event_identifiers(event: &Event) -> Result<(), TransactionError> {
    if event.id.is_empty() || event.idempotency_key.is_empty() {
        return Err(TransactionError::InvalidInput(
            "event id and idempotency key are required".to_string(),
        ));
    }
    Ok(())
}

/// A card purchase, the aggregate root adjustments refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchase {
    id: TransactionId,
    #[serde(rename = "type")]
    transaction_type: TransactionType,
    status: TransactionStatus,
    amount: AmountBreakdown,
    merchant: Merchant,
    event: Event,
    #[serde(flatten)]
    context: CardContext,
}

impl Purchase {
    /// Creates a purchase.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// id, event identifiers, then amount bounds.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::InvalidInput`] - Empty id, event id or idempotency key.
    /// - [`TransactionError::AmountOutOfRange`] - Local amount outside
    ///   [`MIN_PURCHASE_AMOUNT`]..=[`MAX_PURCHASE_AMOUNT`].
    pub fn new(
        id: TransactionId,
        status: TransactionStatus,
        amount: AmountBreakdown,
        merchant: Merchant,
        event: Event,
        context: CardContext,
    ) -> Result<Self, TransactionError> {
        if id.is_empty() {
            return Err(TransactionError::InvalidInput(
                "transaction id is required".to_string(),
            ));
        }
        require_event_identifiers(&event)?;
        if !(MIN_PURCHASE_AMOUNT..=MAX_PURCHASE_AMOUNT).contains(&amount.local.amount()) {
            return Err(TransactionError::AmountOutOfRange);
        }

        Ok(Self {
            id,
            transaction_type: TransactionType::Purchase,
            status,
            amount,
            merchant,
            event,
            context,
        })
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn amount(&self) -> &AmountBreakdown {
        &self.amount
    }

    pub fn merchant(&self) -> &Merchant {
        &self.merchant
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.event.idempotency_key
    }

    pub fn context(&self) -> &CardContext {
        &self.context
    }

    pub fn is_approved_purchase(&self) -> bool {
        self.transaction_type == TransactionType::Purchase
            && self.status == TransactionStatus::Approved
    }

    /// Adjustment eligibility; today the same as [`Self::is_approved_purchase`],
    /// kept separate so eligibility rules can diverge from status reporting.
    pub fn can_receive_adjustment(&self) -> bool {
        self.is_approved_purchase()
    }
}

/// A reversal or refund against a previously recorded purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    id: TransactionId,
    #[serde(rename = "type")]
    transaction_type: TransactionType,
    status: TransactionStatus,
    amount: AmountBreakdown,
    merchant: Merchant,
    event: Event,
    original_transaction_id: TransactionId,
    #[serde(flatten)]
    context: CardContext,
}

impl Adjustment {
    /// Creates an adjustment.
    ///
    /// The type and the original reference are checked before the generic
    /// id and event checks, so a missing reference is reported as such.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::InvalidTransactionType`] - Type is `PURCHASE`.
    /// - [`TransactionError::OriginalTransactionRequired`] - Empty original id.
    /// - [`TransactionError::InvalidInput`] - Empty id, event id or idempotency key.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TransactionId,
        transaction_type: TransactionType,
        status: TransactionStatus,
        amount: AmountBreakdown,
        merchant: Merchant,
        event: Event,
        original_transaction_id: TransactionId,
        context: CardContext,
    ) -> Result<Self, TransactionError> {
        if !transaction_type.is_adjustment() {
            return Err(TransactionError::InvalidTransactionType(
                transaction_type.to_string(),
            ));
        }
        if original_transaction_id.is_empty() {
            return Err(TransactionError::OriginalTransactionRequired);
        }
        if id.is_empty() {
            return Err(TransactionError::InvalidInput(
                "adjustment id is required".to_string(),
            ));
        }
        require_event_identifiers(&event)?;

        Ok(Self {
            id,
            transaction_type,
            status,
            amount,
            merchant,
            event,
            original_transaction_id,
            context,
        })
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_approved(&self) -> bool {
        self.status == TransactionStatus::Approved
    }

    pub fn amount(&self) -> &AmountBreakdown {
        &self.amount
    }

    pub fn merchant(&self) -> &Merchant {
        &self.merchant
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.event.idempotency_key
    }

    pub fn original_transaction_id(&self) -> &TransactionId {
        &self.original_transaction_id
    }

    pub fn context(&self) -> &CardContext {
        &self.context
    }
}
