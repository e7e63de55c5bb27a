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

//! Primitive input and output records of the [`Engine`](crate::Engine).
//!
//! No domain types cross this boundary: transport adapters fill a
//! [`ProcessTransactionCommand`] with plain strings, integers and timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flat record describing one inbound webhook event.
///
/// Amounts are in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTransactionCommand {
    pub transaction_id: String,
    pub transaction_type: String,
    pub transaction_status: String,
    pub original_transaction_id: String,

    pub local_amount: i64,
    pub local_currency: String,
    pub transaction_amount: i64,
    pub transaction_currency: String,
    pub settlement_amount: i64,
    pub settlement_currency: String,
    pub original_amount: i64,
    pub original_currency: String,

    pub merchant_id: String,
    pub merchant_mcc: String,
    pub merchant_address: String,
    pub merchant_name: String,
    pub merchant_city: String,
    pub merchant_state: String,

    pub event_id: String,
    pub event_created_at: DateTime<Utc>,
    pub idempotency_key: String,

    pub user_id: String,
    pub card_id: String,
    pub country: String,
    pub currency: String,
    pub point_of_sale: String,
}

impl Default for ProcessTransactionCommand {
    fn default() -> Self {
        Self {
            transaction_id: String::new(),
            transaction_type: String::new(),
            transaction_status: String::new(),
            original_transaction_id: String::new(),
            local_amount: 0,
            local_currency: String::new(),
            transaction_amount: 0,
            transaction_currency: String::new(),
            settlement_amount: 0,
            settlement_currency: String::new(),
            original_amount: 0,
            original_currency: String::new(),
            merchant_id: String::new(),
            merchant_mcc: String::new(),
            merchant_address: String::new(),
            merchant_name: String::new(),
            merchant_city: String::new(),
            merchant_state: String::new(),
            event_id: String::new(),
            event_created_at: DateTime::<Utc>::UNIX_EPOCH,
            idempotency_key: String::new(),
            user_id: String::new(),
            card_id: String::new(),
            country: String::new(),
            currency: String::new(),
            point_of_sale: String::new(),
        }
    }
}

/// Outcome of a successfully processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub transaction_id: String,
    /// `true` when the event was already recorded and nothing changed.
    pub idempotent: bool,
}

impl ProcessResult {
    pub(crate) fn committed(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            idempotent: false,
        }
    }

    pub(crate) fn replay(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            idempotent: true,
        }
    }
}
