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

//! # Card Ledger
//!
//! This library records card-transaction webhook events (purchases, reversals
//! and refunds) exactly once, under concurrent, duplicated or out-of-order
//! delivery.
//!
//! ## Core Components
//!
//! - [`Engine`]: Sequences idempotency checks, validation and commit for each event
//! - [`Ledger`]: Thread-safe in-memory store behind the [`TransactionRepository`] contract
//! - [`Purchase`] / [`Adjustment`]: Immutable domain records
//! - [`Money`]: Non-negative amount in minor units, tagged with a currency
//! - [`TransactionError`]: One variant per rejection reason
//!
//! ## Example
//!
//! ```
//! use card_ledger_rs::{Engine, ProcessTransactionCommand, TransactionError};
//!
//! let engine = Engine::new();
//!
//! let purchase = ProcessTransactionCommand {
//!     transaction_id: "tx-1".to_string(),
//!     transaction_type: "PURCHASE".to_string(),
//!     transaction_status: "APPROVED".to_string(),
//!     local_amount: 10_000,
//!     local_currency: "BRL".to_string(),
//!     event_id: "evt-1".to_string(),
//!     idempotency_key: "idem-1".to_string(),
//!     ..ProcessTransactionCommand::default()
//! };
//! let result = engine.process(purchase.clone()).unwrap();
//! assert!(!result.idempotent);
//!
//! // Redelivery of the same event is a replay, not a second purchase
//! assert!(engine.process(purchase).unwrap().idempotent);
//!
//! let refund = ProcessTransactionCommand {
//!     transaction_id: "tx-2".to_string(),
//!     transaction_type: "REFUND".to_string(),
//!     transaction_status: "APPROVED".to_string(),
//!     original_transaction_id: "tx-1".to_string(),
//!     local_amount: 20_000,
//!     local_currency: "BRL".to_string(),
//!     event_id: "evt-2".to_string(),
//!     idempotency_key: "idem-2".to_string(),
//!     ..ProcessTransactionCommand::default()
//! };
//! assert_eq!(engine.process(refund), Err(TransactionError::ExceedsOriginalAmount));
//! ```
//!
//! ## Thread Safety
//!
//! [`Ledger`] keeps all state behind one read/write lock. Duplicate checks and
//! inserts happen in the same write critical section, so two concurrent
//! deliveries of one event always produce exactly one commit.

mod base;
mod command;
mod engine;
pub mod error;
pub mod http;
mod ledger;
mod money;
pub mod scenario;
mod transaction;
pub mod validation;

pub use base::{IdempotencyKey, TransactionId};
pub use command::{ProcessResult, ProcessTransactionCommand};
pub use engine::Engine;
pub use error::TransactionError;
pub use ledger::{Ledger, TransactionRepository};
pub use money::{AmountBreakdown, Money};
pub use transaction::{
    Adjustment, CardContext, Event, MAX_PURCHASE_AMOUNT, MIN_PURCHASE_AMOUNT, Merchant, Purchase,
    TransactionStatus, TransactionType,
};
