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

//! Error types for webhook event processing.

use crate::base::TransactionId;
use thiserror::Error;

/// Transaction processing errors.
///
/// Every condition is its own variant so callers can branch on the kind
/// without inspecting the message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Money was constructed with a negative amount
    #[error("amount cannot be negative")]
    NegativeAmount,

    /// Arithmetic or comparison between two different currencies
    #[error("currency mismatch: {expected} vs {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// Purchase local amount outside the accepted bounds
    #[error("purchase amount must be between 100 and 500000 minor units")]
    AmountOutOfRange,

    /// Type is not valid for the requested operation
    #[error("invalid transaction type: {0}")]
    InvalidTransactionType(String),

    /// Reversal or refund without a reference to its purchase
    #[error("reversal/refund must reference an original transaction")]
    OriginalTransactionRequired,

    /// A required field is missing or malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The idempotency key was already recorded for the given transaction
    #[error("duplicate idempotency key")]
    DuplicateIdempotencyKey(TransactionId),

    /// The transaction ID was already recorded under a different event
    #[error("transaction ID already exists with a different event")]
    DuplicateTransactionID,

    /// Referenced transaction ID does not exist
    #[error("transaction not found")]
    TransactionNotFound,

    /// Adjustment targets a purchase that is not approved
    #[error("adjustment target must be an approved purchase")]
    PurchaseNotApproved,

    /// Sum of two amounts does not fit in an `i64`
    #[error("amount overflow")]
    AmountOverflow,

    /// Approved adjustments would exceed the purchase amount
    #[error("total adjustments exceed original purchase amount")]
    ExceedsOriginalAmount,
}

impl TransactionError {
    /// Stable machine-readable code for this condition.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::AmountOutOfRange => "AMOUNT_OUT_OF_RANGE",
            Self::InvalidTransactionType(_) => "INVALID_TRANSACTION_TYPE",
            Self::OriginalTransactionRequired => "ORIGINAL_TRANSACTION_REQUIRED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::DuplicateIdempotencyKey(_) => "DUPLICATE_IDEMPOTENCY_KEY",
            Self::DuplicateTransactionID => "DUPLICATE_TRANSACTION_ID",
            Self::TransactionNotFound => "NOT_FOUND",
            Self::PurchaseNotApproved => "PURCHASE_NOT_APPROVED",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::ExceedsOriginalAmount => "EXCEEDS_ORIGINAL_AMOUNT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TransactionError;
    use crate::base::TransactionId;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            TransactionError::NegativeAmount.to_string(),
            "amount cannot be negative"
        );
        assert_eq!(
            TransactionError::CurrencyMismatch {
                expected: "BRL".to_string(),
                found: "USD".to_string(),
            }
            .to_string(),
            "currency mismatch: BRL vs USD"
        );
        assert_eq!(
            TransactionError::InvalidTransactionType("PURCHASE".to_string()).to_string(),
            "invalid transaction type: PURCHASE"
        );
        assert_eq!(
            TransactionError::InvalidInput("transaction id is required".to_string()).to_string(),
            "invalid input: transaction id is required"
        );
        assert_eq!(TransactionError::TransactionNotFound.to_string(), "transaction not found");
        assert_eq!(
            TransactionError::ExceedsOriginalAmount.to_string(),
            "total adjustments exceed original purchase amount"
        );
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            TransactionError::NegativeAmount,
            TransactionError::CurrencyMismatch {
                expected: "BRL".to_string(),
                found: "USD".to_string(),
            },
            TransactionError::AmountOutOfRange,
            TransactionError::InvalidTransactionType("X".to_string()),
            TransactionError::OriginalTransactionRequired,
            TransactionError::InvalidInput("x".to_string()),
            TransactionError::DuplicateIdempotencyKey(TransactionId::from("tx1")),
            TransactionError::DuplicateTransactionID,
            TransactionError::TransactionNotFound,
            TransactionError::PurchaseNotApproved,
            TransactionError::AmountOverflow,
            TransactionError::ExceedsOriginalAmount,
        ];

        let mut codes: Vec<&str> = errors.iter().map(TransactionError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn errors_are_cloneable() {
        let error = TransactionError::DuplicateIdempotencyKey(TransactionId::from("tx1"));
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
