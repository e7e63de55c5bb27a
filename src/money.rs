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

//! Monetary amounts in integral minor units.
//!
//! # Example
//!
//! ```
//! use card_ledger_rs::Money;
//!
//! let a = Money::new(100, "BRL").unwrap();
//! let b = Money::new(50, "BRL").unwrap();
//! assert_eq!(a.add(&b).unwrap().amount(), 150);
//! assert!(a.add(&Money::new(50, "USD").unwrap()).is_err());
//! ```

use crate::TransactionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-negative amount tagged with a currency code.
///
/// Arithmetic and comparison are only defined between equal currency codes
/// (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MoneyRecord")]
pub struct Money {
    amount: i64,
    currency: String,
}

/// Wire shape of [`Money`]; deserialization goes through [`Money::new`].
#[derive(Deserialize)]
struct MoneyRecord {
    amount: i64,
    currency: String,
}

impl TryFrom<MoneyRecord> for Money {
    type Error = TransactionError;

    fn try_from(record: MoneyRecord) -> Result<Self, Self::Error> {
        Money::new(record.amount, record.currency)
    }
}

impl Money {
    /// Creates a new amount.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NegativeAmount`] if `amount < 0`.
    pub fn new(amount: i64, currency: impl Into<String>) -> Result<Self, TransactionError> {
        if amount < 0 {
            return Err(TransactionError::NegativeAmount);
        }
        Ok(Self {
            amount,
            currency: currency.into(),
        })
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            amount: 0,
            currency: currency.into(),
        }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Sums two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::CurrencyMismatch`] - The currencies differ.
    /// - [`TransactionError::AmountOverflow`] - The sum does not fit in an `i64`.
    pub fn add(&self, other: &Money) -> Result<Money, TransactionError> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(TransactionError::AmountOverflow)?;
        Ok(Money {
            amount,
            currency: self.currency.clone(),
        })
    }

    /// Returns `true` if `self` is strictly greater than `other`.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::CurrencyMismatch`] if the currencies differ.
    pub fn greater_than(&self, other: &Money) -> Result<bool, TransactionError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount > other.amount)
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), TransactionError> {
        if self.currency != other.currency {
            return Err(TransactionError::CurrencyMismatch {
                expected: self.currency.clone(),
                found: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// The four currency views a processor reports for one event.
///
/// Only `local` takes part in validation; the others are carried through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBreakdown {
    pub local: Money,
    pub transaction: Money,
    pub settlement: Money,
    pub original: Money,
}

impl AmountBreakdown {
    /// Breakdown with the same amount in all four views.
    pub fn uniform(money: Money) -> Self {
        Self {
            local: money.clone(),
            transaction: money.clone(),
            settlement: money.clone(),
            original: money,
        }
    }
}
