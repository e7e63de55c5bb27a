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

//! Adjustment admission rules.
//!
//! Pure functions: the caller supplies the running total of approved
//! adjustments, nothing here reads ledger state.

use crate::money::Money;
use crate::transaction::{Adjustment, Purchase};
use crate::TransactionError;

/// Decides whether `adjustment` may be recorded against `original`.
///
/// `existing_approved_total` is the sum of the local amounts of all
/// previously recorded approved adjustments for the purchase.
///
/// # Errors
///
/// - [`TransactionError::PurchaseNotApproved`] - `original` is not an approved purchase.
/// - [`TransactionError::ExceedsOriginalAmount`] - Approved adjustments would exceed
///   the purchase's local amount.
/// - [`TransactionError::CurrencyMismatch`] - Amounts are in different currencies.
pub fn validate_against_purchase(
    adjustment: &Adjustment,
    original: &Purchase,
    existing_approved_total: &Money,
) -> Result<(), TransactionError> {
    if !original.can_receive_adjustment() {
        return Err(TransactionError::PurchaseNotApproved);
    }

    // Rejected adjustments never consume budget
    if !adjustment.is_approved() {
        return Ok(());
    }

    // A total past i64::MAX is past any purchase amount
    let new_total = match existing_approved_total.add(&adjustment.amount().local) {
        Err(TransactionError::AmountOverflow) => return Err(TransactionError::ExceedsOriginalAmount),
        other => other?,
    };
    if new_total.greater_than(&original.amount().local)? {
        return Err(TransactionError::ExceedsOriginalAmount);
    }

    Ok(())
}

/// Sums the local amounts of the approved adjustments in `adjustments`.
///
/// # Errors
///
/// Returns [`TransactionError::CurrencyMismatch`] if an approved adjustment
/// is not in `currency`.
pub fn approved_total<'a, I>(adjustments: I, currency: &str) -> Result<Money, TransactionError>
where
    I: IntoIterator<Item = &'a Adjustment>,
{
    adjustments
        .into_iter()
        .filter(|adjustment| adjustment.is_approved())
        .try_fold(Money::zero(currency), |total, adjustment| {
            total.add(&adjustment.amount().local)
        })
}
