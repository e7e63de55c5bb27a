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

//! HTTP adapter for the webhook engine.
//!
//! ## Endpoints
//!
//! - `POST /webhook/transactions` - Receive a purchase, reversal or refund event
//! - `GET /transactions` - List all purchases
//! - `GET /transactions/{id}` - Get a purchase by ID
//! - `GET /health` - Liveness probe
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST http://localhost:8080/webhook/transactions \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": "tx-1", "type": "PURCHASE", "status": "APPROVED",
//!        "amount": {"local": {"total": 10000, "currency": "BRL"}},
//!        "event": {"id": "evt-1", "created_at": "2025-01-01T00:00:00Z",
//!                  "idempotency_key": "idem-1"}}'
//!
//! curl http://localhost:8080/transactions/tx-1
//! ```

use crate::{Engine, ProcessResult, ProcessTransactionCommand, TransactionError};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// === Request/Response DTOs ===

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountView {
    pub total: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountRequest {
    pub local: AmountView,
    pub transaction: AmountView,
    pub settlement: AmountView,
    pub original: AmountView,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantRequest {
    pub id: String,
    pub mcc: String,
    pub address: String,
    pub name: String,
    pub city: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRequest {
    pub id: String,
    pub created_at: String,
    pub idempotency_key: String,
}

/// Webhook payload as sent by the card processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub status: String,
    pub amount: AmountRequest,
    pub merchant: MerchantRequest,
    pub event: EventRequest,
    pub original_transaction_id: String,
    pub user_id: String,
    pub card_id: String,
    pub country: String,
    pub currency: String,
    pub point_of_sale: String,
}

impl WebhookRequest {
    /// Converts the payload into an engine command.
    ///
    /// Rejects payloads missing the fields every event needs; domain rules
    /// are left to the engine.
    pub fn into_command(self) -> Result<ProcessTransactionCommand, String> {
        if self.id.is_empty() {
            return Err("id is required".to_string());
        }
        if self.transaction_type.is_empty() {
            return Err("type is required".to_string());
        }
        if self.event.id.is_empty() {
            return Err("event.id is required".to_string());
        }
        if self.event.idempotency_key.is_empty() {
            return Err("event.idempotency_key is required".to_string());
        }
        if self.status != "APPROVED" && self.status != "REJECTED" {
            return Err(format!(
                "status must be APPROVED or REJECTED, got: {:?}",
                self.status
            ));
        }

        let created_at = DateTime::parse_from_rfc3339(&self.event.created_at)
            .map_err(|e| format!("event.created_at must be RFC3339: {e}"))?
            .with_timezone(&Utc);

        Ok(ProcessTransactionCommand {
            transaction_id: self.id,
            transaction_type: self.transaction_type,
            transaction_status: self.status,
            original_transaction_id: self.original_transaction_id,
            local_amount: self.amount.local.total,
            local_currency: self.amount.local.currency,
            transaction_amount: self.amount.transaction.total,
            transaction_currency: self.amount.transaction.currency,
            settlement_amount: self.amount.settlement.total,
            settlement_currency: self.amount.settlement.currency,
            original_amount: self.amount.original.total,
            original_currency: self.amount.original.currency,
            merchant_id: self.merchant.id,
            merchant_mcc: self.merchant.mcc,
            merchant_address: self.merchant.address,
            merchant_name: self.merchant.name,
            merchant_city: self.merchant.city,
            merchant_state: self.merchant.state,
            event_id: self.event.id,
            event_created_at: created_at,
            idempotency_key: self.event.idempotency_key,
            user_id: self.user_id,
            card_id: self.card_id,
            country: self.country,
            currency: self.currency,
            point_of_sale: self.point_of_sale,
        })
    }
}

/// Response body for accepted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub transaction_id: String,
    pub idempotent: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl From<ProcessResult> for WebhookResponse {
    fn from(result: ProcessResult) -> Self {
        let message = if result.idempotent {
            "duplicate event, already processed"
        } else {
            "transaction processed"
        };
        Self {
            transaction_id: result.transaction_id,
            idempotent: result.idempotent,
            message: message.to_string(),
        }
    }
}

/// Response body for errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the webhook engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

// === Error Handling ===

/// Failures surfaced by the HTTP layer.
#[derive(Debug)]
pub enum AppError {
    /// Body is not valid JSON for a webhook.
    BadRequest(String),
    /// Body parsed but lacks required fields.
    Validation(String),
    Transaction(TransactionError),
}

impl From<TransactionError> for AppError {
    fn from(err: TransactionError) -> Self {
        AppError::Transaction(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// HTTP status for an engine error.
pub fn status_for(err: &TransactionError) -> StatusCode {
    match err {
        TransactionError::DuplicateIdempotencyKey(_) => StatusCode::OK,
        TransactionError::TransactionNotFound => StatusCode::NOT_FOUND,
        TransactionError::ExceedsOriginalAmount
        | TransactionError::PurchaseNotApproved
        | TransactionError::DuplicateTransactionID => StatusCode::CONFLICT,
        TransactionError::AmountOutOfRange | TransactionError::AmountOverflow => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TransactionError::NegativeAmount
        | TransactionError::OriginalTransactionRequired
        | TransactionError::CurrencyMismatch { .. }
        | TransactionError::InvalidTransactionType(_)
        | TransactionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
    }
}

fn error_response(status: StatusCode, error: String, code: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => {
                error_response(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
            }
            AppError::Validation(message) => {
                error_response(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
            }
            AppError::Transaction(TransactionError::DuplicateIdempotencyKey(existing)) => {
                Json(WebhookResponse::from(ProcessResult {
                    transaction_id: existing.0,
                    idempotent: true,
                }))
                .into_response()
            }
            AppError::Transaction(err) => error_response(status_for(&err), err.to_string(), err.code()),
        }
    }
}

// === Handlers ===

/// POST /webhook/transactions - Process a webhook event.
async fn receive_webhook(
    State(state): State<AppState>,
    payload: Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<Json<WebhookResponse>, AppError> {
    let Json(request) = payload?;
    let command = request.into_command().map_err(AppError::Validation)?;
    let result = state.engine.process(command)?;
    Ok(Json(WebhookResponse::from(result)))
}

/// GET /transactions/{id} - Get a purchase by ID.
async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let purchase = state.engine.get_transaction(&id)?;
    Ok(Json(purchase).into_response())
}

/// GET /transactions - List all purchases.
async fn list_transactions(State(state): State<AppState>) -> Response {
    Json(state.engine.list_transactions()).into_response()
}

/// GET /health - Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// === Router ===

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/transactions", post(receive_webhook))
        .route("/transactions", get(list_transactions))
        .route("/transactions/{id}", get(get_transaction))
        .route("/health", get(health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> WebhookRequest {
        WebhookRequest {
            id: "tx-1".to_string(),
            transaction_type: "PURCHASE".to_string(),
            status: "APPROVED".to_string(),
            event: EventRequest {
                id: "evt-1".to_string(),
                created_at: "2025-03-01T12:00:00Z".to_string(),
                idempotency_key: "idem-1".to_string(),
            },
            ..WebhookRequest::default()
        }
    }

    #[test]
    fn converts_valid_payload() {
        let mut req = request();
        req.amount.local = AmountView {
            total: 10_000,
            currency: "BRL".to_string(),
        };
        req.original_transaction_id = "tx-0".to_string();

        let command = req.into_command().unwrap();
        assert_eq!(command.transaction_id, "tx-1");
        assert_eq!(command.local_amount, 10_000);
        assert_eq!(command.local_currency, "BRL");
        assert_eq!(command.original_transaction_id, "tx-0");
        assert_eq!(command.event_created_at.to_rfc3339(), "2025-03-01T12:00:00+00:00");
    }

    #[test]
    fn rejects_missing_required_fields() {
        let mut no_id = request();
        no_id.id.clear();
        assert_eq!(no_id.into_command().unwrap_err(), "id is required");

        let mut no_type = request();
        no_type.transaction_type.clear();
        assert_eq!(no_type.into_command().unwrap_err(), "type is required");

        let mut no_key = request();
        no_key.event.idempotency_key.clear();
        assert_eq!(
            no_key.into_command().unwrap_err(),
            "event.idempotency_key is required"
        );
    }

    #[test]
    fn rejects_unknown_status_and_bad_timestamp() {
        let mut bad_status = request();
        bad_status.status = "PENDING".to_string();
        assert!(bad_status.into_command().unwrap_err().starts_with("status must be"));

        let mut bad_time = request();
        bad_time.event.created_at = "yesterday".to_string();
        assert!(
            bad_time
                .into_command()
                .unwrap_err()
                .starts_with("event.created_at must be RFC3339")
        );
    }

    #[test]
    fn payload_fields_default_when_absent() {
        let req: WebhookRequest = serde_json::from_str(r#"{"id": "tx-1", "type": "REFUND"}"#).unwrap();
        assert_eq!(req.transaction_type, "REFUND");
        assert!(req.original_transaction_id.is_empty());
        assert_eq!(req.amount.local.total, 0);
    }

    #[test]
    fn error_status_codes() {
        assert_eq!(status_for(&TransactionError::TransactionNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&TransactionError::ExceedsOriginalAmount), StatusCode::CONFLICT);
        assert_eq!(status_for(&TransactionError::PurchaseNotApproved), StatusCode::CONFLICT);
        assert_eq!(status_for(&TransactionError::DuplicateTransactionID), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&TransactionError::AmountOutOfRange),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&TransactionError::NegativeAmount), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&TransactionError::OriginalTransactionRequired),
            StatusCode::BAD_REQUEST
        );
    }
}
