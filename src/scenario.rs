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

//! Scripted webhook deliveries against a running server.
//!
//! Each [`Scenario`] is a fixed sequence of webhook payloads paired with the
//! HTTP status the server should answer with. [`ScenarioRunner`] posts them in
//! order and records what came back.
//!
//! Transaction IDs and idempotency keys are fixed per scenario, so running a
//! catalogue twice against the same server turns purchases into replays.

use chrono::{SecondsFormat, Utc};
use csv::Writer;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CURRENCY: &str = "BRL";

/// Names of all scenarios, in catalogue order.
pub const SCENARIO_NAMES: [&str; 22] = [
    "purchase_approved",
    "purchase_rejected",
    "purchase_at_min_amount",
    "purchase_at_max_amount",
    "purchase_amount_too_low",
    "purchase_amount_too_high",
    "purchase_negative_amount",
    "reversal_total",
    "reversal_partial",
    "reversal_exceeds_amount",
    "reversal_on_rejected_purchase",
    "refund_total",
    "refund_partial_single",
    "refund_partial_multiple",
    "refund_exceeds_amount",
    "refund_on_rejected_purchase",
    "multiple_adjustments_exceed",
    "reversal_after_partial_refund",
    "duplicate_event",
    "out_of_order",
    "webhook_retry",
    "missing_original_transaction_id",
];

// === Payload builders ===

fn amount_view(amount: i64) -> Value {
    json!({ "total": amount, "currency": CURRENCY })
}

/// Webhook body for a purchase; all four amount views carry `amount`.
pub fn purchase_payload(id: &str, idempotency_key: &str, status: &str, amount: i64) -> Value {
    json!({
        "id": id,
        "type": "PURCHASE",
        "status": status,
        "amount": {
            "local": amount_view(amount),
            "transaction": amount_view(amount),
            "settlement": amount_view(amount),
            "original": amount_view(amount),
        },
        "merchant": {
            "id": "merchant-001",
            "mcc": "5411",
            "name": "Test Store",
            "city": "São Paulo",
            "state": "SP",
        },
        "event": {
            "id": format!("evt-{id}"),
            "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "idempotency_key": idempotency_key,
        },
        "user_id": "user-001",
        "card_id": "card-001",
        "country": "BR",
        "currency": CURRENCY,
        "point_of_sale": "ONLINE",
    })
}

/// Webhook body for a reversal or refund of `original_id`.
pub fn adjustment_payload(
    id: &str,
    transaction_type: &str,
    idempotency_key: &str,
    original_id: &str,
    status: &str,
    amount: i64,
) -> Value {
    let mut payload = purchase_payload(id, idempotency_key, status, amount);
    payload["type"] = json!(transaction_type);
    payload["original_transaction_id"] = json!(original_id);
    payload
}

// === Catalogue ===

/// One delivery within a scenario.
#[derive(Debug, Clone)]
pub struct Step {
    pub description: String,
    pub payload: Value,
    pub expected_status: u16,
}

impl Step {
    fn new(description: &str, payload: Value, expected_status: u16) -> Self {
        Self {
            description: description.to_string(),
            payload,
            expected_status,
        }
    }
}

/// Named, ordered list of deliveries.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// The full catalogue, in [`SCENARIO_NAMES`] order.
    pub fn all() -> Vec<Scenario> {
        SCENARIO_NAMES
            .iter()
            .filter_map(|name| Scenario::by_name(name))
            .collect()
    }

    /// Builds the named scenario, or `None` if there is no such scenario.
    pub fn by_name(name: &str) -> Option<Scenario> {
        let name = SCENARIO_NAMES.iter().copied().find(|known| *known == name)?;
        let steps = steps_for(name);
        Some(Scenario { name, steps })
    }
}

fn single_purchase(description: &str, tag: &str, status: &str, amount: i64, expected: u16) -> Vec<Step> {
    vec![Step::new(
        description,
        purchase_payload(&format!("tx-{tag}-001"), &format!("idem-{tag}-001"), status, amount),
        expected,
    )]
}

/// Purchase of `purchase_amount` followed by adjustments `(type, amount, expected)`.
fn purchase_then(
    tag: &str,
    purchase_status: &str,
    purchase_amount: i64,
    adjustments: &[(&str, &str, i64, u16)],
) -> Vec<Step> {
    let original_id = format!("tx-{tag}-001");
    let mut steps = vec![Step::new(
        &format!("POST PURCHASE {purchase_status} ({purchase_amount})"),
        purchase_payload(
            &original_id,
            &format!("idem-{tag}-001"),
            purchase_status,
            purchase_amount,
        ),
        200,
    )];

    for (n, (description, transaction_type, amount, expected)) in adjustments.iter().enumerate() {
        let seq = n + 2;
        steps.push(Step::new(
            description,
            adjustment_payload(
                &format!("tx-{tag}-{seq:03}"),
                transaction_type,
                &format!("idem-{tag}-{seq:03}"),
                &original_id,
                "APPROVED",
                *amount,
            ),
            *expected,
        ));
    }

    steps
}

fn steps_for(name: &str) -> Vec<Step> {
    match name {
        "purchase_approved" => {
            single_purchase("POST PURCHASE APPROVED (10000)", "pa", "APPROVED", 10_000, 200)
        }
        "purchase_rejected" => {
            single_purchase("POST PURCHASE REJECTED (10000)", "pr", "REJECTED", 10_000, 200)
        }
        "purchase_at_min_amount" => single_purchase(
            "POST PURCHASE at minimum amount (100) -> expect 200",
            "pmin",
            "APPROVED",
            100,
            200,
        ),
        "purchase_at_max_amount" => single_purchase(
            "POST PURCHASE at maximum amount (500000) -> expect 200",
            "pmax",
            "APPROVED",
            500_000,
            200,
        ),
        "purchase_amount_too_low" => single_purchase(
            "POST PURCHASE below minimum (50) -> expect 422",
            "plow",
            "APPROVED",
            50,
            422,
        ),
        "purchase_amount_too_high" => single_purchase(
            "POST PURCHASE above maximum (600000) -> expect 422",
            "phigh",
            "APPROVED",
            600_000,
            422,
        ),
        "purchase_negative_amount" => single_purchase(
            "POST PURCHASE with negative amount -> expect 400",
            "pneg",
            "APPROVED",
            -100,
            400,
        ),
        "reversal_total" => purchase_then(
            "rt",
            "APPROVED",
            10_000,
            &[("POST REVERSAL_PURCHASE total (10000) -> expect 200", "REVERSAL_PURCHASE", 10_000, 200)],
        ),
        "reversal_partial" => purchase_then(
            "rp",
            "APPROVED",
            10_000,
            &[("POST REVERSAL_PURCHASE partial (5000) -> expect 200", "REVERSAL_PURCHASE", 5_000, 200)],
        ),
        "reversal_exceeds_amount" => purchase_then(
            "rea",
            "APPROVED",
            10_000,
            &[("POST REVERSAL_PURCHASE exceeding original (15000) -> expect 409", "REVERSAL_PURCHASE", 15_000, 409)],
        ),
        "reversal_on_rejected_purchase" => purchase_then(
            "rorp",
            "REJECTED",
            10_000,
            &[("POST REVERSAL_PURCHASE on rejected purchase -> expect 409", "REVERSAL_PURCHASE", 10_000, 409)],
        ),
        "refund_total" => purchase_then(
            "rft",
            "APPROVED",
            10_000,
            &[("POST REFUND total (10000) -> expect 200", "REFUND", 10_000, 200)],
        ),
        "refund_partial_single" => purchase_then(
            "rfps",
            "APPROVED",
            10_000,
            &[("POST REFUND partial (4000) -> expect 200", "REFUND", 4_000, 200)],
        ),
        "refund_partial_multiple" => purchase_then(
            "rfpm",
            "APPROVED",
            30_000,
            &[
                ("POST REFUND #1 partial (15000) -> expect 200", "REFUND", 15_000, 200),
                ("POST REFUND #2 partial (15000) completing full refund -> expect 200", "REFUND", 15_000, 200),
            ],
        ),
        "refund_exceeds_amount" => purchase_then(
            "rfea",
            "APPROVED",
            10_000,
            &[("POST REFUND exceeding original (15000) -> expect 409", "REFUND", 15_000, 409)],
        ),
        "refund_on_rejected_purchase" => purchase_then(
            "rforp",
            "REJECTED",
            10_000,
            &[("POST REFUND on rejected purchase -> expect 409", "REFUND", 10_000, 409)],
        ),
        "multiple_adjustments_exceed" => purchase_then(
            "mae",
            "APPROVED",
            10_000,
            &[
                ("POST REFUND #1 (6000) -> expect 200", "REFUND", 6_000, 200),
                ("POST REFUND #2 (6000, cumulative 12000 > 10000) -> expect 409", "REFUND", 6_000, 409),
            ],
        ),
        "reversal_after_partial_refund" => purchase_then(
            "rapf",
            "APPROVED",
            10_000,
            &[
                ("POST REFUND partial (6000) -> expect 200", "REFUND", 6_000, 200),
                ("POST REVERSAL_PURCHASE total (10000, cumulative 16000 > 10000) -> expect 409", "REVERSAL_PURCHASE", 10_000, 409),
            ],
        ),
        "duplicate_event" | "webhook_retry" => {
            let tag = if name == "duplicate_event" { "de" } else { "wr" };
            let id = format!("tx-{tag}-001");
            let key = format!("idem-{tag}-001");
            vec![
                Step::new(
                    "POST PURCHASE APPROVED (first delivery) -> expect 200",
                    purchase_payload(&id, &key, "APPROVED", 10_000),
                    200,
                ),
                Step::new(
                    "POST PURCHASE again (same idempotency_key) -> expect 200 idempotent=true",
                    purchase_payload(&id, &key, "APPROVED", 10_000),
                    200,
                ),
            ]
        }
        "out_of_order" => vec![
            Step::new(
                "POST REFUND before original PURCHASE -> expect 404",
                adjustment_payload("tx-ooo-002", "REFUND", "idem-ooo-002", "tx-ooo-001", "APPROVED", 5_000),
                404,
            ),
            Step::new(
                "POST PURCHASE APPROVED (original arrives late) -> expect 200",
                purchase_payload("tx-ooo-001", "idem-ooo-001", "APPROVED", 10_000),
                200,
            ),
            Step::new(
                "POST REFUND retry under a new key -> expect 200",
                adjustment_payload("tx-ooo-002", "REFUND", "idem-ooo-003", "tx-ooo-001", "APPROVED", 5_000),
                200,
            ),
        ],
        "missing_original_transaction_id" => vec![Step::new(
            "POST REFUND without original_transaction_id -> expect 400",
            adjustment_payload("tx-moti-001", "REFUND", "idem-moti-001", "", "APPROVED", 5_000),
            400,
        )],
        _ => Vec::new(),
    }
}

// === Results ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: usize,
    pub description: String,
    pub request_body: Value,
    /// `0` when the request never got a response.
    pub response_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    pub expected_status: u16,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: String,
    pub steps: Vec<StepResult>,
    pub success: bool,
    pub summary: String,
}

impl ScenarioResult {
    pub fn from_steps(scenario: &str, steps: Vec<StepResult>) -> Self {
        let passed = steps.iter().filter(|step| step.passed).count();
        Self {
            scenario: scenario.to_string(),
            success: passed == steps.len(),
            summary: format!("{passed}/{} steps passed", steps.len()),
            steps,
        }
    }
}

// === Runner ===

/// Posts scenario steps to `{base_url}/webhook/transactions`.
pub struct ScenarioRunner {
    client: Client,
    endpoint: String,
}

impl ScenarioRunner {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/webhook/transactions", base_url.trim_end_matches('/')),
        })
    }

    /// Runs every step in order. A transport failure fails that step and the
    /// run continues.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioResult {
        let mut results = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let (response_status, response_body) = match self.post(&step.payload).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(scenario = scenario.name, step = index + 1, error = %err, "request failed");
                    (0, Some(json!({ "error": err.to_string() })))
                }
            };
            debug!(
                scenario = scenario.name,
                step = index + 1,
                status = response_status,
                expected = step.expected_status,
                "step finished"
            );

            results.push(StepResult {
                step: index + 1,
                description: step.description.clone(),
                request_body: step.payload.clone(),
                response_status,
                response_body,
                expected_status: step.expected_status,
                passed: response_status == step.expected_status,
            });
        }

        ScenarioResult::from_steps(scenario.name, results)
    }

    async fn post(&self, payload: &Value) -> Result<(u16, Option<Value>), reqwest::Error> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status().as_u16();
        // Non-JSON bodies are recorded as absent
        let body = response.json::<Value>().await.ok();
        Ok((status, body))
    }
}

// === Reporting ===

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    scenario: &'a str,
    step: usize,
    description: &'a str,
    expected: u16,
    actual: u16,
    passed: bool,
}

/// Writes one CSV row per step.
///
/// Columns: `scenario, step, description, expected, actual, passed`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_csv<W: Write>(results: &[ScenarioResult], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for result in results {
        for step in &result.steps {
            wtr.serialize(CsvRow {
                scenario: &result.scenario,
                step: step.step,
                description: &step.description,
                expected: step.expected_status,
                actual: step.response_status,
                passed: step.passed,
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_is_complete() {
        let all = Scenario::all();
        assert_eq!(all.len(), SCENARIO_NAMES.len());
        for (scenario, name) in all.iter().zip(SCENARIO_NAMES) {
            assert_eq!(scenario.name, name);
            assert!(!scenario.steps.is_empty(), "{name} has no steps");
        }
    }

    #[test]
    fn unknown_scenario() {
        assert!(Scenario::by_name("does_not_exist").is_none());
    }

    #[test]
    fn purchase_payload_shape() {
        let payload = purchase_payload("tx-1", "idem-1", "APPROVED", 2_500);
        assert_eq!(payload["type"], "PURCHASE");
        assert_eq!(payload["event"]["id"], "evt-tx-1");
        assert_eq!(payload["event"]["idempotency_key"], "idem-1");
        for view in ["local", "transaction", "settlement", "original"] {
            assert_eq!(payload["amount"][view]["total"], 2_500);
            assert_eq!(payload["amount"][view]["currency"], "BRL");
        }
        assert!(payload.get("original_transaction_id").is_none());
    }

    #[test]
    fn adjustment_references_original() {
        let payload = adjustment_payload("tx-2", "REFUND", "idem-2", "tx-1", "APPROVED", 500);
        assert_eq!(payload["type"], "REFUND");
        assert_eq!(payload["original_transaction_id"], "tx-1");
    }

    #[test]
    fn refund_partial_multiple_steps() {
        let scenario = Scenario::by_name("refund_partial_multiple").unwrap();
        let expected: Vec<u16> = scenario.steps.iter().map(|s| s.expected_status).collect();
        assert_eq!(expected, vec![200, 200, 200]);
        assert_eq!(scenario.steps[0].payload["amount"]["local"]["total"], 30_000);
        assert_eq!(scenario.steps[2].payload["id"], "tx-rfpm-003");
        assert_eq!(scenario.steps[2].payload["original_transaction_id"], "tx-rfpm-001");
    }

    #[test]
    fn out_of_order_retries_with_new_key() {
        let scenario = Scenario::by_name("out_of_order").unwrap();
        let expected: Vec<u16> = scenario.steps.iter().map(|s| s.expected_status).collect();
        assert_eq!(expected, vec![404, 200, 200]);
        assert_eq!(scenario.steps[0].payload["id"], scenario.steps[2].payload["id"]);
        assert_ne!(
            scenario.steps[0].payload["event"]["idempotency_key"],
            scenario.steps[2].payload["event"]["idempotency_key"]
        );
    }

    #[test]
    fn summary_counts_passed_steps() {
        let step = |passed| StepResult {
            step: 1,
            description: String::new(),
            request_body: Value::Null,
            response_status: 200,
            response_body: None,
            expected_status: 200,
            passed,
        };
        let result = ScenarioResult::from_steps("x", vec![step(true), step(false), step(true)]);
        assert!(!result.success);
        assert_eq!(result.summary, "2/3 steps passed");

        let empty = ScenarioResult::from_steps("y", Vec::new());
        assert!(empty.success);
        assert_eq!(empty.summary, "0/0 steps passed");
    }

    #[test]
    fn csv_report_has_header_and_rows() {
        let result = ScenarioResult::from_steps(
            "purchase_approved",
            vec![StepResult {
                step: 1,
                description: "POST PURCHASE".to_string(),
                request_body: Value::Null,
                response_status: 200,
                response_body: None,
                expected_status: 200,
                passed: true,
            }],
        );

        let mut output = Vec::new();
        write_csv(&[result], &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("scenario,step,description,expected,actual,passed"));
        assert_eq!(lines.next(), Some("purchase_approved,1,POST PURCHASE,200,200,true"));
    }
}
