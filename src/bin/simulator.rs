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

use card_ledger_rs::scenario::{SCENARIO_NAMES, Scenario, ScenarioRunner, write_csv};
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

/// Webhook scenario simulator
///
/// Replays scripted webhook deliveries against a running server and checks
/// each response status.
#[derive(Parser, Debug)]
#[command(name = "card-ledger-simulator")]
#[command(about = "Runs webhook scenarios against a server", long_about = None)]
struct Args {
    /// Server base URL
    #[arg(long, env = "WEBHOOK_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// List available scenarios and exit
    #[arg(long)]
    list: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Scenarios to run (default: all)
    #[arg(value_name = "SCENARIO")]
    scenarios: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr so the report on stdout stays parseable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if args.list {
        for name in SCENARIO_NAMES {
            println!("{name}");
        }
        return;
    }

    let scenarios = if args.scenarios.is_empty() {
        Scenario::all()
    } else {
        let mut selected = Vec::with_capacity(args.scenarios.len());
        for name in &args.scenarios {
            match Scenario::by_name(name) {
                Some(scenario) => selected.push(scenario),
                None => {
                    eprintln!("Unknown scenario: {name}");
                    process::exit(1);
                }
            }
        }
        selected
    };

    let runner = match ScenarioRunner::new(&args.base_url) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error creating HTTP client: {}", e);
            process::exit(1);
        }
    };

    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in &scenarios {
        let result = runner.run(scenario).await;
        eprintln!("{}: {}", result.scenario, result.summary);
        results.push(result);
    }

    let written = match args.format {
        OutputFormat::Json => serde_json::to_writer_pretty(io::stdout(), &results)
            .map_err(|e| e.to_string())
            .and_then(|()| writeln!(io::stdout()).map_err(|e| e.to_string())),
        OutputFormat::Csv => write_csv(&results, io::stdout()).map_err(|e| e.to_string()),
    };
    if let Err(e) = written {
        eprintln!("Error writing report: {}", e);
        process::exit(1);
    }

    if results.iter().any(|result| !result.success) {
        process::exit(1);
    }
}
