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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! The dev-dependency enables `deadlock_detection`, which also applies to the
//! ledger's own `RwLock`, so these tests drive the real engine rather than
//! a mirror of its locking.

use card_ledger_rs::{Engine, ProcessTransactionCommand, TransactionId, TransactionRepository};
use chrono::Utc;
use parking_lot::deadlock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn event(kind: &str, id: &str, key: &str, original: &str, amount: i64) -> ProcessTransactionCommand {
    ProcessTransactionCommand {
        transaction_id: id.to_string(),
        transaction_type: kind.to_string(),
        transaction_status: "APPROVED".to_string(),
        original_transaction_id: original.to_string(),
        local_amount: amount,
        local_currency: "BRL".to_string(),
        event_id: format!("evt-{key}"),
        event_created_at: Utc::now(),
        idempotency_key: key.to_string(),
        ..ProcessTransactionCommand::default()
    }
}

// === Deadlock Detector ===

fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    // Let the detector run one last check
    thread::sleep(Duration::from_millis(150));
}

// === Tests ===

/// Many threads adjusting the same purchase.
#[test]
fn no_deadlock_high_contention_single_purchase() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(Engine::new());
    engine
        .process(event("PURCHASE", "tx1", "k-p", "", 500_000))
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("r-{t}-{i}");
                    let _ = engine.process(event("REFUND", &id, &format!("k-{id}"), "tx1", 400));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    stop_deadlock_detector(detector);

    let adjustments = engine
        .repository()
        .get_adjustments_by_transaction_id(&TransactionId::from("tx1"))
        .unwrap();
    let total: i64 = adjustments.iter().map(|a| a.amount().local.amount()).sum();
    assert!(total <= 500_000);
    assert_eq!(adjustments.len(), 1_250);
}

/// Listing and point reads while purchases and adjustments are written.
#[test]
fn no_deadlock_iteration_during_mutation() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(Engine::new());
    let done = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..200 {
                    let id = format!("p-{t}-{i}");
                    engine
                        .process(event("PURCHASE", &id, &format!("k-{id}"), "", 1_000))
                        .unwrap();
                    let refund = format!("r-{t}-{i}");
                    engine
                        .process(event("REFUND", &refund, &format!("k-{refund}"), &id, 500))
                        .unwrap();
                }
            })
        })
        .collect();

    let reads = Arc::new(AtomicUsize::new(0));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    for purchase in engine.list_transactions().iter().take(10) {
                        engine.get_transaction(purchase.id().as_str()).unwrap();
                        engine
                            .repository()
                            .get_adjustments_by_transaction_id(purchase.id())
                            .unwrap();
                    }
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in writers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    for handle in readers {
        handle.join().unwrap();
    }
    stop_deadlock_detector(detector);

    assert_eq!(engine.list_transactions().len(), 800);
    assert_eq!(engine.repository().adjustment_count(), 800);
    assert!(reads.load(Ordering::Relaxed) > 0);
}

/// Redeliveries racing first deliveries on overlapping keys.
#[test]
fn no_deadlock_duplicate_deliveries() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(Engine::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("tx-{i}");
                    let result = engine
                        .process(event("PURCHASE", &id, &format!("k-{id}"), "", 2_000))
                        .unwrap();
                    assert_eq!(result.transaction_id, id);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    stop_deadlock_detector(detector);

    assert_eq!(engine.list_transactions().len(), 100);
}

/// Mixed purchases, adjustments, failures and reads.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(Engine::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..100 {
                    let target = format!("m-{}", (t + i) % 20);
                    match i % 4 {
                        0 => {
                            let _ = engine.process(event("PURCHASE", &target, &format!("k-{target}"), "", 10_000));
                        }
                        1 => {
                            let id = format!("rv-{t}-{i}");
                            let _ = engine.process(event("REVERSAL_PURCHASE", &id, &format!("k-{id}"), &target, 3_000));
                        }
                        2 => {
                            let _ = engine.get_transaction(&target);
                        }
                        _ => {
                            let _ = engine.list_transactions();
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    stop_deadlock_detector(detector);

    for purchase in engine.list_transactions() {
        let total: i64 = engine
            .repository()
            .get_adjustments_by_transaction_id(purchase.id())
            .unwrap()
            .iter()
            .map(|a| a.amount().local.amount())
            .sum();
        assert!(total <= purchase.amount().local.amount());
    }
}
