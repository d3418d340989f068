/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Outcome-recording tests: idempotent processed marking, retry
//! bookkeeping, and the terminal-state invariants.

use std::time::Duration;

use serial_test::serial;

use tabella::{MessageOutcome, DAL};

use crate::fixtures::get_or_init_fixture;
use crate::support::{append_message, SHIFT_LOGGED};

const LEASE: Duration = Duration::from_secs(300);
const NO_LEASE: Duration = Duration::ZERO;

#[tokio::test]
#[serial]
async fn test_mark_processed_is_idempotent() {
    let fixture = get_or_init_fixture().await;
    let database = {
        let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
        guard.reset_database().await;
        guard.get_database()
    };
    let dal = DAL::new(database.clone());

    let id = append_message(&database, SHIFT_LOGGED, "{}").await;
    dal.outbox().claim_batch(10, 3, LEASE).await.unwrap();

    dal.outbox().mark_processed(id).await.unwrap();
    let first = dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert!(first.processed_at.is_some());
    assert!(first.claimed_at.is_none());

    // Replaying the outcome update (crash-and-retry of the record step)
    // must leave the row in the same terminal state without error.
    dal.outbox().mark_processed(id).await.unwrap();
    let second = dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(first.processed_at, second.processed_at);
    assert_eq!(second.retry_count, 0);
}

#[tokio::test]
#[serial]
async fn test_mark_failed_increments_retry_and_records_error() {
    let fixture = get_or_init_fixture().await;
    let database = {
        let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
        guard.reset_database().await;
        guard.get_database()
    };
    let dal = DAL::new(database.clone());

    let id = append_message(&database, SHIFT_LOGGED, "{}").await;
    dal.outbox().claim_batch(10, 3, LEASE).await.unwrap();
    dal.outbox()
        .mark_failed(id, "subscriber exploded")
        .await
        .unwrap();

    let stored = dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.retry_count, 1);
    assert_eq!(stored.last_error.as_deref(), Some("subscriber exploded"));
    assert!(stored.processed_at.is_none());
    assert!(stored.claimed_at.is_none());

    // Retry bookkeeping never resets.
    dal.outbox().claim_batch(10, 3, NO_LEASE).await.unwrap();
    dal.outbox().mark_failed(id, "still broken").await.unwrap();
    let stored = dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.retry_count, 2);
    assert_eq!(stored.last_error.as_deref(), Some("still broken"));
}

#[tokio::test]
#[serial]
async fn test_failure_after_processed_is_a_noop() {
    let fixture = get_or_init_fixture().await;
    let database = {
        let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
        guard.reset_database().await;
        guard.get_database()
    };
    let dal = DAL::new(database.clone());

    let id = append_message(&database, SHIFT_LOGGED, "{}").await;
    dal.outbox().mark_processed(id).await.unwrap();
    dal.outbox().mark_failed(id, "too late").await.unwrap();

    let stored = dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert!(stored.processed_at.is_some());
    assert_eq!(stored.retry_count, 0);
    assert!(stored.last_error.is_none());
}

#[tokio::test]
#[serial]
async fn test_last_error_survives_eventual_success() {
    let fixture = get_or_init_fixture().await;
    let database = {
        let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
        guard.reset_database().await;
        guard.get_database()
    };
    let dal = DAL::new(database.clone());

    let id = append_message(&database, SHIFT_LOGGED, "{}").await;
    dal.outbox().claim_batch(10, 3, LEASE).await.unwrap();
    dal.outbox()
        .mark_failed(id, "transient hiccup")
        .await
        .unwrap();

    dal.outbox().claim_batch(10, 3, NO_LEASE).await.unwrap();
    dal.outbox().mark_processed(id).await.unwrap();

    // The breadcrumb stays even though the message eventually succeeded.
    let stored = dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert!(stored.processed_at.is_some());
    assert_eq!(stored.last_error.as_deref(), Some("transient hiccup"));
    assert_eq!(stored.retry_count, 1);
}

#[tokio::test]
#[serial]
async fn test_record_outcomes_applies_mixed_batch_atomically() {
    let fixture = get_or_init_fixture().await;
    let database = {
        let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
        guard.reset_database().await;
        guard.get_database()
    };
    let dal = DAL::new(database.clone());

    let ok_id = append_message(&database, SHIFT_LOGGED, "{}").await;
    let bad_id = append_message(&database, SHIFT_LOGGED, "{}").await;
    dal.outbox().claim_batch(10, 3, LEASE).await.unwrap();

    dal.outbox()
        .record_outcomes(&[
            MessageOutcome::Processed(ok_id),
            MessageOutcome::Failed(bad_id, "no subscriber".to_string()),
        ])
        .await
        .unwrap();

    let ok = dal.outbox().get_by_id(ok_id).await.unwrap().unwrap();
    assert!(ok.processed_at.is_some());

    let bad = dal.outbox().get_by_id(bad_id).await.unwrap().unwrap();
    assert!(bad.processed_at.is_none());
    assert_eq!(bad.retry_count, 1);
    assert_eq!(bad.last_error.as_deref(), Some("no subscriber"));

    assert_eq!(dal.outbox().unprocessed_count().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_unprocessed_count_tracks_pending_and_exhausted() {
    let fixture = get_or_init_fixture().await;
    let database = {
        let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
        guard.reset_database().await;
        guard.get_database()
    };
    let dal = DAL::new(database.clone());

    let a = append_message(&database, SHIFT_LOGGED, "{}").await;
    let _b = append_message(&database, SHIFT_LOGGED, "{}").await;
    let c = append_message(&database, SHIFT_LOGGED, "{}").await;
    assert_eq!(dal.outbox().unprocessed_count().await.unwrap(), 3);

    dal.outbox().mark_processed(a).await.unwrap();
    assert_eq!(dal.outbox().unprocessed_count().await.unwrap(), 2);

    // Exhausted messages still count: they were never delivered.
    for _ in 0..3 {
        dal.outbox().mark_failed(c, "refused").await.unwrap();
    }
    assert_eq!(dal.outbox().unprocessed_count().await.unwrap(), 2);
}
