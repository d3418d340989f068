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

//! Durability test against a file-backed database: a committed message
//! survives a process crash and is delivered exactly once after restart.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serial_test::serial;
use tempfile::TempDir;

use tabella::{
    Database, DispatcherConfig, EventTypeRegistry, InProcessPublisher, OutboxDispatcher, DAL,
};

use crate::support::{append_message, RecordingSubscriber, ShiftLogged, SHIFT_LOGGED};

#[tokio::test]
#[serial]
async fn test_committed_message_survives_restart_and_delivers_once() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("outbox.db").display().to_string();

    // First process life: commit a message, then "crash" before the
    // dispatcher ever runs (every pool handle is dropped).
    let id = {
        let database = Database::new(&db_path, "", 1);
        database.run_migrations().await.unwrap();
        append_message(&database, SHIFT_LOGGED, r#"{"resident_id":"r-11","hours":3}"#).await
    };

    // Restart: fresh pools over the same file.
    let database = Database::new(&db_path, "", 1);
    database.run_migrations().await.unwrap();
    let dal = DAL::new(database.clone());

    let stored = dal.outbox().get_by_id(id).await.unwrap().unwrap();
    assert!(stored.processed_at.is_none());
    assert!(stored.claimed_at.is_none());

    let recording = Arc::new(RecordingSubscriber::default());
    let mut publisher = InProcessPublisher::new();
    publisher.subscribe(SHIFT_LOGGED, recording.clone());

    let mut registry = EventTypeRegistry::new();
    registry.register::<ShiftLogged>(SHIFT_LOGGED);

    let dispatcher = OutboxDispatcher::new(
        DAL::new(database.clone()),
        Arc::new(registry),
        Arc::new(publisher),
        DispatcherConfig::default(),
    );

    assert_eq!(dispatcher.process_cycle().await.unwrap(), 1);
    assert_eq!(recording.invocations.load(Ordering::SeqCst), 1);
    assert!(dal
        .outbox()
        .get_by_id(id)
        .await
        .unwrap()
        .unwrap()
        .processed_at
        .is_some());

    assert_eq!(dispatcher.process_cycle().await.unwrap(), 0);
    assert_eq!(recording.invocations.load(Ordering::SeqCst), 1);
}
