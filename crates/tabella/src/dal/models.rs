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

//! Diesel row models for the outbox table.
//!
//! Row structs use backend-native column types (TEXT ids, naive UTC
//! timestamps) that work on both PostgreSQL and SQLite; conversion to the
//! domain types happens at the DAL boundary.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::database::schema::outbox_messages;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StoreError;
use crate::models::outbox_message::{EventMetadata, OutboxMessage};

/// A stored outbox row, as read from either backend.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = outbox_messages)]
pub struct OutboxMessageRow {
    pub id: String,
    pub event_type: String,
    pub payload: String,
    pub metadata: String,
    pub occurred_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub retry_count: i32,
    pub claimed_at: Option<NaiveDateTime>,
}

/// Insert form of an outbox row. Built by the writer inside the caller's
/// transaction.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = outbox_messages)]
pub struct NewOutboxMessageRow {
    pub id: String,
    pub event_type: String,
    pub payload: String,
    pub metadata: String,
    pub occurred_at: NaiveDateTime,
    pub retry_count: i32,
}

impl TryFrom<OutboxMessageRow> for OutboxMessage {
    type Error = StoreError;

    fn try_from(row: OutboxMessageRow) -> Result<Self, Self::Error> {
        let id = UniversalUuid::parse_str(&row.id).map_err(|e| StoreError::CorruptRow {
            id: row.id.clone(),
            reason: format!("invalid uuid: {}", e),
        })?;
        let metadata =
            EventMetadata::from_json(&row.metadata).map_err(|e| StoreError::CorruptRow {
                id: row.id.clone(),
                reason: format!("invalid metadata json: {}", e),
            })?;

        Ok(OutboxMessage {
            id,
            event_type: row.event_type,
            payload: row.payload,
            metadata,
            occurred_at: UniversalTimestamp::from_naive(row.occurred_at),
            processed_at: row.processed_at.map(UniversalTimestamp::from_naive),
            last_error: row.last_error,
            retry_count: row.retry_count,
            claimed_at: row.claimed_at.map(UniversalTimestamp::from_naive),
        })
    }
}
