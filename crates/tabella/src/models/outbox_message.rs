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

//! Outbox Message Model
//!
//! This module defines domain structures for outbox messages, the unit of
//! reliable delivery. A message is created inside a business transaction by
//! the writer and afterwards mutated exclusively by the dispatcher
//! (`processed_at`, `last_error`, `retry_count`, `claimed_at`). Rows are
//! never deleted by this subsystem; retention of processed rows is external
//! housekeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};

/// Represents an outbox message (domain type).
///
/// A message is visible to the dispatcher iff `processed_at` is `None`, its
/// `retry_count` is under the configured ceiling, and it is not currently
/// claimed by a live dispatcher cycle. Once `processed_at` is set the message
/// is permanently excluded from claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Globally unique identifier, assigned at append time; immutable.
    /// Consumers use it for idempotency checks.
    pub id: UniversalUuid,
    /// String tag identifying the logical event kind; selects a deserializer.
    pub event_type: String,
    /// Serialized event body. Opaque to the store; the caller serialized it.
    pub payload: String,
    /// Cross-cutting context (correlation id, causation id, actor).
    pub metadata: EventMetadata,
    /// When the message was appended; claim order within a batch.
    pub occurred_at: UniversalTimestamp,
    /// Set exactly once when delivery succeeds; `None` means pending.
    pub processed_at: Option<UniversalTimestamp>,
    /// Most recent failure reason. Kept as a historical breadcrumb even if a
    /// later attempt succeeds.
    pub last_error: Option<String>,
    /// Number of failed delivery attempts; only ever increases.
    pub retry_count: i32,
    /// When the message was last claimed by a dispatcher cycle; cleared when
    /// the outcome is recorded. A stale claim becomes reclaimable after the
    /// configured lease expires.
    pub claimed_at: Option<UniversalTimestamp>,
}

/// Structure for appending new outbox messages (domain type).
///
/// Only the event type, payload and metadata are supplied by the caller;
/// `id` and `occurred_at` are assigned by the writer at append time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOutboxMessage {
    /// String tag identifying the logical event kind. Must be non-empty.
    pub event_type: String,
    /// Serialized event body; the writer does not serialize domain events.
    pub payload: String,
    /// Cross-cutting context carried alongside the payload.
    pub metadata: EventMetadata,
}

impl NewOutboxMessage {
    /// Creates a new message with empty metadata.
    pub fn new(event_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: payload.into(),
            metadata: EventMetadata::new(),
        }
    }

    /// Attaches metadata to the message.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Open key-value context attached to every outbox message.
///
/// Keys are strings, values arbitrary JSON; insertion order is irrelevant
/// (the map is sorted), so two metadata maps with the same entries serialize
/// identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMetadata(pub BTreeMap<String, serde_json::Value>);

impl EventMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes to the JSON text stored in the `metadata` column.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Parses the JSON text stored in the `metadata` column.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Per-message result of a dispatch attempt, recorded in a single
/// transactional write once the batch is drained.
#[derive(Debug, Clone)]
pub enum MessageOutcome {
    /// Delivery succeeded; sets `processed_at` (exactly once) and releases
    /// the claim.
    Processed(UniversalUuid),
    /// Delivery failed; increments `retry_count`, records the reason in
    /// `last_error`, and releases the claim.
    Failed(UniversalUuid, String),
}

impl MessageOutcome {
    /// The id of the message this outcome applies to.
    pub fn message_id(&self) -> UniversalUuid {
        match self {
            MessageOutcome::Processed(id) => *id,
            MessageOutcome::Failed(id, _) => *id,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, MessageOutcome::Processed(_))
    }
}
