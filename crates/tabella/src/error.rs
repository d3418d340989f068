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

//! Error types for the outbox subsystem.
//!
//! Each layer has its own error enum: [`WriteError`] for the co-transactional
//! writer, [`StoreError`] for store operations, [`DispatchError`] for
//! per-message dispatch failures, and [`PublishError`] for aggregated
//! subscriber failures. A `DispatchError` rendered with `Display` is what
//! ends up in a message's `last_error` column.

use std::time::Duration;

use thiserror::Error;

/// Errors from outbox store operations (claiming, outcome recording,
/// monitoring queries).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to obtain a connection from the pool, or the pooled
    /// interaction itself failed.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A query failed inside the database.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A stored row could not be decoded into a domain message.
    #[error("Outbox row {id} could not be decoded: {reason}")]
    CorruptRow { id: String, reason: String },
}

/// Errors from [`crate::OutboxWriter::append`].
#[derive(Debug, Error)]
pub enum WriteError {
    /// The event type tag was empty.
    #[error("event_type must be non-empty")]
    EmptyEventType,

    /// The metadata map could not be serialized to JSON.
    #[error("Metadata serialization failed: {0}")]
    MetadataSerialization(#[from] serde_json::Error),

    /// The insert failed inside the caller's transaction.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Per-message dispatch failures. All variants are recorded in the message's
/// `last_error` column and consume one retry attempt; none of them abort the
/// batch or the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No deserializer is registered for the message's type tag.
    #[error("Unknown event type '{event_type}'")]
    UnknownEventType { event_type: String },

    /// The payload could not be deserialized into the registered event shape.
    #[error("Payload for event type '{event_type}' could not be deserialized: {source}")]
    Deserialization {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The publisher reported one or more subscriber failures.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The publish call did not complete within the configured timeout.
    #[error("Publish timed out after {timeout:?}")]
    PublishTimeout { timeout: Duration },
}

/// Aggregated subscriber failures for a single publish call.
///
/// The publisher always attempts every subscriber; this error summarizes all
/// of the failures so the dispatcher can record a single outcome.
#[derive(Debug, Error)]
#[error("{failed} of {total} subscribers failed for event '{event_type}': {details}")]
pub struct PublishError {
    /// The event type that was being published.
    pub event_type: String,
    /// How many subscribers failed.
    pub failed: usize,
    /// How many subscribers were invoked.
    pub total: usize,
    /// Per-subscriber failure summaries, joined.
    pub details: String,
}
