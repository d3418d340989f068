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

//! # Tabella
//!
//! Tabella is a Rust library for transactional outbox storage and reliable
//! domain-event delivery. State changes committed inside a business
//! transaction are recorded as outbox messages in the same commit, then
//! delivered asynchronously by a background dispatcher - at-least-once,
//! without a two-phase commit to an external broker.
//!
//! ## Architecture
//!
//! - [`OutboxWriter`] appends a message row on the caller's open
//!   transaction. If the transaction rolls back, the message never exists.
//! - [`OutboxDispatcher`] runs as a background loop: it claims a batch of
//!   pending messages with exclusive-claim semantics, resolves each message
//!   to a concrete event through an [`EventTypeRegistry`], hands the event
//!   to an [`EventPublisher`], and records the outcome per message.
//! - [`InProcessPublisher`] fans events out to registered subscribers. The
//!   [`EventPublisher`] trait is the seam where a message-broker adapter
//!   could be substituted without touching the outbox contract.
//!
//! Both PostgreSQL and SQLite are supported, selected at runtime from the
//! connection URL. On PostgreSQL, concurrent dispatcher replicas partition
//! the pending set via `FOR UPDATE SKIP LOCKED`; on SQLite the same
//! guarantee comes from serialized write transactions.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tabella::{
//!     Database, DispatcherConfig, EventTypeRegistry, InProcessPublisher,
//!     NewOutboxMessage, OutboxDispatcher, OutboxWriter, DAL,
//! };
//!
//! let database = Database::new("postgres://localhost:5432", "registrar", 10);
//! database.run_migrations().await?;
//!
//! // Inside a business transaction:
//! conn.transaction(|conn| {
//!     // ... business table writes ...
//!     OutboxWriter::append_postgres(
//!         conn,
//!         NewOutboxMessage::new("residency.shift-logged", payload),
//!     )?;
//!     Ok(())
//! })?;
//!
//! // At startup:
//! let mut registry = EventTypeRegistry::new();
//! registry.register::<ShiftLogged>("residency.shift-logged");
//!
//! let dispatcher = OutboxDispatcher::new(
//!     DAL::new(database),
//!     Arc::new(registry),
//!     Arc::new(publisher),
//!     DispatcherConfig::default(),
//! );
//! let handle = dispatcher.spawn();
//! // ... later ...
//! handle.shutdown().await;
//! ```

pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod models;
pub mod writer;

pub use dal::{OutboxMessageDAL, DAL};
pub use database::universal_types::{UniversalTimestamp, UniversalUuid};
pub use database::{AnyConnection, BackendType, Database};
pub use dispatcher::{DispatcherConfig, DispatcherHandle, OutboxDispatcher};
pub use error::{DispatchError, PublishError, StoreError, WriteError};
pub use events::{
    BoxError, DomainEvent, EventPublisher, EventSubscriber, EventTypeRegistry, InProcessPublisher,
};
pub use models::outbox_message::{EventMetadata, MessageOutcome, NewOutboxMessage, OutboxMessage};
pub use writer::OutboxWriter;

/// Initializes tracing-based logging for the library.
///
/// Respects `RUST_LOG` when set; otherwise uses the provided filter, falling
/// back to `info`. Safe to call more than once - subsequent calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or("info")));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
