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

//! Outbox Writer
//!
//! The writer appends a message row on a connection the caller already holds
//! inside an open transaction. It never begins or commits a transaction
//! itself: if the enclosing business transaction commits, the message is
//! durably recorded; if it rolls back, the message never exists. There is no
//! code path that appends a message outside the caller's transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabella::{NewOutboxMessage, OutboxWriter, WriteError};
//!
//! conn.transaction::<_, WriteError, _>(|conn| {
//!     // ... business table writes on the same connection ...
//!     let message_id = OutboxWriter::append_postgres(
//!         conn,
//!         NewOutboxMessage::new("residency.shift-logged", payload),
//!     )?;
//!     Ok(message_id)
//! })?;
//! ```

use diesel::prelude::*;
#[cfg(feature = "postgres")]
use diesel::PgConnection;
#[cfg(feature = "sqlite")]
use diesel::SqliteConnection;

use crate::dal::models::NewOutboxMessageRow;
use crate::database::schema::outbox_messages;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::database::AnyConnection;
use crate::error::WriteError;
use crate::models::outbox_message::NewOutboxMessage;

/// Appends outbox messages inside the caller's transaction.
pub struct OutboxWriter;

impl OutboxWriter {
    /// Appends a message on a runtime-selected connection.
    ///
    /// Dispatches to the backend-specific append for the variant held.
    pub fn append(
        conn: &mut AnyConnection,
        message: NewOutboxMessage,
    ) -> Result<UniversalUuid, WriteError> {
        crate::connection_match!(
            conn,
            pg_conn => { Self::append_postgres(pg_conn, message) },
            sqlite_conn => { Self::append_sqlite(sqlite_conn, message) }
        )
    }

    /// Appends a message on an open PostgreSQL connection.
    ///
    /// Returns the assigned message id. Inserts exactly one row; does not
    /// commit.
    #[cfg(feature = "postgres")]
    pub fn append_postgres(
        conn: &mut PgConnection,
        message: NewOutboxMessage,
    ) -> Result<UniversalUuid, WriteError> {
        let (id, row) = Self::build_row(message)?;

        diesel::insert_into(outbox_messages::table)
            .values(&row)
            .execute(conn)?;

        Ok(id)
    }

    /// Appends a message on an open SQLite connection.
    ///
    /// Returns the assigned message id. Inserts exactly one row; does not
    /// commit.
    #[cfg(feature = "sqlite")]
    pub fn append_sqlite(
        conn: &mut SqliteConnection,
        message: NewOutboxMessage,
    ) -> Result<UniversalUuid, WriteError> {
        let (id, row) = Self::build_row(message)?;

        diesel::insert_into(outbox_messages::table)
            .values(&row)
            .execute(conn)?;

        Ok(id)
    }

    /// Validates the message and assigns id and occurred_at.
    fn build_row(message: NewOutboxMessage) -> Result<(UniversalUuid, NewOutboxMessageRow), WriteError> {
        if message.event_type.is_empty() {
            return Err(WriteError::EmptyEventType);
        }

        let id = UniversalUuid::new_v4();
        let occurred_at = UniversalTimestamp::now();
        let metadata = message.metadata.to_json()?;

        let row = NewOutboxMessageRow {
            id: id.to_string(),
            event_type: message.event_type,
            payload: message.payload,
            metadata,
            occurred_at: occurred_at.to_naive(),
            retry_count: 0,
        };

        Ok((id, row))
    }
}
