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

//! Data Access Layer with runtime backend selection
//!
//! Each DAL operation dispatches to a backend-specific implementation based
//! on the connection type detected at startup. The dispatcher and monitoring
//! surfaces go through this layer; the writer does not (it participates in
//! the caller's transaction instead of drawing pooled connections).
//!
//! # Example
//!
//! ```rust,ignore
//! use tabella::{Database, DAL};
//!
//! let db = Database::new("postgres://localhost/registrar", "registrar", 10);
//! let dal = DAL::new(db);
//!
//! let pending = dal.outbox().unprocessed_count().await?;
//! ```

pub mod models;
pub mod outbox_message;

pub use outbox_message::OutboxMessageDAL;

use crate::database::{BackendType, Database};

/// Helper macro for dispatching operations based on backend type.
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg:expr, $sqlite:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite,
        }
    };
}

/// Helper macro for matching on [`crate::AnyConnection`] variants when
/// executing backend-specific queries.
#[macro_export]
macro_rules! connection_match {
    ($conn:expr, $pg_var:ident => $pg_block:block, $sqlite_var:ident => $sqlite_block:block) => {
        match $conn {
            #[cfg(feature = "postgres")]
            $crate::database::AnyConnection::Postgres($pg_var) => $pg_block,
            #[cfg(feature = "sqlite")]
            $crate::database::AnyConnection::Sqlite($sqlite_var) => $sqlite_block,
        }
    };
}

/// Root data access layer handle.
///
/// Cheap to clone; hands out per-entity DALs borrowing the shared database.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database this DAL operates on.
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Returns the backend type of the underlying database.
    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    /// Returns the outbox message DAL.
    pub fn outbox(&self) -> OutboxMessageDAL<'_> {
        OutboxMessageDAL::new(self)
    }
}
