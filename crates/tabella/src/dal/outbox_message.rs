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

//! Outbox Message DAL with runtime backend selection
//!
//! This module provides the claim and outcome-recording operations the
//! dispatcher runs against the outbox table, plus the monitoring queries.
//!
//! Claiming is a short transaction: rows are selected under the visibility
//! predicate, stamped with `claimed_at`, and returned. No transaction or row
//! lock is held while messages are published; a crash between claim and
//! outcome leaves rows claimed-but-unresolved until the claim lease expires,
//! after which they become claimable again.
//!
//! On PostgreSQL the candidate selection uses `FOR UPDATE SKIP LOCKED`, so
//! concurrent claimers partition the pending set instead of blocking or
//! double-claiming. SQLite lacks that primitive; there the single-connection
//! pool serializes claim transactions, and the `claimed_at` stamp keeps
//! consecutive claimers disjoint.

use std::time::Duration;

use chrono::Utc;
use diesel::prelude::*;

use super::models::OutboxMessageRow;
use super::DAL;
use crate::database::schema::outbox_messages;
use crate::database::universal_types::UniversalUuid;
use crate::error::StoreError;
use crate::models::outbox_message::{MessageOutcome, OutboxMessage};

/// Data access layer for outbox message operations.
#[derive(Clone)]
pub struct OutboxMessageDAL<'a> {
    dal: &'a DAL,
}

impl<'a> OutboxMessageDAL<'a> {
    /// Creates a new OutboxMessageDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Atomically claims up to `limit` pending messages.
    ///
    /// Selection predicate: unprocessed, under the retry ceiling, not
    /// currently claimed (or claimed longer ago than `claim_lease`). Rows
    /// are returned in `occurred_at` order, id as tie-break. An empty
    /// pending set yields `Ok(vec![])`.
    pub async fn claim_batch(
        &self,
        limit: usize,
        max_retries: i32,
        claim_lease: Duration,
    ) -> Result<Vec<OutboxMessage>, StoreError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.claim_batch_postgres(limit, max_retries, claim_lease)
                .await,
            self.claim_batch_sqlite(limit, max_retries, claim_lease)
                .await
        )
    }

    #[cfg(feature = "postgres")]
    async fn claim_batch_postgres(
        &self,
        limit: usize,
        max_retries: i32,
        claim_lease: Duration,
    ) -> Result<Vec<OutboxMessage>, StoreError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let limit = limit as i64;
        let lease = chrono::Duration::seconds(claim_lease.as_secs() as i64);

        let rows: Vec<OutboxMessageRow> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = Utc::now().naive_utc();
                    let reclaim_cutoff = now - lease;

                    // Lock candidate rows, skipping rows already locked by a
                    // concurrent claimer.
                    let candidates: Vec<String> = outbox_messages::table
                        .select(outbox_messages::id)
                        .filter(outbox_messages::processed_at.is_null())
                        .filter(outbox_messages::retry_count.lt(max_retries))
                        .filter(
                            outbox_messages::claimed_at
                                .is_null()
                                .or(outbox_messages::claimed_at.le(reclaim_cutoff)),
                        )
                        .order((
                            outbox_messages::occurred_at.asc(),
                            outbox_messages::id.asc(),
                        ))
                        .limit(limit)
                        .for_update()
                        .skip_locked()
                        .load(conn)?;

                    if candidates.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(
                        outbox_messages::table.filter(outbox_messages::id.eq_any(&candidates)),
                    )
                    .set(outbox_messages::claimed_at.eq(Some(now)))
                    .execute(conn)?;

                    outbox_messages::table
                        .filter(outbox_messages::id.eq_any(&candidates))
                        .order((
                            outbox_messages::occurred_at.asc(),
                            outbox_messages::id.asc(),
                        ))
                        .load(conn)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn claim_batch_sqlite(
        &self,
        limit: usize,
        max_retries: i32,
        claim_lease: Duration,
    ) -> Result<Vec<OutboxMessage>, StoreError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let limit = limit as i64;
        let lease = chrono::Duration::seconds(claim_lease.as_secs() as i64);

        let rows: Vec<OutboxMessageRow> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = Utc::now().naive_utc();
                    let reclaim_cutoff = now - lease;

                    let candidates: Vec<String> = outbox_messages::table
                        .select(outbox_messages::id)
                        .filter(outbox_messages::processed_at.is_null())
                        .filter(outbox_messages::retry_count.lt(max_retries))
                        .filter(
                            outbox_messages::claimed_at
                                .is_null()
                                .or(outbox_messages::claimed_at.le(reclaim_cutoff)),
                        )
                        .order((
                            outbox_messages::occurred_at.asc(),
                            outbox_messages::id.asc(),
                        ))
                        .limit(limit)
                        .load(conn)?;

                    if candidates.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(
                        outbox_messages::table.filter(outbox_messages::id.eq_any(&candidates)),
                    )
                    .set(outbox_messages::claimed_at.eq(Some(now)))
                    .execute(conn)?;

                    outbox_messages::table
                        .filter(outbox_messages::id.eq_any(&candidates))
                        .order((
                            outbox_messages::occurred_at.asc(),
                            outbox_messages::id.asc(),
                        ))
                        .load(conn)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    /// Records the outcomes of a drained batch in a single transaction.
    ///
    /// Processed outcomes set `processed_at` exactly once; failed outcomes
    /// increment `retry_count` and overwrite `last_error`. Both release the
    /// claim. Re-applying an outcome for an already-processed message is a
    /// no-op, so replaying this step after a crash is safe.
    pub async fn record_outcomes(&self, outcomes: &[MessageOutcome]) -> Result<(), StoreError> {
        if outcomes.is_empty() {
            return Ok(());
        }
        let outcomes = outcomes.to_vec();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.record_outcomes_postgres(outcomes).await,
            self.record_outcomes_sqlite(outcomes).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn record_outcomes_postgres(
        &self,
        outcomes: Vec<MessageOutcome>,
    ) -> Result<(), StoreError> {
        use chrono::NaiveDateTime;

        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let now = Utc::now().naive_utc();
                for outcome in &outcomes {
                    match outcome {
                        MessageOutcome::Processed(id) => {
                            // The processed_at guard makes replays no-ops.
                            diesel::update(
                                outbox_messages::table
                                    .filter(outbox_messages::id.eq(id.to_string()))
                                    .filter(outbox_messages::processed_at.is_null()),
                            )
                            .set((
                                outbox_messages::processed_at.eq(Some(now)),
                                outbox_messages::claimed_at.eq(None::<NaiveDateTime>),
                            ))
                            .execute(conn)?;
                        }
                        MessageOutcome::Failed(id, reason) => {
                            diesel::update(
                                outbox_messages::table
                                    .filter(outbox_messages::id.eq(id.to_string()))
                                    .filter(outbox_messages::processed_at.is_null()),
                            )
                            .set((
                                outbox_messages::retry_count
                                    .eq(outbox_messages::retry_count + 1),
                                outbox_messages::last_error.eq(Some(reason.clone())),
                                outbox_messages::claimed_at.eq(None::<NaiveDateTime>),
                            ))
                            .execute(conn)?;
                        }
                    }
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn record_outcomes_sqlite(
        &self,
        outcomes: Vec<MessageOutcome>,
    ) -> Result<(), StoreError> {
        use chrono::NaiveDateTime;

        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let now = Utc::now().naive_utc();
                for outcome in &outcomes {
                    match outcome {
                        MessageOutcome::Processed(id) => {
                            // The processed_at guard makes replays no-ops.
                            diesel::update(
                                outbox_messages::table
                                    .filter(outbox_messages::id.eq(id.to_string()))
                                    .filter(outbox_messages::processed_at.is_null()),
                            )
                            .set((
                                outbox_messages::processed_at.eq(Some(now)),
                                outbox_messages::claimed_at.eq(None::<NaiveDateTime>),
                            ))
                            .execute(conn)?;
                        }
                        MessageOutcome::Failed(id, reason) => {
                            diesel::update(
                                outbox_messages::table
                                    .filter(outbox_messages::id.eq(id.to_string()))
                                    .filter(outbox_messages::processed_at.is_null()),
                            )
                            .set((
                                outbox_messages::retry_count
                                    .eq(outbox_messages::retry_count + 1),
                                outbox_messages::last_error.eq(Some(reason.clone())),
                                outbox_messages::claimed_at.eq(None::<NaiveDateTime>),
                            ))
                            .execute(conn)?;
                        }
                    }
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Marks a single message as processed. Idempotent.
    pub async fn mark_processed(&self, id: UniversalUuid) -> Result<(), StoreError> {
        self.record_outcomes(&[MessageOutcome::Processed(id)]).await
    }

    /// Records a single failed delivery attempt.
    pub async fn mark_failed(&self, id: UniversalUuid, reason: &str) -> Result<(), StoreError> {
        self.record_outcomes(&[MessageOutcome::Failed(id, reason.to_string())])
            .await
    }

    /// Counts messages that have not been processed yet (monitoring).
    pub async fn unprocessed_count(&self) -> Result<i64, StoreError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.unprocessed_count_postgres().await,
            self.unprocessed_count_sqlite().await
        )
    }

    #[cfg(feature = "postgres")]
    async fn unprocessed_count_postgres(&self) -> Result<i64, StoreError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(|conn| {
                outbox_messages::table
                    .filter(outbox_messages::processed_at.is_null())
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn unprocessed_count_sqlite(&self) -> Result<i64, StoreError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(|conn| {
                outbox_messages::table
                    .filter(outbox_messages::processed_at.is_null())
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Fetches a single message by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Option<OutboxMessage>, StoreError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_by_id_postgres(id).await,
            self.get_by_id_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_by_id_postgres(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<OutboxMessage>, StoreError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let row: Option<OutboxMessageRow> = conn
            .interact(move |conn| {
                outbox_messages::table
                    .find(id.to_string())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(OutboxMessage::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_id_sqlite(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<OutboxMessage>, StoreError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let row: Option<OutboxMessageRow> = conn
            .interact(move |conn| {
                outbox_messages::table
                    .find(id.to_string())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(OutboxMessage::try_from).transpose()
    }

    /// Lists messages that exhausted their retries and remain unprocessed.
    /// Exhausted messages stay in place for operator inspection; nothing is
    /// moved to a dead-letter queue.
    pub async fn list_exhausted(
        &self,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<OutboxMessage>, StoreError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.list_exhausted_postgres(max_retries, limit).await,
            self.list_exhausted_sqlite(max_retries, limit).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_exhausted_postgres(
        &self,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<OutboxMessage>, StoreError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let rows: Vec<OutboxMessageRow> = conn
            .interact(move |conn| {
                outbox_messages::table
                    .filter(outbox_messages::processed_at.is_null())
                    .filter(outbox_messages::retry_count.ge(max_retries))
                    .order(outbox_messages::occurred_at.asc())
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn list_exhausted_sqlite(
        &self,
        max_retries: i32,
        limit: i64,
    ) -> Result<Vec<OutboxMessage>, StoreError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let rows: Vec<OutboxMessageRow> = conn
            .interact(move |conn| {
                outbox_messages::table
                    .filter(outbox_messages::processed_at.is_null())
                    .filter(outbox_messages::retry_count.ge(max_retries))
                    .order(outbox_messages::occurred_at.asc())
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }
}
