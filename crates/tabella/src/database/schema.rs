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

//! Diesel schema for the outbox table.
//!
//! The table definition uses column types that map identically on both
//! backends (TEXT ids, naive UTC timestamps), so a single schema serves
//! PostgreSQL and SQLite.

diesel::table! {
    outbox_messages (id) {
        id -> Text,
        event_type -> Text,
        payload -> Text,
        metadata -> Text,
        occurred_at -> Timestamp,
        processed_at -> Nullable<Timestamp>,
        last_error -> Nullable<Text>,
        retry_count -> Integer,
        claimed_at -> Nullable<Timestamp>,
    }
}
