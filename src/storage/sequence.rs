//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Named monotonic sequences
//!
//! One row per counter; values only ever grow. `SCHEMA_IDS` feeds the
//! client-visible global schema ids.

use sqlx::SqliteConnection;

use crate::error::RegistryResult;

/// The sequence that allocates global schema ids
pub const SEQUENCE_SCHEMA_IDS: &str = "SCHEMA_IDS";

/// Increment a named sequence and return its new value
///
/// A single upsert statement, so concurrent callers on separate connections
/// never observe the same value. SQLite serializes write transactions, which
/// keeps allocation linearizable when this runs inside the registering
/// transaction.
pub async fn next_sequence_id(conn: &mut SqliteConnection, name: &str) -> RegistryResult<i64> {
    let (next_value,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO sequences (name, next_value) VALUES (?, 1)
        ON CONFLICT(name) DO UPDATE SET next_value = next_value + 1
        RETURNING next_value
        "#,
    )
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(next_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;

    #[tokio::test]
    async fn test_sequence_starts_at_one_and_increments() {
        let store = Store::connect_in_memory().await.unwrap();
        let mut conn = store.pool().acquire().await.unwrap();

        assert_eq!(next_sequence_id(&mut conn, SEQUENCE_SCHEMA_IDS).await.unwrap(), 1);
        assert_eq!(next_sequence_id(&mut conn, SEQUENCE_SCHEMA_IDS).await.unwrap(), 2);
        assert_eq!(next_sequence_id(&mut conn, "OTHER").await.unwrap(), 1);
        assert_eq!(next_sequence_id(&mut conn, SEQUENCE_SCHEMA_IDS).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sequence_ids_unique_under_concurrent_writers() {
        let store = Store::connect_in_memory().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for _ in 0..25 {
                    let mut conn = store.pool().acquire().await.unwrap();
                    ids.push(
                        next_sequence_id(&mut conn, SEQUENCE_SCHEMA_IDS)
                            .await
                            .unwrap(),
                    );
                }
                ids
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before);
        assert_eq!(all.last().copied(), Some(50));
    }
}
