use super::schema::Database;
use super::types::DatabaseError;

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Get a raw value by key, or `None` if the key was never written.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a value (UPSERT), refreshing its timestamp.
    pub async fn set_value(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Set a value and increment the integer counter stored under
    /// `counter_key`, in one transaction. Returns the new counter value.
    ///
    /// The counter is shared by every connection to the file, so it moves on
    /// writes from other processes too.
    pub async fn set_value_counted(
        &self,
        key: &str,
        value: &str,
        counter_key: &str,
    ) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, '1', datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = CAST(CAST(value AS INTEGER) + 1 AS TEXT),
                updated_at = excluded.updated_at
        "#,
        )
        .bind(counter_key)
        .execute(&mut *tx)
        .await?;

        let (count,): (i64,) =
            sqlx::query_as("SELECT CAST(value AS INTEGER) FROM kv_store WHERE key = ?")
                .bind(counter_key)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Read an integer counter written by [`Database::set_value_counted`].
    /// A missing or unparseable counter reads as 0.
    pub async fn get_counter(&self, counter_key: &str) -> Result<u64, DatabaseError> {
        Ok(self
            .get_value(counter_key)
            .await?
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Remove a key. Returns true if it existed.
    pub async fn remove_value(&self, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_value_missing() {
        let db = test_db().await;
        assert_eq!(db.get_value("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_value_upsert() {
        let db = test_db().await;
        db.set_value("news_user", "{\"a\":1}").await.unwrap();
        db.set_value("news_user", "{\"a\":2}").await.unwrap();

        let value = db.get_value("news_user").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"a\":2}"));
    }

    #[tokio::test]
    async fn test_counted_write_bumps_counter() {
        let db = test_db().await;
        assert_eq!(db.get_counter("rev").await.unwrap(), 0);

        assert_eq!(db.set_value_counted("doc", "[1]", "rev").await.unwrap(), 1);
        assert_eq!(db.set_value_counted("doc", "[2]", "rev").await.unwrap(), 2);
        assert_eq!(db.get_counter("rev").await.unwrap(), 2);
        assert_eq!(db.get_value("doc").await.unwrap().as_deref(), Some("[2]"));
    }

    #[tokio::test]
    async fn test_remove_value() {
        let db = test_db().await;
        db.set_value("k", "v").await.unwrap();
        assert!(db.remove_value("k").await.unwrap());
        assert!(!db.remove_value("k").await.unwrap());
        assert_eq!(db.get_value("k").await.unwrap(), None);
    }
}
