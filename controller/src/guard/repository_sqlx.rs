use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use crate::guard::repository::KvRepository;

/// SQLx-backed implementation of KvRepository.
pub struct SqlxKvRepository {
    pool: AnyPool,
}

impl SqlxKvRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvRepository for SqlxKvRepository {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(r#"SELECT value FROM kv_store WHERE key = ?;"#)
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO kv_store (key, value) VALUES (?, ?)
ON CONFLICT(key) DO UPDATE SET value = excluded.value;
"#,
        )
        .bind(key.to_string())
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM kv_store WHERE key = ?;"#)
            .bind(key.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
