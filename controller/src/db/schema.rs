use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Persisted wallet preferences and guard flags, keyed by their
    // historical local-storage names.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS kv_store (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
