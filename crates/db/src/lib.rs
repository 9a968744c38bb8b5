//! SQLite pool construction and module-contributed migration execution.

use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use medley_kernel::module::Migration;
use medley_kernel::settings::DatabaseSettings;

/// Open the application pool. Foreign keys are enabled on every connection so
/// cascade rules in the schema actually fire.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await
        .with_context(|| "failed to open database pool")?;

    Ok(pool)
}

/// Single-connection in-memory pool for tests. One connection is mandatory:
/// each new `:memory:` connection would otherwise see an empty database.
pub async fn memory_pool() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| "failed to open in-memory pool")?;

    Ok(pool)
}

/// Apply module migrations that have not run yet, in the order given.
/// Applied migrations are recorded in `_migrations` keyed by (module, id).
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            module     TEXT NOT NULL,
            id         TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (module, id)
        )
        "#,
    )
    .execute(pool)
    .await
    .with_context(|| "failed to create migration ledger")?;

    for (module, migration) in migrations {
        let applied: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM _migrations WHERE module = ?1 AND id = ?2")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await?;

        if applied.is_some() {
            continue;
        }

        tracing::info!(module, id = migration.id, "applying migration");

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
        sqlx::query("INSERT INTO _migrations (module, id) VALUES (?1, ?2)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}
