use color_eyre::{eyre::WrapErr, Result};
use sqlx::{SqliteConnection, SqlitePool};

struct Migration {
    version: &'static str,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "V1",
        name: "catalog tables",
        sql: include_str!("../../migrations/V1__init.sql"),
    },
    Migration {
        version: "V2",
        name: "quiz attempts and xp ledger",
        sql: include_str!("../../migrations/V2__add_attempts_and_xp_ledger.sql"),
    },
    Migration {
        version: "V3",
        name: "rank index",
        sql: include_str!("../../migrations/V3__add_rank_index.sql"),
    },
];

/// Bring the schema up to date. Each pending migration and its
/// bookkeeping row commit together, so a failed step is retried whole on
/// the next start.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    for migration in MIGRATIONS {
        let mut tx = pool.begin().await?;

        if is_applied(&mut tx, migration.version).await? {
            continue;
        }

        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .wrap_err_with(|| format!("migration {} ({}) failed", migration.version, migration.name))?;

        sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            version = migration.version,
            name = migration.name,
            "applied database migration"
        );
    }

    Ok(())
}

async fn is_applied(conn: &mut SqliteConnection, version: &str) -> sqlx::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?)")
        .bind(version)
        .fetch_one(conn)
        .await
}
