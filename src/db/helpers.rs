use std::future::Future;
use std::time::Duration;

use rand::Rng;

const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF_MS: u64 = 20;

/// SQLITE_BUSY and SQLITE_LOCKED plus their extended codes. These come back
/// when another writer holds the database or our read snapshot went stale;
/// the transaction has been rolled back and may simply be run again.
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let primary = db_err
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| c & 0xff);
            matches!(primary, Some(5) | Some(6))
                || db_err.message().contains("database is locked")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Run a whole write transaction, re-running it from scratch when it fails
/// for a transient storage reason. `op` must open and commit its own
/// transaction so a failed attempt leaves nothing behind.
pub async fn retry_transient<T, F, Fut>(label: &'static str, mut op: F) -> sqlx::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = sqlx::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                let jitter = rand::thread_rng().gen_range(0..BASE_BACKOFF_MS);
                let backoff = BASE_BACKOFF_MS * (1 << (attempt - 1)) + jitter;
                tracing::warn!("{label}: transient storage error on attempt {attempt}: {e}; retrying in {backoff}ms");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn returns_first_success_without_retrying() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let out = retry_transient("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, sqlx::Error>(7)
        })
        .await
        .unwrap();

        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_pool_timeouts_then_gives_up() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let out: sqlx::Result<()> = retry_transient("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(sqlx::Error::PoolTimedOut)
        })
        .await;

        assert!(matches!(out, Err(sqlx::Error::PoolTimedOut)));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let out: sqlx::Result<()> = retry_transient("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(sqlx::Error::RowNotFound)
        })
        .await;

        assert!(matches!(out, Err(sqlx::Error::RowNotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
