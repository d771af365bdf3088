use crate::CheckError;
use std::sync::Arc;
use std::time::Duration;
use store_sqlite::HostStore;

/// Runs one store operation on the blocking pool, bounded by `limit`. A call
/// that overruns is reported as a timeout; the blocking task is left to finish.
pub(crate) async fn store_call<T, F>(store: &Arc<dyn HostStore>, limit: Duration, f: F) -> Result<T, CheckError>
where
    T: Send + 'static,
    F: FnOnce(&dyn HostStore) -> store_sqlite::Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    let task = tokio::task::spawn_blocking(move || f(store.as_ref()));
    match tokio::time::timeout(limit, task).await {
        Err(_) => Err(CheckError::StoreTimeout(limit)),
        Ok(joined) => Ok(joined??),
    }
}

/// Runs a store write on the blocking pool and waits for it to finish. The
/// store bounds its own lock and busy waits, so the write is never abandoned
/// half way and the result reported matches what was stored.
pub(crate) async fn store_commit<T, F>(store: &Arc<dyn HostStore>, f: F) -> Result<T, CheckError>
where
    T: Send + 'static,
    F: FnOnce(&dyn HostStore) -> store_sqlite::Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    Ok(tokio::task::spawn_blocking(move || f(store.as_ref())).await??)
}
