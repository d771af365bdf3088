use std::time::Duration;
use store_sqlite::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("service {0} has no probe")]
    UnsupportedService(i64),
    #[error("store call exceeded {0:?}")]
    StoreTimeout(Duration),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CheckError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckError::Store(e) if e.is_not_found())
    }
}
