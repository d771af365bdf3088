use crate::store_call::store_call;
use crate::CheckError;
use std::sync::Arc;
use std::time::Duration;
use store_sqlite::{HostStore, ServiceStatusRow, StatusCounts};
use vigil_core::Status;

/// Read-only dashboard queries.
#[derive(Clone)]
pub struct StatusAggregator {
    store: Arc<dyn HostStore>,
    store_timeout: Duration,
}

impl StatusAggregator {
    pub fn new(store: Arc<dyn HostStore>, store_timeout: Duration) -> Self {
        StatusAggregator { store, store_timeout }
    }

    pub async fn services_by_status(&self, status: Status) -> Result<Vec<ServiceStatusRow>, CheckError> {
        store_call(&self.store, self.store_timeout, move |s| s.get_services_by_status(status)).await
    }

    pub async fn status_counts(&self) -> Result<StatusCounts, CheckError> {
        store_call(&self.store, self.store_timeout, |s| s.get_all_service_status_counts()).await
    }
}
