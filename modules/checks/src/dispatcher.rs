use crate::store_call::{store_call, store_commit};
use crate::CheckError;
use probes::ProbeSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use store_sqlite::{HostId, HostServiceId, HostStore, ServiceId};
use time::OffsetDateTime;
use tokio::sync::{broadcast, Semaphore};
use vigil_core::ratelimiter::RateLimiter;
use vigil_core::{clock, evaluate, ServiceKind, Status};

const FAILURE_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub store_timeout: Duration,
    /// Upper bound on checks in flight during [`Dispatcher::run_many`].
    pub concurrency: usize,
    /// Check launches per second for batch runs; 0 disables pacing.
    pub qps: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig { store_timeout: Duration::from_secs(3), concurrency: 16, qps: 0 }
    }
}

/// Outcome of one check cycle, in the shape presentation layers consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub ok: bool,
    pub message: String,
    pub service_id: ServiceId,
    pub host_service_id: HostServiceId,
    pub host_id: HostId,
    pub old_status: Option<Status>,
    pub new_status: Option<Status>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_check: Option<OffsetDateTime>,
}

impl CheckResponse {
    fn failed(host_service_id: HostServiceId, old_status: Option<Status>) -> Self {
        CheckResponse {
            ok: false,
            message: FAILURE_MESSAGE.to_string(),
            service_id: 0,
            host_service_id,
            host_id: 0,
            old_status,
            new_status: None,
            last_check: None,
        }
    }
}

/// Published whenever a check moves a binding to a different status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub host_service_id: HostServiceId,
    pub host_id: HostId,
    pub service_id: ServiceId,
    pub old: Status,
    pub new: Status,
    pub message: String,
    pub at: OffsetDateTime,
}

/// Runs check cycles: fetch binding, fetch host, probe, evaluate, persist, report.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn HostStore>,
    probes: ProbeSet,
    cfg: DispatcherConfig,
    events: broadcast::Sender<StatusChange>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn HostStore>, probes: ProbeSet, cfg: DispatcherConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Dispatcher { store, probes, cfg, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.events.subscribe()
    }

    /// Checks one binding. `old_status` is the caller's view of the status before
    /// the check and is echoed back unchanged. Never fails: errors become `ok: false`.
    pub async fn run_check(&self, host_service_id: HostServiceId, old_status: Status) -> CheckResponse {
        self.check(host_service_id, Some(old_status)).await
    }

    async fn check(&self, host_service_id: HostServiceId, caller_old: Option<Status>) -> CheckResponse {
        match self.try_check(host_service_id, caller_old).await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_not_found() {
                    tracing::warn!(host_service_id, error = %e, "check aborted");
                } else {
                    tracing::error!(host_service_id, error = %e, "check failed");
                }
                CheckResponse::failed(host_service_id, caller_old)
            }
        }
    }

    async fn try_check(&self, id: HostServiceId, caller_old: Option<Status>) -> Result<CheckResponse, CheckError> {
        let timeout = self.cfg.store_timeout;
        let hs = store_call(&self.store, timeout, move |s| s.get_host_service_by_id(id)).await?;
        let host_id = hs.host_id;
        let host = store_call(&self.store, timeout, move |s| s.get_host_by_id(host_id)).await?;
        let kind = ServiceKind::from_id(hs.service_id).ok_or(CheckError::UnsupportedService(hs.service_id))?;

        let outcome = self.probes.probe(kind, &host.url).await;
        let transition = evaluate(hs.status, outcome.status);
        if let Some(old) = caller_old.filter(|old| *old != hs.status) {
            tracing::warn!(host_service_id = id, caller = %old, stored = %hs.status, "caller's old status is stale");
        }

        let now = clock::now();
        let new = transition.new;
        store_commit(&self.store, move |s| s.record_check(id, new, now)).await?;

        tracing::info!(
            host_service_id = id,
            host = %host.host_name,
            service = kind.display_name(),
            old = %transition.old,
            new = %transition.new,
            changed = transition.changed,
            "check complete"
        );
        if transition.changed {
            // no subscribers is fine
            let _ = self.events.send(StatusChange {
                host_service_id: id,
                host_id,
                service_id: hs.service_id,
                old: transition.old,
                new: transition.new,
                message: outcome.message.clone(),
                at: now,
            });
        }

        Ok(CheckResponse {
            ok: true,
            message: outcome.message,
            service_id: hs.service_id,
            host_service_id: id,
            host_id,
            old_status: Some(caller_old.unwrap_or(transition.old)),
            new_status: Some(transition.new),
            last_check: Some(now),
        })
    }

    /// Checks many bindings concurrently. Responses come back in input order;
    /// `old_status` in each is the stored status before the check.
    pub async fn run_many(&self, ids: Vec<HostServiceId>) -> Vec<CheckResponse> {
        let sem = Arc::new(Semaphore::new(self.cfg.concurrency.max(1)));
        let limiter = (self.cfg.qps > 0).then(|| RateLimiter::new(self.cfg.qps));

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let sem = Arc::clone(&sem);
            let limiter = limiter.clone();
            let this = self.clone();
            handles.push((
                id,
                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.ok();
                    if let Some(l) = limiter {
                        l.acquire().await;
                    }
                    this.check(id, None).await
                }),
            ));
        }

        let mut out = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.await {
                Ok(resp) => out.push(resp),
                Err(e) => {
                    tracing::error!(host_service_id = id, error = %e, "check task panicked");
                    out.push(CheckResponse::failed(id, None));
                }
            }
        }
        out
    }

    /// Checks every active binding of every host.
    pub async fn run_active(&self) -> Result<Vec<CheckResponse>, CheckError> {
        let hosts = store_call(&self.store, self.cfg.store_timeout, |s| s.get_all_hosts()).await?;
        let ids: Vec<_> = hosts
            .iter()
            .flat_map(|h| h.host_services.iter())
            .filter(|hs| hs.active)
            .map(|hs| hs.id)
            .collect();
        tracing::info!(count = ids.len(), "running active checks");
        Ok(self.run_many(ids).await)
    }
}
