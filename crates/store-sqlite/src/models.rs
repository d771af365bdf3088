use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use vigil_core::{Schedule, ServiceKind, Status};

pub type HostId = i64;
pub type ServiceId = i64;
pub type HostServiceId = i64;

/// Fields supplied when registering a host; ids and timestamps are assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHost {
    pub host_name: String,
    pub canonical_name: String,
    pub url: String,
    pub ip: String,
    pub ipv6: String,
    pub location: String,
    pub os: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub host_name: String,
    pub canonical_name: String,
    pub url: String,
    pub ip: String,
    pub ipv6: String,
    pub location: String,
    pub os: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub host_services: Vec<HostService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub service_name: String,
    pub active: bool,
    pub icon: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Service {
    pub fn kind(&self) -> Option<ServiceKind> {
        ServiceKind::from_id(self.id)
    }
}

/// A monitored binding of one service to one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostService {
    pub id: HostServiceId,
    pub host_id: HostId,
    pub service_id: ServiceId,
    pub active: bool,
    pub schedule: Schedule,
    #[serde(with = "time::serde::rfc3339")]
    pub last_check: OffsetDateTime,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub service: Service,
}

/// Row of the by-status listing: an active binding with its host and service names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusRow {
    pub host_name: String,
    pub service_name: String,
    #[serde(flatten)]
    pub host_service: HostService,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub healthy: i64,
    pub warning: i64,
    pub problem: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.healthy + self.warning + self.problem
    }

    pub fn get(&self, status: Status) -> i64 {
        match status {
            Status::Pending => self.pending,
            Status::Healthy => self.healthy,
            Status::Warning => self.warning,
            Status::Problem => self.problem,
        }
    }
}
