//! Core types shared by the store, the probes and the check dispatcher.

pub mod clock;
pub mod evaluate;
pub mod ratelimiter;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use evaluate::{evaluate, Transition};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown status: {0:?}")]
    Status(String),
    #[error("unknown schedule unit: {0:?}")]
    ScheduleUnit(String),
    #[error("unknown service kind: {0:?}")]
    ServiceKind(String),
}

/// Health of a host-service binding. `Pending` is only ever the initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Healthy,
    Warning,
    Problem,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Pending, Status::Healthy, Status::Warning, Status::Problem];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Healthy => "healthy",
            Status::Warning => "warning",
            Status::Problem => "problem",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "healthy" => Ok(Status::Healthy),
            "warning" => Ok(Status::Warning),
            "problem" => Ok(Status::Problem),
            other => Err(ParseError::Status(other.to_string())),
        }
    }
}

/// The kind of check a service row stands for. Row ids are fixed by the seed migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Http,
    Https,
    SslCertificate,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Http, ServiceKind::Https, ServiceKind::SslCertificate];

    pub fn id(self) -> i64 {
        match self {
            ServiceKind::Http => 1,
            ServiceKind::Https => 2,
            ServiceKind::SslCertificate => 3,
        }
    }

    /// `None` for ids that have no probe behind them.
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ServiceKind::Http => "HTTP",
            ServiceKind::Https => "HTTPS",
            ServiceKind::SslCertificate => "SSL Certificate",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "1" => Ok(ServiceKind::Http),
            "https" | "2" => Ok(ServiceKind::Https),
            "ssl" | "tls" | "ssl_certificate" | "cert" | "3" => Ok(ServiceKind::SslCertificate),
            _ => Err(ParseError::ServiceKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleUnit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
}

impl ScheduleUnit {
    pub fn code(self) -> &'static str {
        match self {
            ScheduleUnit::Seconds => "s",
            ScheduleUnit::Minutes => "m",
            ScheduleUnit::Hours => "h",
            ScheduleUnit::Days => "d",
        }
    }
}

impl fmt::Display for ScheduleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl FromStr for ScheduleUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(ScheduleUnit::Seconds),
            "m" => Ok(ScheduleUnit::Minutes),
            "h" => Ok(ScheduleUnit::Hours),
            "d" => Ok(ScheduleUnit::Days),
            other => Err(ParseError::ScheduleUnit(other.to_string())),
        }
    }
}

/// How often a binding is meant to be checked, e.g. every 3 minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub number: u32,
    pub unit: ScheduleUnit,
}

impl Schedule {
    /// Returns `None` when `number` is zero.
    pub fn new(number: u32, unit: ScheduleUnit) -> Option<Self> {
        (number > 0).then_some(Schedule { number, unit })
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule { number: 3, unit: ScheduleUnit::Minutes }
    }
}
