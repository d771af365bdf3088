//! Protocol probes. Each one tests a target and classifies its health; network
//! failures come back as a `Problem` outcome, never as an error.

mod http;
mod tls_cert;

pub use http::{normalize_http_target, normalize_https_target, HttpProbe, HttpsProbe};
pub use tls_cert::{classify_expiry, expiry_outcome, tls_target, TlsCertProbe};

use std::time::Duration;
use thiserror::Error;
use vigil_core::{ServiceKind, Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub message: String,
    pub status: Status,
}

impl ProbeOutcome {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        ProbeOutcome { status, message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("building http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("invalid target {0:?}")]
    InvalidTarget(String),
    #[error("tls setup: {0}")]
    Tls(String),
}

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub cert_warning_days: i64,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            timeout: Duration::from_secs(10),
            user_agent: format!("vigil/{}", vigil_core::version()),
            cert_warning_days: 30,
        }
    }
}

/// One probe per service kind, built once and shared by every check.
#[derive(Clone)]
pub struct ProbeSet {
    http: HttpProbe,
    https: HttpsProbe,
    tls: TlsCertProbe,
}

impl ProbeSet {
    pub fn new(opts: &ProbeOptions) -> Result<Self, ProbeError> {
        Ok(ProbeSet { http: HttpProbe::new(opts)?, https: HttpsProbe::new(opts)?, tls: TlsCertProbe::new(opts)? })
    }

    pub async fn probe(&self, kind: ServiceKind, target: &str) -> ProbeOutcome {
        let outcome = match kind {
            ServiceKind::Http => self.http.probe(target).await,
            ServiceKind::Https => self.https.probe(target).await,
            ServiceKind::SslCertificate => self.tls.probe(target).await,
        };
        tracing::debug!(?kind, url = %target, status = %outcome.status, message = %outcome.message, "probe finished");
        outcome
    }
}
