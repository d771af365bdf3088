use crate::{ProbeError, ProbeOptions, ProbeOutcome};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use url::Url;
use vigil_core::Status;

const SECS_PER_DAY: i64 = 86_400;

/// Host and port to handshake with. Only an explicit port on an https URL is
/// honoured; everything else goes to 443.
pub fn tls_target(target: &str) -> Result<(String, u16), ProbeError> {
    let parsed = Url::parse(target)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{target}")).ok());
    let url = parsed.ok_or_else(|| ProbeError::InvalidTarget(target.to_string()))?;
    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProbeError::InvalidTarget(target.to_string()))?;
    let port = url.port().filter(|_| url.scheme() == "https").unwrap_or(443);
    Ok((host, port))
}

pub fn classify_expiry(days_left: i64, warning_days: i64) -> Status {
    if days_left < 0 {
        Status::Problem
    } else if days_left <= warning_days {
        Status::Warning
    } else {
        Status::Healthy
    }
}

/// Outcome for a leaf whose `notAfter` is `not_after`, both instants in unix seconds.
pub fn expiry_outcome(host: &str, not_after: i64, now: i64, warning_days: i64) -> ProbeOutcome {
    let days_left = (not_after - now).div_euclid(SECS_PER_DAY);
    let message = if days_left < 0 {
        format!("{host} - certificate expired {} days ago ", -days_left)
    } else {
        format!("{host} - certificate expires in {days_left} days ")
    };
    ProbeOutcome::new(classify_expiry(days_left, warning_days), message)
}

fn cert_not_after(der: &[u8]) -> Option<i64> {
    use x509_parser::prelude::*;
    let (_, x509) = X509Certificate::from_der(der).ok()?;
    Some(x509.validity().not_after.timestamp())
}

/// Webpki chain and name verification, evaluated at the last second an expired
/// leaf was still valid. Expired certificates complete the handshake so their
/// age can be reported; anything else webpki rejects still fails.
#[derive(Debug)]
struct ExpiryTolerantVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for ExpiryTolerantVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let at = match cert_not_after(end_entity.as_ref()) {
            Some(not_after) if not_after < now.as_secs() as i64 => {
                UnixTime::since_unix_epoch(Duration::from_secs(not_after.saturating_sub(1).max(0) as u64))
            }
            _ => now,
        };
        self.inner.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, at)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

#[derive(Debug)]
enum HandshakeError {
    Connect,
    Handshake(String),
    NoCertificate,
}

/// Handshakes against the webpki roots and inspects the leaf certificate's expiry.
#[derive(Clone)]
pub struct TlsCertProbe {
    connector: TlsConnector,
    timeout: Duration,
    warning_days: i64,
}

impl TlsCertProbe {
    pub fn new(opts: &ProbeOptions) -> Result<Self, ProbeError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(opts, roots)
    }

    pub fn with_roots(opts: &ProbeOptions, roots: RootCertStore) -> Result<Self, ProbeError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = client_config(provider, roots).map_err(ProbeError::Tls)?;
        Ok(TlsCertProbe {
            connector: TlsConnector::from(Arc::new(config)),
            timeout: opts.timeout,
            warning_days: opts.cert_warning_days,
        })
    }

    pub async fn probe(&self, target: &str) -> ProbeOutcome {
        let (host, port) = match tls_target(target) {
            Ok(hp) => hp,
            Err(e) => return ProbeOutcome::new(Status::Problem, format!("{target} - {e} ")),
        };
        let not_after = match timeout(self.timeout, self.leaf_not_after(&host, port)).await {
            Ok(Ok(ts)) => ts,
            Ok(Err(HandshakeError::Handshake(reason))) => {
                tracing::debug!(%host, port, %reason, "tls handshake failed");
                return ProbeOutcome::new(Status::Problem, format!("{host} - tls handshake failed "));
            }
            Ok(Err(HandshakeError::NoCertificate)) => {
                return ProbeOutcome::new(Status::Problem, format!("{host} - no certificate presented "));
            }
            Ok(Err(HandshakeError::Connect)) | Err(_) => {
                return ProbeOutcome::new(Status::Problem, format!("{host} - error connecting "));
            }
        };
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        expiry_outcome(&host, not_after, now, self.warning_days)
    }

    async fn leaf_not_after(&self, host: &str, port: u16) -> Result<i64, HandshakeError> {
        let stream = TcpStream::connect((host, port)).await.map_err(|_| HandshakeError::Connect)?;
        let server_name = match host.parse::<std::net::IpAddr>() {
            Ok(ip) => ServerName::IpAddress(ip.into()),
            Err(_) => ServerName::try_from(host.to_owned()).map_err(|e| HandshakeError::Handshake(e.to_string()))?,
        };
        let tls = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(|e| HandshakeError::Handshake(e.to_string()))?;
        let certs = tls.get_ref().1.peer_certificates().ok_or(HandshakeError::NoCertificate)?;
        let leaf = certs.first().ok_or(HandshakeError::NoCertificate)?;
        cert_not_after(leaf.as_ref()).ok_or_else(|| HandshakeError::Handshake("unparseable leaf certificate".into()))
    }
}

fn client_config(provider: Arc<CryptoProvider>, roots: RootCertStore) -> Result<ClientConfig, String> {
    let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
        .build()
        .map_err(|e| e.to_string())?;
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| e.to_string())?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(ExpiryTolerantVerifier { inner }))
        .with_no_client_auth())
}
