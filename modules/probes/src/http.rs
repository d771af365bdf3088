use crate::{ProbeError, ProbeOptions, ProbeOutcome};
use reqwest::{redirect::Policy, Client, StatusCode};
use vigil_core::Status;

/// Drops one trailing `/` and forces plain http, whatever scheme was supplied.
pub fn normalize_http_target(url: &str) -> String {
    let url = url.strip_suffix('/').unwrap_or(url);
    match url.strip_prefix("https://") {
        Some(rest) => format!("http://{rest}"),
        None => url.to_string(),
    }
}

/// Drops one trailing `/` and forces https.
pub fn normalize_https_target(url: &str) -> String {
    let url = url.strip_suffix('/').unwrap_or(url);
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

fn build_client(opts: &ProbeOptions, https_only: bool) -> Result<Client, ProbeError> {
    Ok(Client::builder()
        .redirect(Policy::limited(10))
        .timeout(opts.timeout)
        .user_agent(opts.user_agent.clone())
        .https_only(https_only)
        .build()?)
}

async fn get_and_classify(client: &Client, url: &str) -> ProbeOutcome {
    match client.get(url).send().await {
        Ok(resp) => {
            let status = resp.status();
            let health = if status == StatusCode::OK { Status::Healthy } else { Status::Problem };
            ProbeOutcome::new(health, format!("{url} - {status} "))
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "request failed");
            ProbeOutcome::new(Status::Problem, format!("{url} - error connecting "))
        }
    }
}

#[derive(Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(opts: &ProbeOptions) -> Result<Self, ProbeError> {
        Ok(HttpProbe { client: build_client(opts, false)? })
    }

    pub async fn probe(&self, target: &str) -> ProbeOutcome {
        let url = normalize_http_target(target);
        get_and_classify(&self.client, &url).await
    }
}

/// Same classification as [`HttpProbe`], but the request must complete a TLS handshake.
#[derive(Clone)]
pub struct HttpsProbe {
    client: Client,
}

impl HttpsProbe {
    pub fn new(opts: &ProbeOptions) -> Result<Self, ProbeError> {
        Ok(HttpsProbe { client: build_client(opts, true)? })
    }

    pub async fn probe(&self, target: &str) -> ProbeOutcome {
        let url = normalize_https_target(target);
        get_and_classify(&self.client, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn opts(timeout_ms: u64) -> ProbeOptions {
        ProbeOptions { timeout: Duration::from_millis(timeout_ms), ..Default::default() }
    }

    async fn server_answering(code: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(code))
            .mount(&server)
            .await;
        server
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[test]
    fn strips_trailing_slash() {
        assert_eq!(normalize_http_target("http://example.com/"), "http://example.com");
        assert_eq!(normalize_http_target("http://example.com//"), "http://example.com/");
    }

    #[test]
    fn forces_plaintext_scheme() {
        assert_eq!(normalize_http_target("https://example.com"), "http://example.com");
        assert_eq!(normalize_http_target("https://example.com/"), "http://example.com");
        assert_eq!(normalize_https_target("http://example.com/"), "https://example.com");
    }

    #[tokio::test]
    async fn ok_response_is_healthy() {
        let server = server_answering(200).await;
        let probe = HttpProbe::new(&opts(2_000)).unwrap();
        let out = probe.probe(&format!("{}/", server.uri())).await;
        assert_eq!(out.status, Status::Healthy);
        assert_eq!(out.message, format!("{} - 200 OK ", server.uri()));
    }

    #[tokio::test]
    async fn https_target_is_probed_over_http() {
        let server = server_answering(200).await;
        let probe = HttpProbe::new(&opts(2_000)).unwrap();
        let target = server.uri().replacen("http://", "https://", 1);
        let out = probe.probe(&target).await;
        assert_eq!(out.status, Status::Healthy);
        assert!(out.message.starts_with(&server.uri()));
    }

    #[tokio::test]
    async fn non_ok_response_is_a_problem() {
        let server = server_answering(503).await;
        let probe = HttpProbe::new(&opts(2_000)).unwrap();
        let out = probe.probe(&server.uri()).await;
        assert_eq!(out.status, Status::Problem);
        assert_eq!(out.message, format!("{} - 503 Service Unavailable ", server.uri()));
    }

    #[tokio::test]
    async fn refused_connection_is_a_problem() {
        let url = closed_port_url();
        let probe = HttpProbe::new(&opts(2_000)).unwrap();
        let out = probe.probe(&url).await;
        assert_eq!(out.status, Status::Problem);
        assert!(out.message.ends_with("error connecting "));
    }

    #[tokio::test]
    async fn slow_target_is_cut_off_by_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let probe = HttpProbe::new(&opts(200)).unwrap();
        let started = std::time::Instant::now();
        let out = probe.probe(&server.uri()).await;
        assert_eq!(out.status, Status::Problem);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn https_probe_fails_against_plaintext_server() {
        let server = server_answering(200).await;
        let probe = HttpsProbe::new(&opts(2_000)).unwrap();
        let out = probe.probe(&server.uri()).await;
        assert_eq!(out.status, Status::Problem);
        assert!(out.message.starts_with("https://127.0.0.1:"));
        assert!(out.message.ends_with("error connecting "));
    }
}
