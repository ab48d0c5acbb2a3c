// src/checker/http.rs
// =============================================================================
// This module checks if a single URL is alive by making HTTP requests.
//
// Key functionality:
// - Makes an HTTP HEAD request first (lightweight, no body download)
// - Falls back to GET when the server rejects HEAD (405, 501, ...)
// - github.com repo/file links are checked through the REST API instead
// - Follows a bounded number of redirects
// - Classifies every failure into an Outcome (404, timeout, DNS, ...)
//
// The prober never retries and never sleeps: one call = one attempt.
// Retrying, backoff and rate limiting are the engine's job (see throttle/).
// =============================================================================

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use std::error::Error as _;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::outcome::{Outcome, ProbeOutcome};
use crate::github;

/// Status codes that mean "this server doesn't like HEAD", not "link is dead".
const HEAD_REJECTED: &[u16] = &[400, 403, 405, 406, 501];

/// Anything that can run one liveness check against a URL.
///
/// The orchestrator is generic over this so tests can swap in a fake that
/// never touches the network.
pub trait Prober: Send + Sync {
    fn probe(&self, url: &Url) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Knobs fixed when the HTTP client is built.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Per-request transport timeout
    pub timeout: Duration,
    /// Redirects followed before giving up with RedirectLoop
    pub max_redirects: usize,
    pub user_agent: String,
    /// Bearer token for the code-hosting API, if any
    pub code_host_token: Option<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: 5,
            user_agent: concat!("resource-link-guardian/", env!("CARGO_PKG_VERSION")).to_string(),
            code_host_token: None,
        }
    }
}

/// The real prober, backed by one pooled reqwest client.
pub struct HttpProber {
    client: Client,
    code_host_token: Option<String>,
}

impl HttpProber {
    pub fn new(settings: &ProbeSettings) -> Result<Self, reqwest::Error> {
        // One client for the whole run so connections are pooled and reused
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            code_host_token: settings.code_host_token.clone(),
        })
    }

    async fn probe_url(&self, url: &Url) -> ProbeOutcome {
        if let Some(api_url) = github::api_endpoint(url) {
            debug!(%url, api = %api_url, "probing through code-host API");
            return self.probe_code_host(&api_url).await;
        }

        match self.client.request(Method::HEAD, url.clone()).send().await {
            Ok(response) if HEAD_REJECTED.contains(&response.status().as_u16()) => {
                debug!(%url, status = response.status().as_u16(), "HEAD rejected, retrying with GET");
                self.probe_with_get(url).await
            }
            Ok(response) => analyze_response(&response),
            Err(e) => categorize_error(url, &e),
        }
    }

    // GET resolves once headers arrive; dropping the response discards the body.
    async fn probe_with_get(&self, url: &Url) -> ProbeOutcome {
        match self.client.get(url.clone()).send().await {
            Ok(response) => analyze_response(&response),
            Err(e) => categorize_error(url, &e),
        }
    }

    async fn probe_code_host(&self, api_url: &Url) -> ProbeOutcome {
        let mut request = self
            .client
            .get(api_url.clone())
            .header(ACCEPT, "application/vnd.github+json");

        if let Some(token) = &self.code_host_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => analyze_response(&response),
            Err(e) => categorize_error(api_url, &e),
        }
    }
}

impl Prober for HttpProber {
    async fn probe(&self, url: &Url) -> ProbeOutcome {
        self.probe_url(url).await
    }
}

// Analyzes the final HTTP response (after redirects) to classify the link
//
// HTTP status codes:
// - 200-299: Success
// - 300-399: Only seen here if reqwest could not follow it (no Location, 304)
// - 400-499: Client error (404 not found, etc.), 429 = slow down
// - 500-599: Server error
pub(crate) fn analyze_response(response: &Response) -> ProbeOutcome {
    classify_status(response.status(), response.headers())
}

fn classify_status(status: StatusCode, headers: &HeaderMap) -> ProbeOutcome {
    let code = status.as_u16();
    let base = |outcome: Outcome| {
        ProbeOutcome::new(outcome)
            .with_status(code)
            .with_message(format!("HTTP {}", code))
    };

    if status.is_success() {
        return base(Outcome::Ok);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let mut outcome = base(Outcome::RateLimited);
        if let Some(delay) = retry_after(headers) {
            outcome = outcome.with_retry_after(delay);
        }
        return outcome;
    }

    // GitHub signals an exhausted quota with 403 + X-RateLimit-Remaining: 0
    if status == StatusCode::FORBIDDEN && header_str(headers, "x-ratelimit-remaining") == Some("0") {
        let mut outcome = base(Outcome::RateLimited).with_message("HTTP 403 (rate limit exhausted)");
        if let Some(delay) = rate_limit_reset(headers) {
            outcome = outcome.with_retry_after(delay);
        }
        return outcome;
    }

    if status.is_redirection() {
        return base(Outcome::RedirectLoop).with_message(format!("HTTP {} could not be followed", code));
    }

    if status.is_client_error() {
        return base(Outcome::ClientError);
    }

    base(Outcome::ServerError)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, RETRY_AFTER.as_str())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<Duration> {
    let reset = header_str(headers, "x-ratelimit-reset")?.parse::<i64>().ok()?;
    let wait = reset - chrono::Utc::now().timestamp();
    Some(Duration::from_secs(wait.max(0) as u64 + 1))
}

// Categorizes transport errors from reqwest
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - Too many redirects, or a redirect target that is down
// - Connection refused/reset, garbage instead of HTTP
fn categorize_error(requested: &Url, error: &reqwest::Error) -> ProbeOutcome {
    let detail = error_chain(error);

    // error.url() is the URL being fetched when it failed; after a redirect it
    // differs from the one we asked for
    let redirected = error.url().is_some_and(|failed| failed != requested);

    let (outcome, message) = if error.is_timeout() {
        (Outcome::Timeout, "Request timed out".to_string())
    } else if error.is_redirect() {
        (Outcome::RedirectLoop, "Too many redirects".to_string())
    } else if error.is_connect() && redirected {
        (Outcome::RedirectLoop, format!("Redirect target unreachable: {}", detail))
    } else if looks_like_dns_failure(&detail) {
        (Outcome::DnsFailure, "Could not resolve hostname".to_string())
    } else if error.is_connect() {
        (Outcome::ServerError, format!("Connection failed: {}", detail))
    } else {
        (Outcome::ServerError, format!("Malformed response: {}", detail))
    };

    ProbeOutcome::new(outcome).with_message(message)
}

// reqwest's Display only shows the outer layer; the useful part
// ("dns error", "connection refused") lives in the source chain
fn error_chain(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

pub(crate) fn looks_like_dns_failure(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    [
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
        "nodename nor servname",
        "temporary failure in name resolution",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn test_prober(max_redirects: usize) -> HttpProber {
        HttpProber::new(&ProbeSettings {
            timeout: Duration::from_secs(5),
            max_redirects,
            ..ProbeSettings::default()
        })
        .unwrap()
    }

    fn url_on(server: &mockito::Server, path: &str) -> Url {
        Url::parse(&format!("{}{}", server.url(), path)).unwrap()
    }

    #[tokio::test]
    async fn test_head_success_is_ok() {
        let mut server = mockito::Server::new_async().await;
        let head = server.mock("HEAD", "/tool").with_status(200).create_async().await;

        let outcome = test_prober(5).probe(&url_on(&server, "/tool")).await;

        assert_eq!(outcome.outcome, Outcome::Ok);
        assert_eq!(outcome.status_code, Some(200));
        head.assert_async().await;
    }

    #[tokio::test]
    async fn test_head_rejected_falls_back_to_get() {
        let mut server = mockito::Server::new_async().await;
        let head = server.mock("HEAD", "/page").with_status(405).create_async().await;
        let get = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let outcome = test_prober(5).probe(&url_on(&server, "/page")).await;

        assert_eq!(outcome.outcome, Outcome::Ok);
        head.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_gone_is_client_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("HEAD", "/gone").with_status(410).create_async().await;

        let outcome = test_prober(5).probe(&url_on(&server, "/gone")).await;

        assert_eq!(outcome.outcome, Outcome::ClientError);
        assert_eq!(outcome.status_code, Some(410));
    }

    #[tokio::test]
    async fn test_forbidden_for_head_and_get_is_client_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("HEAD", "/private").with_status(403).create_async().await;
        let get = server.mock("GET", "/private").with_status(403).create_async().await;

        let outcome = test_prober(5).probe(&url_on(&server, "/private")).await;

        assert_eq!(outcome.outcome, Outcome::ClientError);
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_classified() {
        let mut server = mockito::Server::new_async().await;
        server.mock("HEAD", "/flaky").with_status(503).create_async().await;

        let outcome = test_prober(5).probe(&url_on(&server, "/flaky")).await;

        assert_eq!(outcome.outcome, Outcome::ServerError);
        assert_eq!(outcome.status_code, Some(503));
    }

    #[tokio::test]
    async fn test_too_many_requests_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/busy")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let outcome = test_prober(5).probe(&url_on(&server, "/busy")).await;

        assert_eq!(outcome.outcome, Outcome::RateLimited);
        assert_eq!(outcome.retry_after, Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_redirect_cycle_is_redirect_loop() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/a")
            .with_status(307)
            .with_header("location", "/b")
            .create_async()
            .await;
        server
            .mock("HEAD", "/b")
            .with_status(307)
            .with_header("location", "/a")
            .create_async()
            .await;

        let outcome = test_prober(3).probe(&url_on(&server, "/a")).await;

        assert_eq!(outcome.outcome, Outcome::RedirectLoop);
    }

    #[tokio::test]
    async fn test_redirect_within_cap_is_followed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/old")
            .with_status(301)
            .with_header("location", "/new")
            .create_async()
            .await;
        server.mock("HEAD", "/new").with_status(200).create_async().await;

        let outcome = test_prober(5).probe(&url_on(&server, "/old")).await;

        assert_eq!(outcome.outcome, Outcome::Ok);
    }

    #[tokio::test]
    async fn test_redirect_to_unreachable_target_is_redirect_loop() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/moved")
            .with_status(301)
            .with_header("location", &format!("http://127.0.0.1:{}/gone", port))
            .create_async()
            .await;

        let outcome = test_prober(5).probe(&url_on(&server, "/moved")).await;

        assert_eq!(outcome.outcome, Outcome::RedirectLoop);
        assert!(outcome
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("Redirect target unreachable")));
    }

    #[tokio::test]
    async fn test_refused_connection_is_server_error() {
        // Grab a free port, then close it so nothing is listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let outcome = test_prober(5).probe(&url).await;

        assert_eq!(outcome.outcome, Outcome::ServerError);
    }

    #[test]
    fn test_github_quota_exhaustion_is_rate_limited() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let outcome = classify_status(StatusCode::FORBIDDEN, &headers);
        assert_eq!(outcome.outcome, Outcome::RateLimited);

        let plain = classify_status(StatusCode::FORBIDDEN, &HeaderMap::new());
        assert_eq!(plain.outcome, Outcome::ClientError);
    }

    #[test]
    fn test_unfollowed_redirect_is_redirect_loop() {
        let outcome = classify_status(StatusCode::FOUND, &HeaderMap::new());
        assert_eq!(outcome.outcome, Outcome::RedirectLoop);
    }

    #[test]
    fn test_dns_failure_detection() {
        assert!(looks_like_dns_failure(
            "error sending request: error trying to connect: dns error: failed to lookup address information"
        ));
        assert!(looks_like_dns_failure("No such host is known. (os error 11001)"));
        assert!(!looks_like_dns_failure("error trying to connect: Connection refused (os error 111)"));
    }
}
