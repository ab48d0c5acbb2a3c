// src/checker/outcome.rs
// =============================================================================
// The vocabulary every other module speaks: how a link check ended.
//
// An Outcome is a plain label. A ProbeOutcome is one network attempt: the
// label plus whatever the remote told us (status code, error text, and a
// retry-after hint when the server asked us to slow down).
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Final classification of a link check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// 2xx after following redirects
    Ok,
    /// 4xx: the resource is gone or refuses us; never retried
    ClientError,
    /// 5xx, connection reset/refused, or a malformed response
    ServerError,
    /// Transport timeout, or cancelled by the run deadline
    Timeout,
    /// Host name did not resolve
    DnsFailure,
    /// Redirect cap exceeded, or the redirect target was unreachable
    RedirectLoop,
    /// Remote (429) or local rate limiter refused the request
    RateLimited,
    /// A maintainer override decided the verdict; no request was made
    Overridden,
    /// A maintainer override asked us not to check this resource
    Skipped,
}

impl Outcome {
    /// Outcomes worth another attempt after a backoff delay.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Outcome::ServerError | Outcome::Timeout | Outcome::DnsFailure | Outcome::RateLimited
        )
    }

    /// True for outcomes that mean "the link is dead" on their own.
    ///
    /// `Overridden` is not listed: whether an override counts as a failure
    /// depends on its forced status, which the result carries separately.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::ClientError
                | Outcome::ServerError
                | Outcome::Timeout
                | Outcome::DnsFailure
                | Outcome::RedirectLoop
                | Outcome::RateLimited
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::ClientError => "client-error",
            Outcome::ServerError => "server-error",
            Outcome::Timeout => "timeout",
            Outcome::DnsFailure => "dns-failure",
            Outcome::RedirectLoop => "redirect-loop",
            Outcome::RateLimited => "rate-limited",
            Outcome::Overridden => "overridden",
            Outcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single network attempt against one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub outcome: Outcome,
    /// HTTP status of the final response, if we got one
    pub status_code: Option<u16>,
    pub message: Option<String>,
    /// Server-provided hint (Retry-After / X-RateLimit-Reset)
    pub retry_after: Option<Duration>,
}

impl ProbeOutcome {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            status_code: None,
            message: None,
            retry_after: None,
        }
    }

    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }
}
