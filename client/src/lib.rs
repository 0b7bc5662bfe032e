//! HTTP clients for the two remote services Nutcracker talks to.
//!
//! # Architecture
//!
//! - [`oracle`] - the authenticated submission client. One POST per guess
//!   batch; the HTTP outcome is classified into a
//!   [`nutcracker_types::SubmissionOutcome`] rather than an error, because
//!   every response shape is an expected, loggable result.
//! - [`stats`] - typed read-only bindings for the public explorer API
//!   (boxes, leaderboard, wallets). Failures here are ordinary errors; the
//!   data is display-only.
//!
//! Both clients are built from a shared hardened builder with connection
//! pooling and TCP keepalive, differing only in request timeout: submissions
//! wait out the oracle's long evaluation window, stats calls fail fast.
//!
//! Neither client retries. Pacing lives entirely in the engine's fixed
//! cycle cadence, so a failed request surfaces immediately.

pub mod oracle;
pub mod stats;

pub use oracle::OracleClient;
pub use stats::{StatsClient, StatsError};

use std::time::Duration;

/// Canonical oracle API base URL.
pub const DEFAULT_ORACLE_URL: &str = "https://api.erwin.lol";
/// Canonical explorer API base URL.
pub const DEFAULT_STATS_URL: &str = "https://ewnscan.hexato.io";

/// Oracle evaluation can take the better part of two minutes under load.
pub const SUBMIT_TIMEOUT_SECS: u64 = 120;
/// Stats reads are display-only and should fail fast.
pub const STATS_TIMEOUT_SECS: u64 = 30;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Rejection bodies end up in the engine log verbatim; cap what a
/// misbehaving server can push into it.
const MAX_REJECTION_BODY_BYTES: usize = 8 * 1024;

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub(crate) fn http_client_with_timeout(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Read a response body up to [`MAX_REJECTION_BODY_BYTES`], marking
/// truncation. Read errors mid-body return what was collected so far.
pub(crate) async fn read_capped_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_REJECTION_BODY_BYTES {
            body.truncate(MAX_REJECTION_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Normalize a configured base URL so path concatenation is predictable.
pub(crate) fn trim_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_base_url_strips_trailing_slashes() {
        assert_eq!(trim_base_url("https://api.erwin.lol/"), "https://api.erwin.lol");
        assert_eq!(trim_base_url("https://api.erwin.lol"), "https://api.erwin.lol");
        assert_eq!(trim_base_url("  http://localhost:8080// "), "http://localhost:8080");
    }
}
