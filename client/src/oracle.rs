//! Submission client for the guess oracle.
//!
//! One authenticated POST per batch, classified into a
//! [`SubmissionOutcome`]. Every reachable response shape is an expected
//! result for the engine to log, so `submit_guesses` is infallible by
//! construction: transport failures are an outcome, not an `Err`.
//!
//! No retries here. The engine's fixed cycle cadence is the only pacing,
//! which keeps at most one submission in flight per engine.

use crate::{SUBMIT_TIMEOUT_SECS, http_client_with_timeout, read_capped_body, trim_base_url};
use nutcracker_types::{ApiKey, SubmissionOutcome};
use reqwest::StatusCode;

const SUBMIT_PATH: &str = "/submit_guesses";
const API_KEY_HEADER: &str = "x-api-key";

/// Client for the oracle's batch submission endpoint.
#[derive(Debug, Clone)]
pub struct OracleClient {
    base_url: String,
    client: reqwest::Client,
}

impl OracleClient {
    /// Build a client against the given oracle base URL.
    ///
    /// The request timeout is [`SUBMIT_TIMEOUT_SECS`]; the oracle holds the
    /// connection while it evaluates the batch.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url: trim_base_url(&base_url.into()),
            client: http_client_with_timeout(SUBMIT_TIMEOUT_SECS)?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit one guess batch, classifying the HTTP outcome.
    ///
    /// - 202 → [`SubmissionOutcome::Accepted`]
    /// - 401 → [`SubmissionOutcome::AuthFailed`]
    /// - any other status → [`SubmissionOutcome::Rejected`] with the body
    ///   (capped) preserved for the log
    /// - no response at all → [`SubmissionOutcome::TransportError`]
    pub async fn submit_guesses(&self, batch: &[String], key: &ApiKey) -> SubmissionOutcome {
        let url = format!("{}{SUBMIT_PATH}", self.base_url);
        tracing::debug!(batch_len = batch.len(), "submitting guess batch");

        let result = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, key.as_str())
            .json(&batch)
            .send()
            .await;

        match result {
            Ok(response) => match response.status() {
                StatusCode::ACCEPTED => SubmissionOutcome::Accepted,
                StatusCode::UNAUTHORIZED => SubmissionOutcome::AuthFailed,
                status => {
                    let body = read_capped_body(response).await;
                    tracing::debug!(status = status.as_u16(), "oracle rejected batch");
                    SubmissionOutcome::Rejected {
                        status: status.as_u16(),
                        body,
                    }
                }
            },
            Err(err) => SubmissionOutcome::TransportError(describe_transport_error(&err)),
        }
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out after {SUBMIT_TIMEOUT_SECS}s")
    } else {
        err.to_string()
    }
}
