//! Core domain types for Nutcracker.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod stats;
pub use stats::{
    BoxContributor, BoxDetail, BoxInfo, BoxesPage, Contributor, LeaderboardPage, SortBy, SortOrder,
    WalletBox, WalletBoxesPage, WalletStats, elapsed_hms, short_wallet,
};

use chrono::{DateTime, SecondsFormat, Utc};

// ============================================================================
// Credentials
// ============================================================================

/// Opaque oracle API token.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing
/// accidental credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the key is empty or whitespace-only. A blank key must
    /// block engine start.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Account credentials read at startup.
///
/// The engine only ever reads these; settings mutation is outside its scope
/// and a new engine is built for changed credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: ApiKey,
    /// Wallet address used for display lookups, not for submission auth.
    pub wallet_address: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(api_key: impl Into<String>, wallet_address: Option<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            wallet_address,
        }
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_blank()
    }
}

// ============================================================================
// Submission Outcomes
// ============================================================================

/// Classified result of one batch submission.
///
/// This is a sum type that structurally distinguishes the four ways a
/// submission can land, ensuring callers cannot accidentally treat a fatal
/// auth failure as a transient rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Oracle accepted the batch (HTTP 202).
    Accepted,
    /// Oracle answered with any other status; non-fatal, next cycle proceeds.
    Rejected { status: u16, body: String },
    /// Credentials were refused (HTTP 401); fatal to the loop.
    AuthFailed,
    /// No response was obtained (connect failure or timeout); non-fatal.
    TransportError(String),
}

impl SubmissionOutcome {
    /// True for outcomes that must force the loop to stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthFailed)
    }

    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

// ============================================================================
// Engine State & Events
// ============================================================================

/// Run state of the guessing loop. `Stopped` is both initial and resumable;
/// there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

impl EngineState {
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timestamped line in the engine log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// Render as a display line: ISO-8601 timestamp, space, message.
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.message
        )
    }
}

/// Events the engine emits for the UI shell.
///
/// This is a closed enum - only engine code constructs these. The shell
/// subscribes to the receiving end of the event channel and renders; it
/// never mutates engine state through this interface.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A line was appended to the engine log.
    Log(LogEntry),
    /// The run state changed (start, stop, or forced stop on auth failure).
    StateChanged(EngineState),
    /// Fresh latest-box data from the display poller.
    BoxUpdate(BoxInfo),
    /// Fresh wallet statistics from the display poller.
    WalletUpdate(WalletStats),
}

#[cfg(test)]
mod tests {
    use super::*;

    // ApiKey tests

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret-token");
        let debug = format!("{key:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("super-secret-token", Some("9xQeWvG8".to_string()));
        let debug = format!("{creds:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("9xQeWvG8"), "wallet address is not a secret");
    }

    #[test]
    fn blank_api_key_detected() {
        assert!(ApiKey::new("").is_blank());
        assert!(ApiKey::new("   ").is_blank());
        assert!(!ApiKey::new("k").is_blank());
    }

    // SubmissionOutcome tests

    #[test]
    fn only_auth_failure_is_fatal() {
        assert!(SubmissionOutcome::AuthFailed.is_fatal());
        assert!(!SubmissionOutcome::Accepted.is_fatal());
        assert!(
            !SubmissionOutcome::Rejected {
                status: 500,
                body: String::new()
            }
            .is_fatal()
        );
        assert!(!SubmissionOutcome::TransportError("timeout".to_string()).is_fatal());
    }

    #[test]
    fn only_a_202_outcome_counts_as_accepted() {
        assert!(SubmissionOutcome::Accepted.is_accepted());
        assert!(!SubmissionOutcome::AuthFailed.is_accepted());
        assert!(
            !SubmissionOutcome::Rejected {
                status: 200,
                body: "ok".to_string()
            }
            .is_accepted()
        );
    }

    // EngineState tests

    #[test]
    fn engine_state_defaults_to_stopped() {
        assert_eq!(EngineState::default(), EngineState::Stopped);
        assert!(!EngineState::default().is_running());
    }

    #[test]
    fn engine_state_display() {
        assert_eq!(EngineState::Stopped.to_string(), "stopped");
        assert_eq!(EngineState::Running.to_string(), "running");
    }

    // LogEntry tests

    #[test]
    fn log_entry_format_has_timestamp_prefix() {
        let entry = LogEntry::new("✅ Guesses accepted");
        let line = entry.format();
        assert!(line.ends_with("✅ Guesses accepted"));
        // RFC 3339 with millisecond precision and a Z suffix before the message.
        let (stamp, _) = line.split_once(' ').unwrap();
        assert!(stamp.ends_with('Z'));
        assert!(stamp.contains('T'));
    }
}
