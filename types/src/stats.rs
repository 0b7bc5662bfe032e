//! Record types for the read-only explorer API, plus small display helpers.
//!
//! Field names mirror the remote JSON exactly; timestamps stay as the raw
//! strings the API sends, with parse helpers for callers that need real
//! `DateTime` values. Display data is best-effort, so a malformed timestamp
//! degrades to `None` instead of failing the whole record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest-box summary returned by `/box/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxInfo {
    pub box_id: String,
    /// False while the box is unopened.
    pub state: bool,
    pub state_str: String,
    pub spawned_at: String,
}

impl BoxInfo {
    #[must_use]
    pub fn spawned_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.spawned_at)
    }
}

/// Full box record returned by `/box` pages and `/box/id/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxDetail {
    pub box_id: String,
    pub state: bool,
    pub state_str: String,
    pub spawned_at: String,
    pub opened_at: Option<String>,
    pub decay_number: Option<i64>,
    pub opener_wallet: Option<String>,
    pub is_burned: bool,
    pub contents: Option<f64>,
    pub password: Option<String>,
    #[serde(default)]
    pub contributor_count: u64,
    /// Only populated by `/box/id/{id}` when contributors are not excluded.
    #[serde(default)]
    pub contributors: Vec<BoxContributor>,
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

impl BoxDetail {
    #[must_use]
    pub fn spawned_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.spawned_at)
    }

    #[must_use]
    pub fn opened_at_utc(&self) -> Option<DateTime<Utc>> {
        self.opened_at.as_deref().and_then(parse_timestamp)
    }
}

/// Per-box contributor row inside a `BoxDetail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxContributor {
    pub wallet_id: String,
    pub guess_count: u64,
    pub reward: f64,
}

/// One page of box records from `/box`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxesPage {
    pub total: u64,
    pub boxes: Vec<BoxDetail>,
}

/// Leaderboard row from `/leaderboard`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub wallet_id: String,
    pub guess_count: u64,
    pub open_count: u64,
    pub burn_count: u64,
    pub contribution_count: u64,
    pub tokens_earned: f64,
}

/// One page of leaderboard rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub total: u64,
    pub contributors: Vec<Contributor>,
}

/// Aggregate counters for one wallet from `/wallet/{address}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletStats {
    pub guess_count: u64,
    pub open_count: u64,
    pub burn_count: u64,
    pub contribution_count: u64,
    pub tokens_earned: f64,
}

/// Contribution-history row from `/wallet/{address}/boxes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBox {
    pub box_id: String,
    pub state_str: String,
    pub is_burned: bool,
    pub opener_wallet: Option<String>,
    pub rewards: f64,
    pub guesses: u64,
    pub spawned_at: String,
    pub opened_at: Option<String>,
}

/// One page of wallet contribution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBoxesPage {
    pub total: u64,
    pub boxes: Vec<WalletBox>,
}

/// Leaderboard sort column, as accepted by the `sort_by` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    GuessCount,
    #[default]
    OpenCount,
    BurnCount,
    ContributionCount,
    TokensEarned,
}

impl SortBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GuessCount => "guess_count",
            Self::OpenCount => "open_count",
            Self::BurnCount => "burn_count",
            Self::ContributionCount => "contribution_count",
            Self::TokensEarned => "tokens_earned",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "guess_count" | "guesses" => Some(Self::GuessCount),
            "open_count" | "opens" => Some(Self::OpenCount),
            "burn_count" | "burns" => Some(Self::BurnCount),
            "contribution_count" | "contributions" => Some(Self::ContributionCount),
            "tokens_earned" | "tokens" => Some(Self::TokensEarned),
            _ => None,
        }
    }
}

/// Leaderboard sort direction, as accepted by the `order` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Shorten a wallet address for tabular display: first five characters,
/// ellipsis, last five. Addresses too short to shorten pass through intact.
#[must_use]
pub fn short_wallet(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}...{tail}")
}

/// Format the span between two instants as `HH:MM:SS`. Negative spans
/// (clock skew between us and the server) clamp to zero.
#[must_use]
pub fn elapsed_hms(from: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = (now - from).num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
