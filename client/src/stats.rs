//! Typed read-only bindings for the explorer stats API.
//!
//! The paging and filter parameters mirror the remote API directly; callers
//! pick limits and offsets, nothing here caches or pages on its own.

use crate::{STATS_TIMEOUT_SECS, http_client_with_timeout, trim_base_url};
use nutcracker_types::{
    BoxDetail, BoxInfo, BoxesPage, LeaderboardPage, SortBy, SortOrder, WalletBoxesPage, WalletStats,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    /// The explorer answered with a non-success status.
    #[error("explorer returned HTTP {status}")]
    Http { status: u16 },
    /// The request never produced a decodable success response.
    #[error("explorer request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Client for the read-only explorer endpoints.
#[derive(Debug, Clone)]
pub struct StatsClient {
    base_url: String,
    client: reqwest::Client,
}

impl StatsClient {
    /// Build a client against the given explorer base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url: trim_base_url(&base_url.into()),
            client: http_client_with_timeout(STATS_TIMEOUT_SECS)?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `/box/latest` - the box currently in play.
    pub async fn latest_box(&self) -> Result<BoxInfo, StatsError> {
        self.get_json("/box/latest", &[]).await
    }

    /// GET `/box` - recent boxes, newest first.
    pub async fn recent_boxes(
        &self,
        limit: u32,
        offset: u32,
        exclude_burned: bool,
    ) -> Result<BoxesPage, StatsError> {
        self.get_json(
            "/box",
            &[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("exclude_burned", exclude_burned.to_string()),
            ],
        )
        .await
    }

    /// GET `/box/id/{id}` - one box with its contributor list.
    ///
    /// Event history is always excluded; nothing downstream renders it.
    pub async fn box_detail(&self, box_id: &str) -> Result<BoxDetail, StatsError> {
        let path = format!("/box/id/{box_id}");
        self.get_json(
            &path,
            &[
                ("exclude_contributors", "false".to_string()),
                ("exclude_events", "true".to_string()),
            ],
        )
        .await
    }

    /// GET `/leaderboard` - contributor rankings.
    pub async fn leaderboard(
        &self,
        sort_by: SortBy,
        order: SortOrder,
        limit: u32,
        offset: u32,
    ) -> Result<LeaderboardPage, StatsError> {
        self.get_json(
            "/leaderboard",
            &[
                ("sort_by", sort_by.as_str().to_string()),
                ("order", order.as_str().to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }

    /// GET `/wallet/{address}` - aggregate counters for one wallet.
    pub async fn wallet_stats(&self, address: &str) -> Result<WalletStats, StatsError> {
        let path = format!("/wallet/{address}");
        self.get_json(&path, &[]).await
    }

    /// GET `/wallet/{address}/boxes` - the wallet's contribution history.
    pub async fn wallet_boxes(
        &self,
        address: &str,
        limit: u32,
        offset: u32,
    ) -> Result<WalletBoxesPage, StatsError> {
        let path = format!("/wallet/{address}/boxes");
        self.get_json(
            &path,
            &[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("is_opener", "false".to_string()),
                ("exclude_burned", "false".to_string()),
            ],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, StatsError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), path, "explorer request failed");
            return Err(StatsError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}
