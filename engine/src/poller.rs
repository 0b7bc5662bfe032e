//! Display pollers for the stats screens.
//!
//! Each poller fetches once immediately, emits the result as an engine
//! event, then sleeps the configured interval. A failed fetch skips the
//! tick; the poller never dies on its own and is torn down by aborting
//! its task when the engine drops.

use crate::controller::Shared;
use nutcracker_types::EngineEvent;
use std::sync::Arc;

pub(crate) async fn poll_latest_box(shared: Arc<Shared>) {
    loop {
        match shared.stats.latest_box().await {
            Ok(info) => {
                tracing::debug!(box_id = %info.box_id, "latest box refreshed");
                if shared
                    .events
                    .try_send(EngineEvent::BoxUpdate(info))
                    .is_err()
                {
                    tracing::debug!("event channel full or closed; box update not delivered");
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "latest box poll failed; retrying next interval");
            }
        }
        tokio::time::sleep(shared.config.poll_interval).await;
    }
}

pub(crate) async fn poll_wallet_stats(shared: Arc<Shared>, address: String) {
    loop {
        match shared.stats.wallet_stats(&address).await {
            Ok(stats) => {
                if shared
                    .events
                    .try_send(EngineEvent::WalletUpdate(stats))
                    .is_err()
                {
                    tracing::debug!("event channel full or closed; wallet update not delivered");
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "wallet stats poll failed; retrying next interval");
            }
        }
        tokio::time::sleep(shared.config.poll_interval).await;
    }
}
