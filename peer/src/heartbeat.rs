use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::DirectoryClient;

/// Pings the directory every `interval` until `token` is cancelled. Failures
/// are logged and the loop carries on.
pub async fn run(client: DirectoryClient, interval: Duration, token: CancellationToken) {
    log::debug!("heartbeat loop started ({:?})", interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        tokio::select! {
            _ = token.cancelled() => break,
            result = client.heartbeat() => {
                if let Err(err) = result {
                    log::warn!("heartbeat failed: {}", err);
                }
            }
        }
    }
    log::debug!("heartbeat loop stopped");
}
