use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `tick` every `interval` until `cancel` fires.
///
/// The token is checked after each sleep and before the tick body; a tick
/// that has started always runs to completion.
pub async fn periodic<F, Fut>(cancel: &CancellationToken, interval: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        if cancel.is_cancelled() {
            return;
        }

        tick().await;
    }
}
