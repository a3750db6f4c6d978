//! Trailing-edge debouncing over a [`Notify`] signal.

use std::time::Duration;
use tokio::sync::Notify;

/// Wait for a trigger, then until `quiet` passes without another one.
///
/// Triggers that arrive while nobody is waiting are not lost: `Notify`
/// keeps one permit, so a burst collapses into a single pending trigger.
pub async fn settled(signal: &Notify, quiet: Duration) {
    signal.notified().await;
    loop {
        tokio::select! {
            _ = signal.notified() => {}
            _ = tokio::time::sleep(quiet) => return,
        }
    }
}
