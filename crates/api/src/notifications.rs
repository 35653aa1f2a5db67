//! Consumer side of the order notification bus.

use placement::PublishedEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Spawns a task that logs every order notification it receives.
///
/// The task ends when every sender is gone. Lagging behind the bus only
/// loses the skipped notifications.
pub fn spawn_notification_listener(
    mut receiver: broadcast::Receiver<PublishedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(published) => {
                    metrics::counter!("order_notifications_received_total").increment(1);
                    tracing::info!(
                        topic = %published.topic,
                        event_type = published.event.event_type(),
                        order_number = %published.event.order_number,
                        "Received order notification"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification listener fell behind");
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Notification bus closed, listener stopping");
                    break;
                }
            }
        }
    })
}
