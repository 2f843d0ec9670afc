use async_trait::async_trait;
use tracing::info;

/// Outbound alert sink. Delivery failures are the implementation's concern and never
/// interrupt trading.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an HTML-formatted message.
    async fn notify(&self, message: &str);
}

/// Writes alerts to the log. Used when no chat transport is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        info!(target: "alerts", "{}", message.replace('\n', " | "));
    }
}
