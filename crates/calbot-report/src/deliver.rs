//! Report delivery

use async_trait::async_trait;
use tracing::{error, info};

/// Destination for finished report texts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message
    async fn deliver(&self, text: &str) -> anyhow::Result<()>;

    /// Name used in log lines
    fn name(&self) -> &str;
}

/// Deliver `text`, logging the outcome. Delivery errors are not propagated.
pub async fn publish(notifier: &dyn Notifier, text: &str) -> bool {
    match notifier.deliver(text).await {
        Ok(()) => {
            info!("Message delivered via {}", notifier.name());
            true
        }
        Err(e) => {
            error!("Failed to deliver message via {}: {:#}", notifier.name(), e);
            false
        }
    }
}

/// Prints messages instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn deliver(&self, text: &str) -> anyhow::Result<()> {
        println!("{}", text);
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}
