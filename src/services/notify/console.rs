use async_trait::async_trait;

use super::NotificationTransport;

/// Log-only transport used when no mail credentials are configured.
pub struct ConsoleTransport;

#[async_trait]
impl NotificationTransport for ConsoleTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %recipient, subject = %subject, body = %body, "notification (log only)");
        Ok(())
    }
}
