pub mod console;
pub mod sendgrid;

use async_trait::async_trait;

/// Outbound notification seam. Failures are logged by callers, never
/// escalated into a conversation.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}
