use async_trait::async_trait;

/// Outbound email transport consumed by the signup flow.
///
/// Delivery failures must surface to the caller; implementations are not
/// allowed to swallow errors.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Default transport: writes the message to the log instead of the wire.
/// Suitable for local development and tests.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, body, "outbound mail (log transport)");
        Ok(())
    }
}
