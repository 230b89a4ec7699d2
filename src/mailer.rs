use async_trait::async_trait;
use tracing::info;

/// Outbound email seam; the server only ever sends verification links.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to_email: &str, verify_url: &str) -> anyhow::Result<()>;
}

/// Writes the link to the log instead of delivering it.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to_email: &str, verify_url: &str) -> anyhow::Result<()> {
        info!(to = %to_email, url = %verify_url, "verification email");
        Ok(())
    }
}

pub fn verification_url(public_api_base_url: &str, raw_token: &str) -> String {
    format!(
        "{}/auth/verify-email?token={}",
        public_api_base_url.trim_end_matches('/'),
        raw_token
    )
}
