use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::MailConfig;

/// Outbound mail, delivered through an HTTP relay when configured. Without
/// relay credentials the reset link is logged instead, and the forgot-password
/// handler echoes it in the response body as a development fallback.
pub struct Mailer {
    http: reqwest::Client,
    config: Option<MailConfig>,
}

impl Mailer {
    pub fn new(config: Option<MailConfig>) -> Self {
        if config.is_none() {
            warn!("Mail relay not configured; password reset links will be logged");
        }
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Send a password-reset email. Delivery failure is logged and swallowed:
    /// the surrounding request must return its generic response either way,
    /// so error behavior cannot leak account existence.
    pub async fn send_password_reset(&self, to: &str, reset_link: &str) {
        let Some(cfg) = &self.config else {
            info!("Password reset link for {}: {}", to, reset_link);
            return;
        };

        let body = json!({
            "from": cfg.from,
            "to": [to],
            "subject": "[Study Together] Password reset",
            "text": format!(
                "You requested a password reset.\n\n\
                 Open the link below to choose a new password:\n{reset_link}\n\n\
                 The link expires in 1 hour. If you did not request a reset, \
                 ignore this email."
            ),
        });

        match self
            .http
            .post(&cfg.api_url)
            .bearer_auth(&cfg.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                debug!("Password reset email sent to {}", to);
            }
            Ok(resp) => {
                warn!("Mail relay returned {} for {}", resp.status(), to);
            }
            Err(e) => {
                warn!("Mail delivery to {} failed: {}", to, e);
            }
        }
    }
}
