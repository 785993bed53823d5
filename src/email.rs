use serde_json::json;

use crate::config::Config;

/// Fire-and-forget mail delivery through an HTTP relay.
///
/// Email is strictly best-effort: every failure is logged and swallowed so
/// the domain operation that triggered it (payment completion, launch, ...)
/// always succeeds. Without a configured relay, sends are skipped.
pub struct Mailer {
    http: reqwest::Client,
    relay_url: Option<String>,
    api_key: Option<String>,
    from: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            relay_url: config.mail_relay_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.email_from.clone(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) {
        let Some(relay_url) = &self.relay_url else {
            tracing::debug!("Mail relay not configured, skipping email to {}", to);
            return;
        };

        let mut request = self.http.post(relay_url).json(&json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Email sent to {}: {}", to, subject);
            }
            Ok(response) => {
                tracing::warn!("Mail relay returned HTTP {} for {}", response.status(), to);
            }
            Err(e) => {
                tracing::warn!("Email to {} failed: {}", to, e);
            }
        }
    }
}
