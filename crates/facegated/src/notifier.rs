//! Outbound notification of verification results.
//!
//! One POST, no body, to one of two fixed endpoints depending on the
//! verdict. Fire-and-forget: the verification result already exists by the
//! time this runs, so nothing here may fail the cycle. No retry, no backoff.

use std::time::Duration;

/// Endpoints and timeout for result notification.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub verified_url: String,
    pub unverified_url: String,
    pub timeout: Duration,
}

pub struct Notifier {
    client: Option<reqwest::blocking::Client>,
    config: NotifierConfig,
}

impl Notifier {
    /// Build the notifier. A client construction failure downgrades
    /// notification to a logged no-op; it never propagates.
    pub fn new(config: NotifierConfig) -> Self {
        let client = match reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
        {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::error!(error = %e, "failed to build notification client; notifications disabled");
                None
            }
        };
        Self { client, config }
    }

    fn endpoint(&self, verified: bool) -> &str {
        if verified {
            &self.config.verified_url
        } else {
            &self.config.unverified_url
        }
    }

    /// Report the verdict. Best-effort: a non-200 response or transport
    /// failure is logged and swallowed.
    pub fn notify(&self, verified: bool) {
        let url = self.endpoint(verified);

        let Some(client) = &self.client else {
            tracing::warn!(url = %url, "notification client unavailable; skipping");
            return;
        };

        match client.post(url).send() {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::info!(url = %url, verified, "notification delivered");
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = %response.status(), "notification rejected");
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "notification failed");
            }
        }
    }
}
