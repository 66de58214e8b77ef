use std::time::Duration;

use serde::Serialize;
use zeroize::Zeroizing;

use super::DeliveryError;

/// A fully rendered outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers one email. Implementations block; the dispatcher calls them from
/// its own thread.
pub trait EmailTransport: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;

    fn name(&self) -> &'static str;
}

/// JSON-over-HTTP email provider.
pub struct HttpEmailTransport {
    endpoint: String,
    api_key: Option<Zeroizing<String>>,
    from: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpEmailTransport {
    /// Must be called outside an async runtime: the blocking client owns
    /// its own.
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        from: &str,
        timeout_secs: u64,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Transport(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.map(Zeroizing::new),
            from: from.to_string(),
            client,
            timeout_secs,
        })
    }
}

impl EmailTransport for HttpEmailTransport {
    fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let body = ProviderRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.as_str());
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Transport(format!("timed out after {}s", self.timeout_secs))
            } else if e.is_connect() {
                DeliveryError::Transport(format!("cannot reach {}", self.endpoint))
            } else {
                DeliveryError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Writes emails to the log instead of sending them. Used when no provider
/// endpoint is configured.
pub struct LogTransport;

impl EmailTransport for LogTransport {
    fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email not sent (no provider configured)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
