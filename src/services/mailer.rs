use crate::config::EmailConfig;
use crate::error::AppError;
use crate::models::AthEvent;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// A rendered message ready for submission to the email provider.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Send failure with its retryable/terminal classification attached at
/// the point of failure, never inferred later from message text.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("terminal send failure: {0}")]
    Terminal(String),
    #[error("retryable send failure: {0}")]
    Retryable(String),
}

impl SendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Retryable(_))
    }
}

impl From<SendError> for AppError {
    fn from(err: SendError) -> Self {
        AppError::SendFailed {
            terminal: !err.is_retryable(),
            detail: err.to_string(),
        }
    }
}

/// Transactional email sender boundary. Returns the provider message id
/// used later for delivery/bounce reconciliation.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<String, SendError>;
}

pub type SharedEmailSender = Arc<dyn EmailSender>;

/// HTTP JSON email provider client (Resend-style API).
pub struct HttpEmailSender {
    client: Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl HttpEmailSender {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<String, SendError> {
        let body = json!({
            "from": self.from_address,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Retryable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let payload: serde_json::Value = response
                .json()
                .await
                .map_err(|e| SendError::Terminal(format!("unreadable provider response: {}", e)))?;
            payload
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| SendError::Terminal("provider response missing id".to_string()))
        } else if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            Err(SendError::Terminal(format!("{}: {}", status, detail)))
        } else {
            Err(SendError::Retryable(format!("provider status {}", status)))
        }
    }
}

/// Render the ATH alert message for one recipient.
pub fn render_ath_email(event: &AthEvent, to: &str) -> OutboundEmail {
    let symbol = event.symbol.to_uppercase();
    let date = event.detected_at.format("%Y-%m-%d %H:%M UTC");

    let subject = format!(
        "{} just hit a new all-time high: ${}",
        symbol,
        event.new_ath.round_dp(2)
    );

    let text = format!(
        "{name} ({symbol}) reached a new all-time high.\n\n\
         New ATH: ${new}\n\
         Previous ATH: ${prev}\n\
         Change: +{pct:.2}%\n\
         Detected: {date}\n",
        name = event.name,
        symbol = symbol,
        new = event.new_ath.round_dp(2),
        prev = event.previous_ath.round_dp(2),
        pct = event.percentage_increase,
        date = date,
    );

    let html = format!(
        "<h2>{name} ({symbol}) reached a new all-time high</h2>\
         <p><strong>New ATH:</strong> ${new}</p>\
         <p><strong>Previous ATH:</strong> ${prev}</p>\
         <p><strong>Change:</strong> +{pct:.2}%</p>\
         <p><strong>Detected:</strong> {date}</p>",
        name = event.name,
        symbol = symbol,
        new = event.new_ath.round_dp(2),
        prev = event.previous_ath.round_dp(2),
        pct = event.percentage_increase,
        date = date,
    );

    OutboundEmail {
        to: to.to_string(),
        subject,
        html,
        text,
    }
}
