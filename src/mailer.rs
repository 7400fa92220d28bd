use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::MailerSettings;
use crate::errors::AppError;

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub from: String,
    pub reply_to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email transport. Implementations may fail; callers decide whether that matters.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError>;
}

/// Picks the Resend transport when an API key is configured, otherwise logs only.
pub fn mailer_from_settings(
    settings: &MailerSettings,
) -> Result<std::sync::Arc<dyn Mailer>, AppError> {
    match settings.resend_api_key {
        Some(ref key) => Ok(std::sync::Arc::new(ResendMailer::new(
            settings.resend_base_url.clone(),
            key.clone(),
        )?)),
        None => Ok(std::sync::Arc::new(LogMailer)),
    }
}

/// Client for the Resend email API.
#[derive(Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

impl ResendMailer {
    /// Creates a new `ResendMailer`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the Resend API.
    /// * `api_key` - The API key for authentication.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create email client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        let url = format!("{}/emails", self.base_url);
        tracing::debug!("Sending email '{}' via {}", email.subject, url);

        let payload = ResendPayload {
            from: &email.from,
            to: [&email.to],
            reply_to: &email.reply_to,
            subject: &email.subject,
            text: &email.text,
            html: &email.html,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Email API returned {}: {}",
                status, error_text
            )));
        }

        tracing::info!("Email '{}' accepted by provider", email.subject);
        Ok(())
    }
}

/// Stand-in transport for environments without an email API key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        tracing::info!(
            "Email delivery disabled, would send '{}' to {}",
            email.subject,
            email.to
        );
        Ok(())
    }
}
