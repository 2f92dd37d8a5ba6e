//! Transactional email.
//!
//! Messages go to an HTTP provider (Resend-compatible JSON API) when a key is
//! configured, otherwise they are only logged. Tests use the in-memory outbox.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("provider rejected message (http {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub enum Mailer {
    Http {
        client: reqwest::Client,
        api_url: String,
        api_key: String,
        from: String,
    },
    Log,
    Outbox(Arc<Mutex<Vec<OutgoingEmail>>>),
}

impl Mailer {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn from_config(config: &EmailConfig) -> anyhow::Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            tracing::warn!("EMAIL_API_KEY not set, outgoing email will only be logged");
            return Ok(Self::Log);
        };
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("taskflow-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        tracing::info!("email delivery enabled via {}", config.api_url);
        Ok(Self::Http {
            client,
            api_url: config.api_url.clone(),
            api_key,
            from: config.from.clone(),
        })
    }

    pub fn outbox() -> Self {
        Self::Outbox(Arc::default())
    }

    /// Messages captured by an outbox mailer (empty for other kinds).
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        match self {
            Self::Outbox(messages) => messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            _ => Vec::new(),
        }
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        match self {
            Self::Http {
                client,
                api_url,
                api_key,
                from,
            } => {
                let res = client
                    .post(api_url)
                    .bearer_auth(api_key)
                    .json(&ProviderRequest {
                        from,
                        to: [email.to.as_str()],
                        subject: &email.subject,
                        text: &email.text,
                    })
                    .send()
                    .await
                    .map_err(|e| MailError::Transport(e.to_string()))?;
                if res.status().is_success() {
                    return Ok(());
                }
                let status = res.status().as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(MailError::Rejected { status, body })
            }
            Self::Log => {
                tracing::info!(
                    to = %email.to,
                    subject = %email.subject,
                    "email (not sent):\n{}",
                    email.text
                );
                Ok(())
            }
            Self::Outbox(messages) => {
                messages
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(email.clone());
                Ok(())
            }
        }
    }

    /// Send once and report whether it went out. Failures are logged, never retried.
    pub async fn deliver(&self, email: &OutgoingEmail) -> bool {
        match self.send(email).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(to = %email.to, "sending email failed: {e}");
                false
            }
        }
    }
}

// ── Templates ──────────────────────────────────────────────────────────────

pub fn verification_email(
    to: &str,
    display_name: &str,
    code: &str,
    ttl_minutes: u64,
) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Your Taskflow verification code: {code}"),
        text: format!(
            "Hi {display_name},\n\n\
             Your verification code is {code}.\n\
             It expires in {ttl_minutes} minutes.\n\n\
             If you did not create a Taskflow account, ignore this email."
        ),
    }
}

pub fn invite_email(
    to: &str,
    project_name: &str,
    inviter: &str,
    accept_url: &str,
) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("{inviter} invited you to {project_name} on Taskflow"),
        text: format!(
            "{inviter} invited you to join the project \"{project_name}\".\n\n\
             Accept the invitation: {accept_url}\n\n\
             The link expires in 7 days."
        ),
    }
}
