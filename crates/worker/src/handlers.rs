use std::sync::Arc;

use cronflow::jobs::{
    boxed, parse_payload, EmailPayload, HandlerRegistry, JobError, JobType, PrintPayload,
};
use tracing::info;

const DEFAULT_MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";

/// Mailgun settings for the `email` handler. Empty domain or key leaves the
/// handler registered but failing every job.
#[derive(Clone, Debug)]
pub struct MailgunConfig {
    pub domain: String,
    pub api_key: String,
    pub api_base: String,
}

impl MailgunConfig {
    pub fn from_env() -> Self {
        let domain = std::env::var("MAILGUN_DOMAIN").unwrap_or_default();
        let api_key = std::env::var("MAILGUN_API_KEY").unwrap_or_default();
        let api_base = std::env::var("MAILGUN_API_BASE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MAILGUN_API_BASE.to_string());

        if domain.is_empty() || api_key.is_empty() {
            tracing::warn!("MAILGUN_DOMAIN or MAILGUN_API_KEY not set, email jobs will fail");
        }

        Self {
            domain,
            api_key,
            api_base,
        }
    }

    fn is_configured(&self) -> bool {
        !self.domain.is_empty() && !self.api_key.is_empty()
    }
}

pub fn print_job(payload: &[u8]) -> Result<(), JobError> {
    let p: PrintPayload = parse_payload(payload)?;
    info!(message = %p.message, "print job");
    Ok(())
}

/// Sends one message through the Mailgun REST API.
pub async fn email_job(
    client: &reqwest::Client,
    cfg: &MailgunConfig,
    payload: &[u8],
) -> Result<(), JobError> {
    let p: EmailPayload = parse_payload(payload)?;
    if !cfg.is_configured() {
        return Err(JobError::new("NOT_CONFIGURED", "mailgun not configured"));
    }

    let url = format!(
        "{}/{}/messages",
        cfg.api_base.trim_end_matches('/'),
        cfg.domain
    );
    let to = p.to.join(",");
    let form = [
        ("from", p.sender.as_str()),
        ("to", to.as_str()),
        ("subject", p.subject.as_str()),
        ("text", p.body.as_str()),
    ];

    let resp = client
        .post(&url)
        .basic_auth("api", Some(&cfg.api_key))
        .form(&form)
        .send()
        .await
        .map_err(|e| JobError::new("DEPENDENCY_DOWN", e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(JobError::new(
            "MAILGUN_ERROR",
            format!("mailgun error ({status}): {body}"),
        ));
    }
    Ok(())
}

pub fn build_registry(mailgun: MailgunConfig) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register_fn(JobType::Print, print_job);

    let client = reqwest::Client::new();
    let mailgun = Arc::new(mailgun);
    registry.register(JobType::Email, move |payload| {
        let client = client.clone();
        let cfg = mailgun.clone();
        boxed(async move { email_job(&client, &cfg, payload).await })
    });

    registry
}
