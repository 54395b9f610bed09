//! Mail delivery via the Resend HTTP API.
//!
//! Delivery is fire-and-result: one bounded HTTP request per notification,
//! no internal retry loop. A failed send simply reports `false`; the batch
//! engine leaves no idempotency flag behind, so the recipient is picked up
//! again on the next run.

use std::time::Duration;

use herald_common::config::AppConfig;
use herald_common::error::AppError;
use herald_common::types::{MailKind, MailVariables};

/// Default Resend API endpoint.
const RESEND_API_URL: &str = "https://api.resend.com";

/// Sends a single notification email.
///
/// Returns `true` on accepted delivery, `false` on any failure. Failures are
/// logged here and never escalated; the caller's only concern is whether to
/// write the "already notified" flag.
pub trait Mailer: Send + Sync {
    fn send(
        &self,
        kind: MailKind,
        vars: &MailVariables,
    ) -> impl std::future::Future<Output = bool> + Send;
}

/// Mailer backed by the Resend transactional email API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    /// Build a mailer from application config.
    ///
    /// Requires `RESEND_API_KEY` and `EMAIL_FROM`; the request timeout bounds
    /// how long one slow delivery can stall the batch window.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let api_key = config
            .resend_api_key
            .clone()
            .ok_or_else(|| AppError::Config("RESEND_API_KEY is required".to_string()))?;
        let from = config
            .email_from
            .clone()
            .ok_or_else(|| AppError::Config("EMAIL_FROM is required".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.mail_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: RESEND_API_URL.to_string(),
            api_key,
            from,
        })
    }

    /// Override the API base URL (used by tests against a local mock server).
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    /// Render the subject line and plain-text body for a notification.
    pub fn render(kind: MailKind, vars: &MailVariables) -> (String, String) {
        match kind {
            MailKind::CourseStart => (
                format!("Your course \"{}\" starts today", vars.subject_title),
                format!(
                    "Hi {},\n\nThe course \"{}\" you are enrolled in starts today. \
                     Log in to get started!\n",
                    vars.first_name, vars.subject_title
                ),
            ),
            MailKind::UnitStart => (
                format!("A new unit in your course is available: {}", vars.subject_title),
                format!(
                    "Hi {},\n\nThe unit \"{}\" is available from today. \
                     Log in to continue your course!\n",
                    vars.first_name, vars.subject_title
                ),
            ),
        }
    }
}

impl Mailer for ResendMailer {
    async fn send(&self, kind: MailKind, vars: &MailVariables) -> bool {
        let (subject, text) = Self::render(kind, vars);

        let body = serde_json::json!({
            "from": self.from,
            "to": [vars.email],
            "subject": subject,
            "text": text,
        });

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(
                    kind = %kind,
                    email = %vars.email,
                    "Notification email accepted for delivery"
                );
                true
            }
            Ok(resp) => {
                tracing::warn!(
                    kind = %kind,
                    email = %vars.email,
                    status = %resp.status(),
                    "Mail API rejected notification email"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    email = %vars.email,
                    error = %e,
                    "Failed to reach mail API"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_vars() -> MailVariables {
        MailVariables {
            email: "student@example.com".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            display_name: "jdoe".to_string(),
            subject_id: 12,
            subject_title: "Rust 101".to_string(),
        }
    }

    #[test]
    fn test_render_course_start() {
        let (subject, body) = ResendMailer::render(MailKind::CourseStart, &make_vars());
        assert!(subject.contains("Rust 101"));
        assert!(subject.contains("starts today"));
        assert!(body.contains("Hi Jane"));
    }

    #[test]
    fn test_render_unit_start() {
        let (subject, body) = ResendMailer::render(MailKind::UnitStart, &make_vars());
        assert!(subject.contains("Rust 101"));
        assert!(body.contains("available from today"));
    }
}
