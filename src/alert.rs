//! Failure alerts for operator commands.
//!
//! Workflows never alert on their own; callers opt in by running a workflow
//! future through [`alert_on_error`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{IdolError, Result};

/// Receives a notification when a wrapped operation fails.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, operation: &str, error: &IdolError);
}

/// Posts failures to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackAlerter {
    client: reqwest::Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

impl SlackAlerter {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdolError::service("alert_client", e))?;
        Ok(Self::with_client(client, webhook_url))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Alerter for SlackAlerter {
    async fn alert(&self, operation: &str, error: &IdolError) {
        let text = format!("idolface `{operation}` failed: {error}");
        let sent = self
            .client
            .post(&self.webhook_url)
            .json(&SlackMessage { text: &text })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        // An alert that cannot be delivered must not hide the original error.
        if let Err(e) = sent {
            tracing::warn!(operation, error = %e, "failed to deliver alert");
        }
    }
}

/// Awaits `operation` and reports its error to `alerter`, if one is set,
/// before handing the result back unchanged.
pub async fn alert_on_error<T, F>(alerter: Option<&dyn Alerter>, name: &str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = operation.await;
    if let (Err(e), Some(alerter)) = (&result, alerter) {
        alerter.alert(name, e).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_failures_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_string_contains("upload_idol"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let alerter = SlackAlerter::new(format!("{}/hook", server.uri())).unwrap();
        let result: Result<()> = alert_on_error(Some(&alerter), "upload_idol", async {
            Err(IdolError::Index { found: 2 })
        })
        .await;

        assert!(matches!(result, Err(IdolError::Index { found: 2 })));
    }

    #[tokio::test]
    async fn successes_are_not_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let alerter = SlackAlerter::new(server.uri()).unwrap();
        let value = alert_on_error(Some(&alerter), "list", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn undeliverable_alert_keeps_original_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let alerter = SlackAlerter::new(server.uri()).unwrap();
        let result: Result<()> =
            alert_on_error(Some(&alerter), "delete_face", async { Err(IdolError::Cancelled) }).await;
        assert!(matches!(result, Err(IdolError::Cancelled)));
    }

    #[tokio::test]
    async fn runs_without_alerter() {
        let result: Result<()> = alert_on_error(None, "reset", async { Err(IdolError::Cancelled) }).await;
        assert!(matches!(result, Err(IdolError::Cancelled)));
    }
}
