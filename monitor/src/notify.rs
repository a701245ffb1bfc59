//! Report delivery.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::report::RunReport;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification topic returned status {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, report: &RunReport) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct TopicMessage<'a> {
    subject: String,
    message: String,
    attributes: Attributes<'a>,
}

#[derive(Serialize)]
struct Attributes<'a> {
    name: &'a str,
    status: &'static str,
    errors: String,
    warnings: String,
}

impl<'a> TopicMessage<'a> {
    fn from_report(report: &'a RunReport) -> Self {
        TopicMessage {
            subject: report.subject(),
            message: report.body(),
            attributes: Attributes {
                name: &report.name,
                status: report.status().as_str(),
                errors: report.errors.to_string(),
                warnings: report.warnings.to_string(),
            },
        }
    }
}

/// Posts the report to a notification topic endpoint.
pub struct HttpTopicNotifier {
    client: reqwest::Client,
    topic_url: String,
}

impl HttpTopicNotifier {
    pub fn new(topic_url: impl Into<String>) -> Self {
        HttpTopicNotifier {
            client: reqwest::Client::new(),
            topic_url: topic_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpTopicNotifier {
    async fn publish(&self, report: &RunReport) -> Result<(), NotifyError> {
        let message = TopicMessage::from_report(report);
        let response = self
            .client
            .post(&self.topic_url)
            .json(&message)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        info!(request_id = %report.request_id, status = message.attributes.status, "published run report");
        Ok(())
    }
}

/// Dumps the report to stdout instead of publishing, for dry runs.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn publish(&self, report: &RunReport) -> Result<(), NotifyError> {
        let message = TopicMessage::from_report(report);
        println!("{}", message.subject);
        println!("{}", message.message);
        println!(
            "{}",
            serde_json::to_string(&message.attributes).unwrap_or_default()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn report() -> RunReport {
        RunReport {
            name: "Hello World".to_string(),
            request_id: "f65dbf9d".to_string(),
            duration_ms: 6000,
            errors: 1,
            warnings: 3,
            events: vec![],
        }
    }

    #[tokio::test]
    async fn test_publish_posts_report_with_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/topic"))
            .and(body_partial_json(serde_json::json!({
                "subject": "Hello World request completed with ERRORS!",
                "attributes": {
                    "name": "Hello World",
                    "status": "error",
                    "errors": "1",
                    "warnings": "3"
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = HttpTopicNotifier::new(format!("{}/topic", server.uri()));
        notifier.publish(&report()).await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = HttpTopicNotifier::new(server.uri());
        let err = notifier.publish(&report()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(status) if status.as_u16() == 500));
    }
}
