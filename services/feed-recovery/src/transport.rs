//! Recovery REST transport
//!
//! Issues replay requests against the feed's recovery API. The transport
//! owns its own timeout and retry policy; callers only see success or a
//! `TransportError`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use types::ids::{RequestId, Urn};

use crate::config::ApiConfig;
use crate::error::{ConfigError, TransportError};

#[async_trait]
pub trait RecoveryTransport: Send + Sync {
    /// Request a full replay of `producer_name` since `after` (Unix millis,
    /// `0` = no anchor).
    async fn post_recovery(
        &self,
        producer_name: &str,
        request_id: RequestId,
        node_id: Option<i32>,
        after: i64,
    ) -> Result<(), TransportError>;

    /// Request a replay of the current odds of one event.
    async fn post_event_odds_recovery(
        &self,
        producer_name: &str,
        event_id: &Urn,
        request_id: RequestId,
        node_id: Option<i32>,
    ) -> Result<(), TransportError>;

    /// Request a replay of the stateful messages (bet stops, settlements)
    /// of one event.
    async fn post_event_stateful_recovery(
        &self,
        producer_name: &str,
        event_id: &Urn,
        request_id: RequestId,
        node_id: Option<i32>,
    ) -> Result<(), TransportError>;
}

/// Path of a full recovery request, relative to the API base URL.
pub fn recovery_path(producer_name: &str, request_id: RequestId, node_id: Option<i32>, after: i64) -> String {
    let mut path = format!("/{}/recovery/initiate_request?request_id={}", producer_name, request_id);
    if let Some(node_id) = node_id {
        path.push_str(&format!("&node_id={}", node_id));
    }
    if after != 0 {
        path.push_str(&format!("&after={}", after));
    }
    path
}

/// Path of an event odds recovery request.
pub fn event_odds_path(producer_name: &str, event_id: &Urn, request_id: RequestId, node_id: Option<i32>) -> String {
    event_path(producer_name, "odds", event_id, request_id, node_id)
}

/// Path of an event stateful-messages recovery request.
pub fn event_stateful_path(producer_name: &str, event_id: &Urn, request_id: RequestId, node_id: Option<i32>) -> String {
    event_path(producer_name, "stateful_messages", event_id, request_id, node_id)
}

fn event_path(producer_name: &str, kind: &str, event_id: &Urn, request_id: RequestId, node_id: Option<i32>) -> String {
    let mut path = format!(
        "/{}/{}/events/{}/initiate_request?request_id={}",
        producer_name, kind, event_id, request_id
    );
    if let Some(node_id) = node_id {
        path.push_str(&format!("&node_id={}", node_id));
    }
    path
}

/// Pull the `<message>` text out of an API error body.
pub fn extract_api_message(body: &str) -> Option<String> {
    let start = body.find("<message>")? + "<message>".len();
    let end = body[start..].find("</message>")? + start;
    let message = body[start..end].trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

/// `RecoveryTransport` over HTTPS.
pub struct HttpRecoveryTransport {
    client: Client,
    base_url: String,
    config: ApiConfig,
}

impl HttpRecoveryTransport {
    pub fn new(config: ApiConfig) -> Result<Self, ConfigError> {
        let base_url = config.base_url()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// POST `path`, retrying server-side failures.
    ///
    /// 4xx responses are final; 5xx responses are retried after the
    /// configured delay until the retry budget runs out.
    async fn post(&self, path: &str) -> Result<(), TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.config.retry_count.max(1);

        for attempt in 1..=attempts {
            let response = self
                .client
                .post(&url)
                .header("accept", "application/xml")
                .header("x-access-token", &self.config.access_token)
                .send()
                .await
                .map_err(|e| TransportError::Http(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::OK {
                debug!(path, attempt, "Recovery request accepted");
                return Ok(());
            }

            if status.is_server_error() && attempt < attempts {
                warn!(path, attempt, status = status.as_u16(), "Recovery API server error, retrying");
                tokio::time::sleep(self.config.retry_delay()).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(match extract_api_message(&body) {
                Some(message) => TransportError::Api {
                    status: status.as_u16(),
                    message,
                },
                None => TransportError::Status {
                    method: "POST".to_string(),
                    path: path.to_string(),
                    status: status.as_u16(),
                },
            });
        }

        Err(TransportError::Request(format!("no attempt made for {}", path)))
    }
}

#[async_trait]
impl RecoveryTransport for HttpRecoveryTransport {
    async fn post_recovery(
        &self,
        producer_name: &str,
        request_id: RequestId,
        node_id: Option<i32>,
        after: i64,
    ) -> Result<(), TransportError> {
        self.post(&recovery_path(producer_name, request_id, node_id, after)).await
    }

    async fn post_event_odds_recovery(
        &self,
        producer_name: &str,
        event_id: &Urn,
        request_id: RequestId,
        node_id: Option<i32>,
    ) -> Result<(), TransportError> {
        self.post(&event_odds_path(producer_name, event_id, request_id, node_id)).await
    }

    async fn post_event_stateful_recovery(
        &self,
        producer_name: &str,
        event_id: &Urn,
        request_id: RequestId,
        node_id: Option<i32>,
    ) -> Result<(), TransportError> {
        self.post(&event_stateful_path(producer_name, event_id, request_id, node_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    #[test]
    fn test_recovery_path_full() {
        let path = recovery_path("live", RequestId::new(17), Some(3), 1_700_000_000_000);
        assert_eq!(
            path,
            "/live/recovery/initiate_request?request_id=17&node_id=3&after=1700000000000"
        );
    }

    #[test]
    fn test_recovery_path_without_anchor_or_node() {
        let path = recovery_path("pre", RequestId::new(2), None, 0);
        assert_eq!(path, "/pre/recovery/initiate_request?request_id=2");
    }

    #[test]
    fn test_event_paths() {
        let urn = Urn::match_id(99);
        assert_eq!(
            event_odds_path("live", &urn, RequestId::new(5), None),
            "/live/odds/events/od:match:99/initiate_request?request_id=5"
        );
        assert_eq!(
            event_stateful_path("live", &urn, RequestId::new(5), Some(1)),
            "/live/stateful_messages/events/od:match:99/initiate_request?request_id=5&node_id=1"
        );
    }

    #[test]
    fn test_extract_api_message() {
        let body = r#"<?xml version="1.0"?><error><message> producer unknown </message></error>"#;
        assert_eq!(extract_api_message(body).as_deref(), Some("producer unknown"));
        assert_eq!(extract_api_message("<error/>"), None);
        assert_eq!(extract_api_message("<message></message>"), None);
    }

    #[test]
    fn test_transport_base_url_from_config() {
        let transport = HttpRecoveryTransport::new(
            ApiConfig::new("token", Environment::Test).with_api_url("http://127.0.0.1:9"),
        )
        .unwrap();
        assert_eq!(transport.base_url, "http://127.0.0.1:9/v1");
    }

    #[tokio::test]
    async fn test_connection_failure_is_http_error() {
        let mut config = ApiConfig::new("token", Environment::Test).with_api_url("http://127.0.0.1:9");
        config.timeout_secs = 1;
        let transport = HttpRecoveryTransport::new(config).unwrap();

        let err = transport
            .post_recovery("live", RequestId::new(1), None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }
}
