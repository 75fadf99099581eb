//! Rate-limited, retrying Notion API client.
//!
//! At most two requests are in flight at once; excess callers queue on the
//! semaphore in FIFO order. Each request has a hard timeout enforced by
//! cancellation, and 429/5xx responses are retried with Retry-After-aware
//! exponential backoff before a typed error is surfaced.

use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::notion::types::{Database, IntegrationInfo, Page, QueryDatabaseResponse};
use crate::notion::{NotionApiError, NotionErrorKind};

pub const NOTION_VERSION: &str = "2022-06-28";
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct NotionClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Additional attempts after the first (4 total with the default).
    pub max_retries: u32,
    pub min_backoff: Duration,
    pub max_concurrent: usize,
}

impl Default for NotionClientConfig {
    fn default() -> Self {
        NotionClientConfig {
            base_url: "https://api.notion.com/v1".to_string(),
            timeout: Duration::from_secs(12),
            max_retries: 3,
            min_backoff: Duration::from_millis(500),
            max_concurrent: 2,
        }
    }
}

/// Error body shape returned by the Notion API.
#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Pagination/filter parameters for a database query.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub filter: Option<serde_json::Value>,
    pub start_cursor: Option<String>,
    pub page_size: Option<usize>,
}

pub struct NotionClient {
    client: reqwest::Client,
    config: NotionClientConfig,
    gate: Semaphore,
}

impl NotionClient {
    pub fn new(config: NotionClientConfig) -> Self {
        let gate = Semaphore::new(config.max_concurrent.max(1));
        NotionClient {
            client: reqwest::Client::new(),
            config,
            gate,
        }
    }

    pub async fn validate_token(&self, token: &str) -> bool {
        match self.get_integration_info(token).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "token validation failed");
                false
            }
        }
    }

    pub async fn get_integration_info(&self, token: &str) -> Result<IntegrationInfo, NotionApiError> {
        self.request(Method::GET, "/users/me", token, None).await
    }

    pub async fn get_database(
        &self,
        database_id: &str,
        token: &str,
    ) -> Result<Database, NotionApiError> {
        self.request(Method::GET, &format!("/databases/{}", database_id), token, None)
            .await
    }

    pub async fn get_page(&self, page_id: &str, token: &str) -> Result<Page, NotionApiError> {
        self.request(Method::GET, &format!("/pages/{}", page_id), token, None)
            .await
    }

    /// Query one result page, sorted ascending by the `Date` property.
    pub async fn query_database(
        &self,
        database_id: &str,
        token: &str,
        params: &QueryParams,
    ) -> Result<QueryDatabaseResponse, NotionApiError> {
        let mut body = serde_json::Map::new();
        body.insert(
            "sorts".to_string(),
            json!([{ "property": "Date", "direction": "ascending" }]),
        );
        if let Some(filter) = &params.filter {
            body.insert("filter".to_string(), filter.clone());
        }
        if let Some(cursor) = &params.start_cursor {
            body.insert("start_cursor".to_string(), json!(cursor));
        }
        if let Some(size) = params.page_size {
            body.insert("page_size".to_string(), json!(size.clamp(1, MAX_PAGE_SIZE)));
        }

        self.request(
            Method::POST,
            &format!("/databases/{}/query", database_id),
            token,
            Some(serde_json::Value::Object(body)),
        )
        .await
    }

    /// Fetch every record by following cursors until `has_more` is false.
    pub async fn query_all(
        &self,
        database_id: &str,
        token: &str,
        filter: Option<serde_json::Value>,
    ) -> Result<Vec<Page>, NotionApiError> {
        self.query_all_with_options(
            database_id,
            token,
            QueryParams {
                filter,
                start_cursor: None,
                page_size: Some(MAX_PAGE_SIZE),
            },
            None,
        )
        .await
    }

    /// Like [`query_all`](Self::query_all) with an optional per-page callback
    /// for incremental consumption.
    pub async fn query_all_with_options(
        &self,
        database_id: &str,
        token: &str,
        mut params: QueryParams,
        mut on_page: Option<&mut (dyn FnMut(&QueryDatabaseResponse) + Send)>,
    ) -> Result<Vec<Page>, NotionApiError> {
        let mut all = Vec::new();

        loop {
            let response = self.query_database(database_id, token, &params).await?;

            all.extend(response.results.iter().cloned());
            if let Some(callback) = on_page.as_mut() {
                callback(&response);
            }

            match (response.has_more, response.next_cursor) {
                (true, Some(cursor)) => params.start_cursor = Some(cursor),
                _ => break,
            }
        }

        Ok(all)
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, NotionApiError> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        for attempt in 0..=self.config.max_retries {
            // One slot per in-flight request; released before any backoff
            // sleep so waiting callers are not starved by a retry loop.
            let permit = self.gate.acquire().await.map_err(|_| {
                NotionApiError::new(NotionErrorKind::Unknown, "client is shut down")
            })?;

            let mut builder = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(token)
                .header("Notion-Version", NOTION_VERSION)
                .header("Content-Type", "application/json");
            if let Some(body) = &body {
                builder = builder.json(body);
            }

            let outcome = tokio::time::timeout(self.config.timeout, builder.send()).await;
            drop(permit);

            match outcome {
                Err(_) => {
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.backoff_delay(attempt, None)).await;
                        continue;
                    }
                    return Err(NotionApiError::new(
                        NotionErrorKind::Timeout,
                        "Request timed out. Please try again.",
                    ));
                }
                Ok(Err(err)) => {
                    let normalized = normalize_transport_error(&err);
                    if attempt < self.config.max_retries && is_retryable_transport(&normalized) {
                        tokio::time::sleep(self.backoff_delay(attempt, None)).await;
                        continue;
                    }
                    return Err(normalized);
                }
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            NotionApiError::new(
                                NotionErrorKind::Unknown,
                                format!("Unexpected Notion response shape: {}", e),
                            )
                        });
                    }

                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());
                    let body_text = response.text().await.unwrap_or_default();
                    let parsed: Option<NotionErrorBody> = serde_json::from_str(&body_text).ok();

                    if (status.as_u16() == 429 || status.is_server_error())
                        && attempt < self.config.max_retries
                    {
                        tokio::time::sleep(self.backoff_delay(attempt, retry_after)).await;
                        continue;
                    }

                    let code = parsed.as_ref().and_then(|p| p.code.clone());
                    return Err(map_response_error(
                        status.as_u16(),
                        code.as_deref(),
                        parsed.and_then(|p| p.message),
                    ));
                }
            }
        }

        Err(NotionApiError::new(
            NotionErrorKind::Network,
            "Failed to reach Notion after multiple attempts.",
        ))
    }

    /// Retry-After wins (capped at 15 s); otherwise exponential backoff on
    /// the attempt number, capped at 10 s.
    fn backoff_delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(secs) = retry_after_secs {
            return Duration::from_secs(secs).min(Duration::from_secs(15));
        }
        let exp = 2u32.saturating_pow(attempt).min(8);
        (self.config.min_backoff * exp).min(Duration::from_secs(10))
    }
}

fn map_response_error(
    status: u16,
    code: Option<&str>,
    message: Option<String>,
) -> NotionApiError {
    match code {
        Some("unauthorized") => NotionApiError::with_status(
            NotionErrorKind::Unauthorized,
            status,
            "Invalid Notion token. Please check your integration token and ensure it has the correct permissions.",
        ),
        Some("restricted_resource") => NotionApiError::with_status(
            NotionErrorKind::RestrictedResource,
            status,
            "Access forbidden. Please ensure your integration has access to the requested page or database.",
        ),
        Some("object_not_found") => NotionApiError::with_status(
            NotionErrorKind::ObjectNotFound,
            status,
            "Page or database not found. Please check the id and ensure it is shared with your integration.",
        ),
        Some("rate_limited") => NotionApiError::with_status(
            NotionErrorKind::RateLimited,
            status,
            "Rate limit exceeded. Please wait a moment and try again.",
        ),
        _ => NotionApiError::with_status(
            NotionErrorKind::Unknown,
            status,
            message.unwrap_or_else(|| format!("Notion API error (status {})", status)),
        ),
    }
}

/// Normalize transport-level failures to the typed kinds callers branch on.
fn normalize_transport_error(err: &reqwest::Error) -> NotionApiError {
    if err.is_timeout() {
        return NotionApiError::new(NotionErrorKind::Timeout, "Request timed out. Please try again.");
    }
    if err.is_connect() {
        return NotionApiError::new(
            NotionErrorKind::Offline,
            "Offline: connect to the internet and try again.",
        );
    }
    if err.is_request() || err.is_body() {
        return NotionApiError::new(
            NotionErrorKind::CorsBlocked,
            "Unable to reach Notion. The request was blocked before reaching the API.",
        );
    }
    NotionApiError::new(
        NotionErrorKind::Unknown,
        format!("An unknown error occurred while connecting to Notion: {}", err),
    )
}

fn is_retryable_transport(err: &NotionApiError) -> bool {
    matches!(
        err.kind,
        NotionErrorKind::Timeout | NotionErrorKind::Network | NotionErrorKind::RateLimited
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> NotionClient {
        NotionClient::new(NotionClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            min_backoff: Duration::from_millis(5),
            max_concurrent: 2,
        })
    }

    #[tokio::test]
    async fn test_retries_through_rate_limits_until_success() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        Mock::given(method("POST"))
            .and(path("/databases/db1/query"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
                if current < 2 {
                    ResponseTemplate::new(429)
                        .set_body_string(r#"{"code":"rate_limited","message":"slow down"}"#)
                } else {
                    ResponseTemplate::new(200)
                        .set_body_string(r#"{"results":[],"has_more":false,"next_cursor":null}"#)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client
            .query_database("db1", "ntn_token", &QueryParams::default())
            .await
            .expect("third attempt should succeed");

        assert!(response.results.is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"code":"unauthorized","message":"bad token"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get_integration_info("bad").await.unwrap_err();

        assert_eq!(err.kind, NotionErrorKind::Unauthorized);
        assert_eq!(err.status, Some(401));
    }

    #[tokio::test]
    async fn test_query_all_follows_cursors() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        Mock::given(method("POST"))
            .and(path("/databases/db1/query"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                let current = calls_clone.fetch_add(1, Ordering::SeqCst);
                if current == 0 {
                    ResponseTemplate::new(200).set_body_string(
                        r#"{"results":[{"id":"p1","properties":{}}],"has_more":true,"next_cursor":"cur2"}"#,
                    )
                } else {
                    ResponseTemplate::new(200).set_body_string(
                        r#"{"results":[{"id":"p2","properties":{}}],"has_more":false,"next_cursor":null}"#,
                    )
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut page_count = 0;
        let pages = client
            .query_all_with_options(
                "db1",
                "ntn_token",
                QueryParams::default(),
                Some(&mut |_page: &QueryDatabaseResponse| page_count += 1),
            )
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id, "p1");
        assert_eq!(pages[1].id, "p2");
        assert_eq!(page_count, 2);
    }

    #[tokio::test]
    async fn test_connection_refused_normalizes_to_offline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = NotionClient::new(NotionClientConfig {
            base_url: format!("http://{}", addr),
            timeout: Duration::from_secs(2),
            max_retries: 0,
            min_backoff: Duration::from_millis(1),
            max_concurrent: 2,
        });

        let err = client.get_integration_info("token").await.unwrap_err();
        assert_eq!(err.kind, NotionErrorKind::Offline);
    }
}
