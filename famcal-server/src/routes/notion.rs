//! Notion relay endpoint.
//!
//! Rewrites `/notion/{path}` to the upstream Notion API, forwarding only the
//! headers the API needs. CORS enforcement happens in the tower layer; this
//! handler only does the rewrite.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::IntoResponse,
    routing::any,
};

use crate::routes::AppError;
use crate::state::AppState;

/// Request headers forwarded to the upstream API.
const FORWARDED_HEADERS: &[&str] = &["authorization", "notion-version", "content-type"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", any(health))
        .route("/notion/{*path}", any(relay))
}

async fn health() -> &'static str {
    "ok"
}

/// ANY /notion/{*path} - forward to the Notion API
async fn relay(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let url = format!("{}/{}", state.upstream_base.trim_end_matches('/'), path);
    tracing::debug!(%method, %url, "relaying request to Notion");

    let mut request = state.client.request(method.clone(), &url);

    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(*name) {
            request = request.header(*name, value.clone());
        }
    }

    if method != Method::GET && method != Method::HEAD {
        request = request.body(body);
    }

    let upstream = request.send().await?;
    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();
    let body = upstream.bytes().await?;

    Ok((status, [(header::CONTENT_TYPE, content_type)], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;
    use wiremock::matchers::{header, method, path as mock_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(
        app: Router,
        req_method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().method(req_method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_relay_rewrites_path_and_forwards_auth() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(mock_path("/users/me"))
            .and(header("authorization", "Bearer ntn_secret"))
            .and(header("notion-version", "2022-06-28"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name":"bot"}"#))
            .expect(1)
            .mount(&upstream)
            .await;

        let app = router().with_state(AppState::with_upstream(&upstream.uri()));
        let (status, body) = call(
            app,
            Method::GET,
            "/notion/users/me",
            &[
                ("authorization", "Bearer ntn_secret"),
                ("notion-version", "2022-06-28"),
            ],
            "",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("bot"));
    }

    #[tokio::test]
    async fn test_relay_forwards_post_body_and_status() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(mock_path("/databases/db1/query"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string(r#"{"code":"rate_limited"}"#),
            )
            .expect(1)
            .mount(&upstream)
            .await;

        let app = router().with_state(AppState::with_upstream(&upstream.uri()));
        let (status, body) = call(
            app,
            Method::POST,
            "/notion/databases/db1/query",
            &[("content-type", "application/json")],
            r#"{"page_size":10}"#,
        )
        .await;

        // Upstream status passes through untouched so the client's
        // retry/backoff logic sees the real 429.
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body.contains("rate_limited"));
    }
}
