use crate::domain::model::SourcePayload;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::time::Duration;

/// 單次 GET，回應必須是 2xx 且為 JSON object
pub async fn fetch_json(
    client: &Client,
    url: &str,
    timeout: Duration,
    log_response: bool,
) -> Result<SourcePayload> {
    tracing::debug!("📡 Making API request to: {}", url);
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    tracing::debug!("📡 API response status: {}", status);

    if !status.is_success() {
        return Err(EtlError::FetchStatusError {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    if log_response {
        tracing::debug!("📡 Response body: {}", body);
    }

    let value: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| EtlError::FetchDecodeError {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(EtlError::FetchDecodeError {
            url: url.to_string(),
            message: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_fetch_returns_decoded_object() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/api/");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"results": [{"email": "a@x.com"}], "info": {"seed": "abc"}}));
        });

        let payload = fetch_json(&Client::new(), &server.url("/api/"), TIMEOUT, true)
            .await
            .unwrap();

        api_mock.assert();
        assert!(payload.contains_key("results"));
        assert_eq!(payload["info"]["seed"], "abc");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_fails() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/api/");
            then.status(500);
        });

        let err = fetch_json(&Client::new(), &server.url("/api/"), TIMEOUT, false)
            .await
            .unwrap_err();

        api_mock.assert_hits(1);
        assert!(matches!(err, EtlError::FetchStatusError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_fetch_invalid_json_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/");
            then.status(200).body("<html>not json</html>");
        });

        let err = fetch_json(&Client::new(), &server.url("/api/"), TIMEOUT, false)
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::FetchDecodeError { .. }));
    }

    #[tokio::test]
    async fn test_fetch_array_body_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/");
            then.status(200).json_body(serde_json::json!([1, 2, 3]));
        });

        let err = fetch_json(&Client::new(), &server.url("/api/"), TIMEOUT, false)
            .await
            .unwrap_err();

        match err {
            EtlError::FetchDecodeError { message, .. } => assert!(message.contains("array")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
