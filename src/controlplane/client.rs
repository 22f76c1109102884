//! Control-plane HTTP client implementation.
//!
//! This module provides a JSON-over-HTTP client for the control-plane API.
//! Every failure is reported as an [`RpcStatus`] so that the retrying invoker
//! and the operation awaiter can classify it.

use async_trait::async_trait;
use reqwest::{header, Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{ConfigError, ProviderError, Result};

use super::awaiter::OperationStatusApi;
use super::context::CallContext;
use super::status::{RpcStatus, StatusCode};
use super::types::{AsyncOperation, CallOptions};

/// Header carrying the API version.
pub const API_VERSION_HEADER: &str = "x-api-version";

/// Header carrying the per-invocation idempotency key.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Control-plane API client.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    /// HTTP client.
    client: Client,
    /// Base URL of the API.
    endpoint: Url,
    /// API version sent with every request.
    api_version: String,
    /// API key, if authentication is configured.
    api_key: Option<String>,
    /// Upper bound for a single request.
    request_timeout: Duration,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<StatusCode>,
    #[serde(default)]
    message: Option<String>,
}

/// Response envelope of the operation endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetOperationResponse {
    async_operation: AsyncOperation,
}

impl ControlPlaneClient {
    /// Creates a new client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be created.
    pub fn new(config: &ClientConfig, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ConfigError::validation(format!("Invalid endpoint '{}': {e}", config.endpoint), "client.endpoint")
        })?;

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_version: config.api_version.clone(),
            api_key,
            request_timeout,
        })
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds the URL for a path below the endpoint.
    fn url(&self, segments: &[&str]) -> std::result::Result<Url, RpcStatus> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RpcStatus::new(
                    StatusCode::InvalidArgument,
                    format!("endpoint '{}' cannot carry a path", self.endpoint),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Executes a single request and decodes the JSON response.
    ///
    /// The request timeout is the smaller of the configured timeout and the
    /// time left on `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the status derived from the HTTP response or transport failure.
    pub async fn call<Req, Resp>(
        &self,
        ctx: &CallContext,
        method: Method,
        segments: &[&str],
        body: Option<&Req>,
        options: &CallOptions,
    ) -> std::result::Result<Resp, RpcStatus>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        if let Some(cause) = ctx.cause() {
            return Err(RpcStatus::new(StatusCode::Cancelled, cause.to_string()));
        }

        let url = self.url(segments)?;
        trace!("{method} {url}");

        let timeout = ctx
            .remaining()
            .map_or(self.request_timeout, |left| left.min(self.request_timeout));

        let mut request = self
            .client
            .request(method, url)
            .timeout(timeout)
            .header(header::ACCEPT, "application/json")
            .header(API_VERSION_HEADER, &self.api_version);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(request_id) = &options.request_id {
            request = request.header(REQUEST_ID_HEADER, request_id);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| transport_status(&e))?;
        let status = response.status();

        if !status.is_success() {
            let code = StatusCode::from_http(status.as_u16());
            let text = response.text().await.unwrap_or_default();
            debug!("Request failed with HTTP {}", status.as_u16());
            return Err(error_status(code, &text));
        }

        response.json::<Resp>().await.map_err(|e| {
            RpcStatus::new(StatusCode::Internal, format!("Failed to parse response: {e}"))
        })
    }

    /// Fetches the current record of an operation.
    ///
    /// # Errors
    ///
    /// Returns the status of the failed request.
    pub async fn get_async_operation(
        &self,
        ctx: &CallContext,
        operation_id: &str,
    ) -> std::result::Result<AsyncOperation, RpcStatus> {
        let response: GetOperationResponse = self
            .call::<(), _>(
                ctx,
                Method::GET,
                &["operations", operation_id],
                None,
                &CallOptions::new(),
            )
            .await?;
        Ok(response.async_operation)
    }
}

#[async_trait]
impl OperationStatusApi for ControlPlaneClient {
    async fn get_operation(
        &self,
        ctx: &CallContext,
        operation_id: &str,
    ) -> std::result::Result<AsyncOperation, RpcStatus> {
        self.get_async_operation(ctx, operation_id).await
    }
}

/// Maps a transport-level failure onto a status.
fn transport_status(error: &reqwest::Error) -> RpcStatus {
    if error.is_timeout() {
        RpcStatus::new(StatusCode::DeadlineExceeded, format!("Request timed out: {error}"))
    } else {
        RpcStatus::unavailable(format!("Request failed: {error}"))
    }
}

/// Builds the status for a non-success response body.
///
/// A JSON body naming its own code wins over the HTTP mapping.
fn error_status(code: StatusCode, body: &str) -> RpcStatus {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => RpcStatus::new(
            parsed.code.unwrap_or(code),
            parsed.message.unwrap_or_else(|| body.to_string()),
        ),
        Err(_) => RpcStatus::new(code, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{OperationAwaiter, RetryingInvoker};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ControlPlaneClient {
        let config = ClientConfig {
            endpoint: server.uri(),
            ..ClientConfig::default()
        };
        ControlPlaneClient::new(&config, Some(String::from("secret"))).unwrap()
    }

    fn operation_body(state: &str) -> serde_json::Value {
        serde_json::json!({
            "asyncOperation": {
                "id": "op-42",
                "state": state,
                "failureReason": "",
                "operationType": "update-namespace"
            }
        })
    }

    #[tokio::test]
    async fn test_get_operation_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op-42"))
            .and(header("authorization", "Bearer secret"))
            .and(header(API_VERSION_HEADER, ClientConfig::default().api_version.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(operation_body("in_progress")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let op = client
            .get_async_operation(&CallContext::new(), "op-42")
            .await
            .unwrap();

        assert_eq!(op.id, "op-42");
        assert_eq!(op.state, "in_progress");
    }

    #[tokio::test]
    async fn test_http_errors_map_to_status_codes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/throttled"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "RESOURCE_EXHAUSTED",
                "message": "too many requests for account"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let ctx = CallContext::new();

        let err = client.get_async_operation(&ctx, "missing").await.unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);
        assert_eq!(err.message, "not found");

        let err = client.get_async_operation(&ctx, "busy").await.unwrap_err();
        assert_eq!(err.code, StatusCode::Unavailable);
        assert!(err.is_retryable());

        let err = client.get_async_operation(&ctx, "throttled").await.unwrap_err();
        assert_eq!(err.code, StatusCode::ResourceExhausted);
        assert_eq!(err.message, "too many requests for account");
    }

    #[tokio::test]
    async fn test_request_id_header_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/ns-1"))
            .and(header_exists(REQUEST_ID_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_json(operation_body("pending")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let ctx = CallContext::new();
        let body = serde_json::json!({ "retentionDays": 30 });

        let response: GetOperationResponse = RetryingInvoker::default()
            .invoke(&ctx, &body, CallOptions::new(), |req, opts| {
                let client = &client;
                let ctx = &ctx;
                async move {
                    client
                        .call(ctx, Method::POST, &["namespaces", "ns-1"], Some(req), &opts)
                        .await
                }
            })
            .await
            .unwrap();

        assert_eq!(response.async_operation.state, "pending");
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_request() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let ctx = CallContext::new();
        ctx.cancel();

        let err = client.get_async_operation(&ctx, "op-42").await.unwrap_err();
        assert_eq!(err.code, StatusCode::Cancelled);
    }

    #[tokio::test]
    async fn test_awaiter_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(operation_body("fulfilled")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let awaiter = OperationAwaiter::new(&client).with_tick(Duration::from_millis(10));

        let done = awaiter
            .wait(&CallContext::new(), Some(&AsyncOperation::from_id("op-42")))
            .await
            .unwrap();

        assert_eq!(done.operation_type.as_deref(), Some("update-namespace"));
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let config = ClientConfig {
            endpoint: String::from("not a url"),
            ..ClientConfig::default()
        };
        assert!(ControlPlaneClient::new(&config, None).is_err());
    }
}
