//! Typed client for the MiniCloud REST API.
//!
//! Each method maps to one backend endpoint. Protected endpoints go through
//! [`Gateway::send`]; sign-in and health use [`Gateway::send_public`].

use std::fmt;
use std::sync::Arc;

use reqwest::{multipart, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::gateway::{ApiRequest, Gateway};
use super::ApiError;
use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::{
    AuthResponse, Bucket, ExecutionResult, LambdaFunction, LoginRequest, NewFunction, QueueMessage,
    RegisterRequest, StoredObject,
};

/// Multipart field the upload endpoint reads the file from
const UPLOAD_FIELD: &str = "file";

/// Liveness as reported by `/actuator/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    /// Health endpoint answered 2xx
    Ok,
    /// Backend reachable but reported a failure status
    Unavailable,
    /// No answer at all
    Down,
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendStatus::Ok => f.write_str("ok"),
            BackendStatus::Unavailable => f.write_str("unavailable"),
            BackendStatus::Down => f.write_str("down"),
        }
    }
}

/// API client for MiniCloud.
/// Clone is cheap - the gateway shares its connection pool and session.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Build a client for the configured backend
    pub fn from_config(config: &Config, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let gateway = Gateway::new(&config.base_url, config.request_timeout(), session)?;
        Ok(Self::new(gateway))
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.gateway.session()
    }

    // ===== Authentication =====

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(["api", "auth", "login"]).json(&LoginRequest { email, password })?;
        let response = self.gateway.send_public(request).await?;
        read_json(response).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(["api", "auth", "register"]).json(&RegisterRequest {
            name,
            email,
            password,
        })?;
        let response = self.gateway.send_public(request).await?;
        read_json(response).await
    }

    /// Check the backend. Never fails; the outcome is the status itself.
    pub async fn health(&self) -> BackendStatus {
        match self
            .gateway
            .send_public(ApiRequest::get(["actuator", "health"]))
            .await
        {
            Ok(_) => BackendStatus::Ok,
            Err(ApiError::RequestFailed { status, .. }) => {
                debug!(%status, "Health check reported failure");
                BackendStatus::Unavailable
            }
            Err(e) => {
                debug!(error = %e, "Health check got no answer");
                BackendStatus::Down
            }
        }
    }

    // ===== Buckets =====

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, ApiError> {
        self.get_json(ApiRequest::get(["api", "buckets"])).await
    }

    pub async fn create_bucket(&self, name: &str) -> Result<Bucket, ApiError> {
        self.get_json(ApiRequest::post(["api", "buckets"]).query("name", name))
            .await
    }

    pub async fn get_bucket(&self, id: i64) -> Result<Bucket, ApiError> {
        self.get_json(ApiRequest::get(["api".to_string(), "buckets".to_string(), id.to_string()]))
            .await
    }

    pub async fn delete_bucket(&self, id: i64) -> Result<(), ApiError> {
        self.gateway
            .send(ApiRequest::delete(["api".to_string(), "buckets".to_string(), id.to_string()]))
            .await?;
        Ok(())
    }

    // ===== Objects =====

    pub async fn upload_object(
        &self,
        bucket: &str,
        file_name: &str,
        contents: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<StoredObject, ApiError> {
        let mut part = multipart::Part::bytes(contents).file_name(file_name.to_string());
        if let Some(content_type) = content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid content type: {}", e)))?;
        }
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);
        let request = ApiRequest::post(["api", "s3", "buckets", bucket, "upload"]).multipart(form);
        self.get_json(request).await
    }

    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<StoredObject>, ApiError> {
        self.get_json(ApiRequest::get(["api", "s3", "buckets", bucket, "objects"]))
            .await
    }

    pub async fn download_object(&self, object_key: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .gateway
            .send(ApiRequest::get(["api", "s3", "objects", object_key, "download"]))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Shareable download link carrying the token as a query parameter,
    /// for opening outside this client.
    pub fn object_url(&self, object_key: &str) -> Result<Url, ApiError> {
        let token = self.session().token().ok_or(ApiError::Unauthenticated)?;
        let mut url = self
            .gateway
            .url_for(&["api", "s3", "objects", object_key, "download"])?;
        url.query_pairs_mut().append_pair("token", &token);
        Ok(url)
    }

    pub async fn delete_object(&self, object_key: &str) -> Result<(), ApiError> {
        self.gateway
            .send(ApiRequest::delete(["api", "s3", "objects", object_key]))
            .await?;
        Ok(())
    }

    // ===== Functions =====

    pub async fn create_function(&self, function: &NewFunction) -> Result<LambdaFunction, ApiError> {
        self.get_json(ApiRequest::post(["api", "lambda", "create"]).json(function)?)
            .await
    }

    pub async fn list_functions(&self) -> Result<Vec<LambdaFunction>, ApiError> {
        self.get_json(ApiRequest::get(["api", "lambda", "functions"])).await
    }

    /// Run a function and wait for its result. `input` becomes the event
    /// object passed to the handler.
    pub async fn invoke_function(
        &self,
        name: &str,
        input: Option<&serde_json::Value>,
    ) -> Result<ExecutionResult, ApiError> {
        let mut request = ApiRequest::post(["api", "lambda", "execute", name]);
        if let Some(input) = input {
            request = request.json(input)?;
        }
        self.get_json(request).await
    }

    // ===== Queues =====

    pub async fn send_message(&self, queue: &str, payload: &str) -> Result<QueueMessage, ApiError> {
        let request = ApiRequest::post(["api", "queue", "send"])
            .query("queue", queue)
            .text(payload);
        self.get_json(request).await
    }

    pub async fn list_messages(&self, queue: &str) -> Result<Vec<QueueMessage>, ApiError> {
        self.get_json(ApiRequest::get(["api", "queue", "messages"]).query("queue", queue))
            .await
    }

    /// Take the next pending message off `queue`, if there is one.
    /// The backend marks it as processing until it is acknowledged.
    pub async fn receive_message(&self, queue: &str) -> Result<Option<QueueMessage>, ApiError> {
        let request = ApiRequest::get(["api", "queue", "receive"]).query("queueName", queue);
        match self.get_json(request).await {
            Ok(message) => Ok(Some(message)),
            // Empty queue
            Err(ApiError::RequestFailed { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Settle a received message. A failed message is retried until it runs
    /// out of retries and lands in the dead letter state.
    pub async fn ack_message(&self, id: i64, success: bool) -> Result<(), ApiError> {
        let request = ApiRequest::post(["api".to_string(), "queue".to_string(), "ack".to_string(), id.to_string()])
            .query("success", success.to_string());
        self.gateway.send(request).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.gateway.send(request).await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let url = response.url().clone();
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url.path(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let session = Arc::new(SessionStore::in_memory());
        session.set_credential("tok", "ada@example.com");
        let gateway = Gateway::new(&server.uri(), Duration::from_secs(5), session).unwrap();
        ApiClient::new(gateway)
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(serde_json::json!({"email": "ada@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "abc", "email": "ada@example.com", "name": "Ada"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = client_for(&server).login("ada@example.com", "pw").await.unwrap();
        assert_eq!(auth.token, "abc");
        assert_eq!(auth.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_create_bucket_uses_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/buckets"))
            .and(query_param("name", "photos"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 4, "name": "photos"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let bucket = client_for(&server).create_bucket("photos").await.unwrap();
        assert_eq!(bucket.id, 4);
    }

    #[tokio::test]
    async fn test_upload_sends_file_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/s3/buckets/photos/upload"))
            .and(body_string_contains("name=\"file\""))
            .and(body_string_contains("filename=\"cat.png\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "objectKey": "photos/cat.png", "fileName": "cat.png", "size": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let object = client_for(&server)
            .upload_object("photos", "cat.png", b"png".to_vec(), Some("image/png"))
            .await
            .unwrap();
        assert_eq!(object.object_key, "photos/cat.png");
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/s3/objects/report.pdf/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&server)
            .await;

        let bytes = client_for(&server).download_object("report.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF");
    }

    #[tokio::test]
    async fn test_list_messages_passes_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/queue/messages"))
            .and(query_param("queue", "default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "messageBody": "hi", "status": "PENDING"}
            ])))
            .mount(&server)
            .await;

        let messages = client_for(&server).list_messages("default").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_body, "hi");
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/lambda/functions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).list_functions().await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/actuator/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "UP"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/actuator/health"))
            .respond_with(ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE.as_u16()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.health().await, BackendStatus::Ok);
        assert_eq!(client.health().await, BackendStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_health_down_when_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway = Gateway::new(
            &format!("http://{}", addr),
            Duration::from_secs(5),
            Arc::new(SessionStore::in_memory()),
        )
        .unwrap();
        assert_eq!(ApiClient::new(gateway).health().await, BackendStatus::Down);
    }

    #[tokio::test]
    async fn test_object_url_carries_token() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let url = client.object_url("photos/cat 1.png").unwrap();
        assert_eq!(url.path(), "/api/s3/objects/photos%2Fcat%201.png/download");
        assert_eq!(url.query(), Some("token=tok"));

        client.session().clear_credential();
        assert!(matches!(client.object_url("x"), Err(ApiError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_get_bucket_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/buckets/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 7, "name": "logs"})))
            .expect(1)
            .mount(&server)
            .await;

        let bucket = client_for(&server).get_bucket(7).await.unwrap();
        assert_eq!(bucket.name, "logs");
    }

    #[tokio::test]
    async fn test_invoke_function_sends_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/lambda/execute/resize"))
            .and(body_json(serde_json::json!({"width": 64})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "executionId": "e-9", "success": true, "output": "ok", "executionTimeMs": 12
            })))
            .expect(1)
            .mount(&server)
            .await;

        let input = serde_json::json!({"width": 64});
        let result = client_for(&server)
            .invoke_function("resize", Some(&input))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.message(), "ok");
        assert_eq!(result.execution_time_ms, 12);
    }

    #[tokio::test]
    async fn test_receive_message_and_empty_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/queue/receive"))
            .and(query_param("queueName", "jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 5, "messageBody": "work", "status": "PROCESSING"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/queue/receive"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let message = client.receive_message("jobs").await.unwrap().unwrap();
        assert_eq!(message.id, Some(5));
        assert!(client.receive_message("jobs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ack_message_reports_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/queue/ack/5"))
            .and(query_param("success", "false"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).ack_message(5, false).await.unwrap();
    }
}
