//! Authenticated request gateway.
//!
//! Every protected call goes through [`Gateway::send`], which attaches the
//! active credential as `X-Auth-Token` and turns a 401 into a session-wide
//! event: the credential is cleared and the re-authentication signal raised.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{multipart, Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::SessionStore;

/// Header carrying the session token on every authenticated call
pub const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Text(String),
    Multipart(multipart::Form),
}

/// Description of one call: method, path segments, query and body.
///
/// Path segments are percent-encoded individually, so bucket names and
/// object keys can be passed through unchanged.
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl ApiRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::GET, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::POST, segments)
    }

    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::DELETE, segments)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    pub fn multipart(mut self, form: multipart::Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }
}

/// HTTP gateway bound to one backend and one session.
/// Clone is cheap - the reqwest client and the session are shared.
#[derive(Clone)]
pub struct Gateway {
    client: Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl Gateway {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "Base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Resolve path segments against the base URL
    pub fn url_for<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("Base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments.iter().map(AsRef::as_ref));
        Ok(url)
    }

    /// Send a request that requires the active credential.
    ///
    /// Fails with `Unauthenticated` without touching the network when no
    /// credential is active. Never retries.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let Some(credential) = self.session.credential() else {
            if self.session.reauth_signal().raise() {
                warn!("No active session, sign-in required");
            }
            return Err(ApiError::Unauthenticated);
        };

        let response = self.dispatch(request, Some(&credential.token)).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = error_body(response).await;
        let err = ApiError::from_status(status, &body);
        if err.requires_login() {
            self.reject(&credential.token);
        }
        Err(err)
    }

    /// Send a request that carries no credential (sign-in, health).
    /// A 401 here is an ordinary failed response.
    pub async fn send_public(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let response = self.dispatch(request, None).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = error_body(response).await;
        Err(ApiError::request_failed(status, &body))
    }

    async fn dispatch(&self, request: ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.url_for(&request.segments)?;
        debug!(method = %request.method, url = %url, "Dispatching request");

        let mut builder = self
            .client
            .request(request.method, url.clone());
        if let Some(token) = token {
            builder = builder.header(AUTH_HEADER, token);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Text(text) => builder
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(text),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request did not complete");
            ApiError::NetworkError(Arc::new(e))
        })
    }

    // A rejection of a token that has since been replaced says nothing about
    // the current session, so the signal is left alone.
    fn reject(&self, token: &str) {
        let cleared = self.session.clear_if_current(token);
        if !cleared && self.session.is_authenticated() {
            debug!("Rejected token is no longer current, session kept");
            return;
        }
        if self.session.reauth_signal().raise() {
            warn!(status = %StatusCode::UNAUTHORIZED, "Session rejected, sign-in required");
        }
    }
}

/// Body of a failed response, empty if it cannot be read
async fn error_body(response: Response) -> String {
    let url = response.url().clone();
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to read error response body");
            String::new()
        }
    }
}
