//! Cached access to MiniCloud resources.
//!
//! The `Console` is what front ends talk to. Reads go through one
//! `ResourceCache` per resource kind, mutations go straight to the API and
//! then invalidate whatever lists they made stale.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, BackendStatus};
use crate::auth::SessionStore;
use crate::cache::{CacheKey, ResourceCache};
use crate::config::Config;
use crate::models::{
    AuthResponse, Bucket, ExecutionResult, LambdaFunction, NewFunction, QueueMessage, StoredObject,
};

/// Queue used when none is named
pub const DEFAULT_QUEUE: &str = "default";

type ListCache<T> = ResourceCache<CacheKey, Arc<Vec<T>>, ApiError>;

/// Clone is cheap - clones share the API client, session and caches.
#[derive(Clone)]
pub struct Console {
    api: ApiClient,
    ttl: Duration,
    buckets: ListCache<Bucket>,
    objects: ListCache<StoredObject>,
    functions: ListCache<LambdaFunction>,
    messages: ListCache<QueueMessage>,
}

impl Console {
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            buckets: ResourceCache::new(),
            objects: ResourceCache::new(),
            functions: ResourceCache::new(),
            messages: ResourceCache::new(),
        }
    }

    pub fn from_config(config: &Config, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        Ok(Self::new(ApiClient::from_config(config, session)?, config.cache_ttl()))
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.api.session()
    }

    // ===== Session =====

    /// Sign in and make the returned token the active credential
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let auth = self.api.login(email, password).await?;
        self.start_session(&auth, email);
        Ok(auth)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let auth = self.api.register(name, email, password).await?;
        self.start_session(&auth, email);
        Ok(auth)
    }

    /// Clear the session and every cached list. Returns whether a session
    /// was active.
    pub fn logout(&self) -> bool {
        let cleared = self.session().clear_credential();
        let dropped = self.reset();
        info!(cleared, dropped, "Logged out");
        cleared
    }

    fn start_session(&self, auth: &AuthResponse, email: &str) {
        // Lists cached or still loading for a previous account must not leak
        // into this one
        self.reset();
        let identity = auth.email.clone().unwrap_or_else(|| email.to_string());
        self.session().set_credential(auth.token.clone(), identity);
    }

    pub async fn health(&self) -> BackendStatus {
        self.api.health().await
    }

    // ===== Buckets =====

    pub async fn buckets(&self, force: bool) -> Result<Arc<Vec<Bucket>>, ApiError> {
        let api = self.api.clone();
        self.buckets
            .get(CacheKey::Buckets, self.ttl, force, move || async move {
                api.list_buckets().await.map(Arc::new)
            })
            .await
    }

    pub async fn create_bucket(&self, name: &str) -> Result<Bucket, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidRequest("Bucket name required".to_string()));
        }
        let bucket = self.api.create_bucket(name).await?;
        self.buckets.invalidate(&CacheKey::Buckets);
        Ok(bucket)
    }

    /// One bucket by id, from the cached list when it is fresh
    pub async fn bucket(&self, id: i64) -> Result<Bucket, ApiError> {
        let cached = self
            .buckets
            .peek(&CacheKey::Buckets)
            .and_then(|buckets| buckets.iter().find(|b| b.id == id).cloned());
        match cached {
            Some(bucket) => Ok(bucket),
            None => self.api.get_bucket(id).await,
        }
    }

    pub async fn delete_bucket(&self, id: i64) -> Result<(), ApiError> {
        let name = self
            .buckets
            .peek(&CacheKey::Buckets)
            .and_then(|buckets| buckets.iter().find(|b| b.id == id).map(|b| b.name.clone()));

        self.api.delete_bucket(id).await?;

        self.buckets.invalidate(&CacheKey::Buckets);
        match name {
            Some(name) => {
                self.objects.invalidate(&CacheKey::objects(name));
            }
            None => {
                self.objects.invalidate_matching(CacheKey::is_objects);
            }
        }
        Ok(())
    }

    // ===== Objects =====

    pub async fn objects(&self, bucket: &str, force: bool) -> Result<Arc<Vec<StoredObject>>, ApiError> {
        let api = self.api.clone();
        let name = bucket.to_string();
        self.objects
            .get(CacheKey::objects(bucket), self.ttl, force, move || async move {
                api.list_objects(&name).await.map(Arc::new)
            })
            .await
    }

    pub async fn upload(
        &self,
        bucket: &str,
        file_name: &str,
        contents: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<StoredObject, ApiError> {
        if bucket.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Select a bucket first".to_string()));
        }
        let object = self
            .api
            .upload_object(bucket, file_name, contents, content_type)
            .await?;
        self.objects.invalidate(&CacheKey::objects(bucket));
        Ok(object)
    }

    /// Upload a local file under its own file name
    pub async fn upload_file(&self, bucket: &str, path: &Path) -> Result<StoredObject, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::InvalidRequest(format!("Not a file: {}", path.display())))?
            .to_string();
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read {}: {}", path.display(), e)))?;
        debug!(bucket, file = %file_name, bytes = contents.len(), "Uploading file");
        self.upload(bucket, &file_name, contents, None).await
    }

    pub async fn download(&self, object_key: &str) -> Result<Vec<u8>, ApiError> {
        self.api.download_object(object_key).await
    }

    pub fn object_url(&self, object_key: &str) -> Result<reqwest::Url, ApiError> {
        self.api.object_url(object_key)
    }

    pub async fn delete_object(&self, object_key: &str) -> Result<(), ApiError> {
        self.api.delete_object(object_key).await?;
        // The key alone does not say which bucket listed it
        self.objects.invalidate_matching(CacheKey::is_objects);
        Ok(())
    }

    // ===== Functions =====

    pub async fn functions(&self, force: bool) -> Result<Arc<Vec<LambdaFunction>>, ApiError> {
        let api = self.api.clone();
        self.functions
            .get(CacheKey::Functions, self.ttl, force, move || async move {
                api.list_functions().await.map(Arc::new)
            })
            .await
    }

    pub async fn create_function(&self, function: &NewFunction) -> Result<LambdaFunction, ApiError> {
        if function.function_name.trim().is_empty() || function.code.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "Function name and code required".to_string(),
            ));
        }
        let created = self.api.create_function(function).await?;
        self.functions.invalidate(&CacheKey::Functions);
        Ok(created)
    }

    /// Run a function. Executions do not change the function list.
    pub async fn invoke_function(
        &self,
        name: &str,
        input: Option<&serde_json::Value>,
    ) -> Result<ExecutionResult, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidRequest("Function name required".to_string()));
        }
        let result = self.api.invoke_function(name, input).await?;
        debug!(function = name, success = result.success, ms = result.execution_time_ms, "Function ran");
        Ok(result)
    }

    // ===== Queues =====

    pub async fn messages(&self, queue: &str, force: bool) -> Result<Arc<Vec<QueueMessage>>, ApiError> {
        let api = self.api.clone();
        let queue = queue_name(queue).to_string();
        let key = CacheKey::messages(queue.clone());
        self.messages
            .get(key, self.ttl, force, move || async move {
                api.list_messages(&queue).await.map(Arc::new)
            })
            .await
    }

    pub async fn send_message(&self, queue: &str, payload: &str) -> Result<QueueMessage, ApiError> {
        let queue = queue_name(queue);
        let message = self.api.send_message(queue, payload).await?;
        self.messages.invalidate(&CacheKey::messages(queue));
        Ok(message)
    }

    /// Take the next pending message. The queue's listing is stale after
    /// this, since the message is now processing.
    pub async fn receive_message(&self, queue: &str) -> Result<Option<QueueMessage>, ApiError> {
        let queue = queue_name(queue);
        let message = self.api.receive_message(queue).await?;
        if message.is_some() {
            self.messages.invalidate(&CacheKey::messages(queue));
        }
        Ok(message)
    }

    pub async fn ack_message(&self, id: i64, success: bool) -> Result<(), ApiError> {
        self.api.ack_message(id, success).await?;
        // The id alone does not say which queue listed it
        self.messages.invalidate_matching(CacheKey::is_messages);
        Ok(())
    }

    /// Drop every cached list and detach fetches still running, so nothing
    /// loaded before this call is stored afterwards
    pub fn reset(&self) -> usize {
        self.buckets.reset() + self.objects.reset() + self.functions.reset() + self.messages.reset()
    }
}

fn queue_name(queue: &str) -> &str {
    let queue = queue.trim();
    if queue.is_empty() {
        DEFAULT_QUEUE
    } else {
        queue
    }
}
