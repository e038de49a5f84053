//! The API client handle.
//!
//! Every request handed to a handler carries an [`ApiClient`]. The dispatch
//! kernel never calls it; it is purely a capability for handlers that want to
//! talk back to the Bot API. Concrete clients live outside this workspace and
//! are reached through [`ApiClient::as_any`] when a handler needs the full
//! typed surface.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// Outbound capability passed through to handlers.
#[async_trait]
pub trait ApiClient: Send + Sync + 'static {
    /// Returns an identifier for this client (typically the bot username).
    fn id(&self) -> &str;

    /// Calls a Bot API method with JSON parameters.
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value>;

    /// Upcasts to `Any` so handlers can recover the concrete client.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Shared handle to an API client.
pub type BoxedApiClient = Arc<dyn ApiClient>;

/// Downcasts a client handle to its concrete type.
pub fn downcast_client<T: ApiClient>(client: &BoxedApiClient) -> Option<Arc<T>> {
    Arc::clone(client).as_any().downcast::<T>().ok()
}

/// A client with no transport behind it.
///
/// Useful for wiring the kernel in tests or when handlers never reply.
#[derive(Debug, Clone, Default)]
pub struct NoopApiClient;

#[async_trait]
impl ApiClient for NoopApiClient {
    fn id(&self) -> &str {
        "noop"
    }

    async fn call(&self, method: &str, _params: Value) -> ApiResult<Value> {
        debug!(method, "Dropping API call on noop client");
        Err(ApiError::NotConnected)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
