//! Per-dispatch context objects.
//!
//! - [`Request`] — what a handler group's chain receives: the update, the API
//!   client, the logging span and an attribute map. One is built fresh for
//!   every (update, matched group) pair, so groups never observe each other's
//!   requests.
//! - [`Response`] — what a chain produces: a status, an attribute map, and the
//!   stop-propagation flag the orchestrator checks between groups.
//!
//! Both are persistent values. Every `with_*` method returns a new instance
//! and leaves the receiver untouched; attribute maps are shared behind an
//! `Arc` and copied only when a clone is extended.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::Span;

use crate::error::{AttributeError, AttributeResult};
use teleroute_core::{BoxedApiClient, Update};

type AttributeValue = Arc<dyn Any + Send + Sync>;

// =============================================================================
// Attributes
// =============================================================================

/// A copy-on-write map from string keys to values of any type.
#[derive(Clone, Default)]
pub struct Attributes {
    map: Arc<HashMap<String, AttributeValue>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new map with `key` bound to `value`.
    ///
    /// The receiver is not modified. Rebinding an existing key shadows the
    /// old value in the returned map only.
    pub fn with<T>(&self, key: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        let mut next = self.clone();
        Arc::make_mut(&mut next.map).insert(key.into(), Arc::new(value));
        next
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Looks up `key` and downcasts it to `T`.
    pub fn get<T: 'static>(&self, key: &str) -> AttributeResult<&T> {
        let value = self
            .map
            .get(key)
            .ok_or_else(|| AttributeError::NotFound(key.to_string()))?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| AttributeError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_set().entries(keys).finish()
    }
}

// =============================================================================
// Request
// =============================================================================

/// The context handed to a handler group's middleware chain.
///
/// # Example
///
/// ```rust,ignore
/// async fn greet(request: Request) -> HandlerResult {
///     let _guard = request.span().enter();
///     info!(update_id = request.update().update_id, "greeting");
///     let request = request.with_attribute("greeted", true);
///     Ok(Response::handled())
/// }
/// ```
#[derive(Clone)]
pub struct Request {
    update: Arc<Update>,
    api: BoxedApiClient,
    span: Span,
    attributes: Attributes,
}

impl Request {
    /// Creates a request with an empty attribute map.
    pub fn new(update: Arc<Update>, api: BoxedApiClient, span: Span) -> Self {
        Self {
            update,
            api,
            span,
            attributes: Attributes::new(),
        }
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn update_arc(&self) -> Arc<Update> {
        Arc::clone(&self.update)
    }

    /// Returns the API client handle.
    pub fn api(&self) -> &BoxedApiClient {
        &self.api
    }

    /// Returns the span handlers should log within.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Returns a new request with `key` bound to `value`.
    pub fn with_attribute<T>(&self, key: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            attributes: self.attributes.with(key, value),
            ..self.clone()
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.has(key)
    }

    pub fn get<T: 'static>(&self, key: &str) -> AttributeResult<&T> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("update_id", &self.update.update_id)
            .field("update_type", &self.update.update_type())
            .field("api", &self.api.id())
            .field("attributes", &self.attributes)
            .finish()
    }
}

// =============================================================================
// Response
// =============================================================================

/// Outcome reported by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// The handler acted on the update.
    Handled,
    /// The handler matched but chose not to act.
    Ignored,
}

/// The result of running one handler group's chain.
#[derive(Debug, Clone)]
pub struct Response {
    status: ResponseStatus,
    attributes: Attributes,
    propagation_stopped: bool,
}

impl Response {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            status,
            attributes: Attributes::new(),
            propagation_stopped: false,
        }
    }

    pub fn handled() -> Self {
        Self::new(ResponseStatus::Handled)
    }

    pub fn ignored() -> Self {
        Self::new(ResponseStatus::Ignored)
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn with_status(&self, status: ResponseStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Returns a new response with `key` bound to `value`.
    pub fn with_attribute<T>(&self, key: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            attributes: self.attributes.with(key, value),
            ..self.clone()
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.has(key)
    }

    pub fn get<T: 'static>(&self, key: &str) -> AttributeResult<&T> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns a copy that tells the orchestrator to skip every lower-priority
    /// group for the current update.
    pub fn with_propagation_stopped(&self) -> Self {
        Self {
            propagation_stopped: true,
            ..self.clone()
        }
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::handled()
    }
}
