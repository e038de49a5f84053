//! Lifecycle events emitted by the orchestrator.
//!
//! An [`EventDispatcher`] observes the kernel at fixed points. For one batch
//! the order is:
//!
//! ```text
//! BeforeHandle
//!   UpdateReceived                      (per update)
//!     BeforeRequest  AfterRequest       (per matched group)
//!     HandlerGroupFailed                (instead of AfterRequest on failure)
//! AfterHandle
//! ```
//!
//! `PluginRegistered` and `HandlerGroupAdded` fire at registration time.
//!
//! Dispatchers run inline on the dispatch task and must not block. The kernel
//! ignores the event they return.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::context::{Request, Response};
use crate::error::GroupFailure;
use teleroute_core::Update;

/// A point in the kernel's lifecycle.
#[derive(Debug, Clone)]
pub enum KernelEvent {
    PluginRegistered {
        plugin: String,
        group_count: usize,
    },
    HandlerGroupAdded {
        group: String,
        priority: i32,
    },
    BeforeHandle {
        update_count: usize,
    },
    UpdateReceived {
        update: Arc<Update>,
    },
    BeforeRequest {
        group: String,
        request: Request,
    },
    AfterRequest {
        group: String,
        request: Request,
        response: Response,
    },
    HandlerGroupFailed {
        group: String,
        update_id: i64,
        failure: Arc<GroupFailure>,
    },
    AfterHandle {
        update_count: usize,
        response_count: usize,
    },
}

impl KernelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PluginRegistered { .. } => "plugin_registered",
            Self::HandlerGroupAdded { .. } => "handler_group_added",
            Self::BeforeHandle { .. } => "before_handle",
            Self::UpdateReceived { .. } => "update_received",
            Self::BeforeRequest { .. } => "before_request",
            Self::AfterRequest { .. } => "after_request",
            Self::HandlerGroupFailed { .. } => "handler_group_failed",
            Self::AfterHandle { .. } => "after_handle",
        }
    }
}

impl fmt::Display for KernelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer hook fired at lifecycle points.
pub trait EventDispatcher: Send + Sync + 'static {
    fn dispatch(&self, event: KernelEvent) -> KernelEvent;
}

/// A shared, type-erased event dispatcher.
pub type BoxedEventDispatcher = Arc<dyn EventDispatcher>;

impl<D: EventDispatcher + ?Sized> EventDispatcher for Arc<D> {
    fn dispatch(&self, event: KernelEvent) -> KernelEvent {
        (**self).dispatch(event)
    }
}

/// Dispatcher used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventDispatcher;

impl EventDispatcher for NoopEventDispatcher {
    fn dispatch(&self, event: KernelEvent) -> KernelEvent {
        event
    }
}

// =============================================================================
// ChannelEventDispatcher
// =============================================================================

/// Forwards a copy of every event into a tokio channel.
///
/// Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelEventDispatcher {
    tx: mpsc::UnboundedSender<KernelEvent>,
}

impl ChannelEventDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<KernelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventDispatcher for ChannelEventDispatcher {
    fn dispatch(&self, event: KernelEvent) -> KernelEvent {
        if self.tx.send(event.clone()).is_err() {
            trace!(event = event.name(), "Event receiver closed");
        }
        event
    }
}

// =============================================================================
// ListenerEventDispatcher
// =============================================================================

/// What a listener wants done with the event after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerFlow {
    Continue,
    /// Skip the listeners registered after this one.
    Stop,
}

type Listener = Arc<dyn Fn(&KernelEvent) -> ListenerFlow + Send + Sync>;

/// Calls closure listeners in registration order.
///
/// A listener returning [`ListenerFlow::Stop`] hides the event from later
/// listeners; the kernel itself is unaffected.
#[derive(Clone, Default)]
pub struct ListenerEventDispatcher {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl ListenerEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&self, listener: F) -> &Self
    where
        F: Fn(&KernelEvent) -> ListenerFlow + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl EventDispatcher for ListenerEventDispatcher {
    fn dispatch(&self, event: KernelEvent) -> KernelEvent {
        // Snapshot so listeners may register more listeners.
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            if listener(&event) == ListenerFlow::Stop {
                trace!(event = event.name(), "Event propagation stopped by listener");
                break;
            }
        }
        event
    }
}

impl fmt::Debug for ListenerEventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEventDispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> KernelEvent {
        KernelEvent::BeforeHandle { update_count: 2 }
    }

    #[test]
    fn test_noop_returns_event() {
        let returned = NoopEventDispatcher.dispatch(event());
        assert!(matches!(returned, KernelEvent::BeforeHandle { update_count: 2 }));
    }

    #[tokio::test]
    async fn test_channel_forwards_events() {
        let (dispatcher, mut rx) = ChannelEventDispatcher::new();
        dispatcher.dispatch(event());
        dispatcher.dispatch(KernelEvent::AfterHandle {
            update_count: 2,
            response_count: 1,
        });

        assert_eq!(rx.recv().await.unwrap().name(), "before_handle");
        assert_eq!(rx.recv().await.unwrap().name(), "after_handle");
    }

    #[test]
    fn test_channel_without_receiver() {
        let (dispatcher, rx) = ChannelEventDispatcher::new();
        drop(rx);
        assert_eq!(dispatcher.dispatch(event()).name(), "before_handle");
    }

    #[test]
    fn test_listener_stop_skips_later_listeners() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = ListenerEventDispatcher::new();

        let first = Arc::clone(&calls);
        let last = Arc::clone(&calls);
        dispatcher
            .listen(move |_| {
                first.fetch_add(1, Ordering::SeqCst);
                ListenerFlow::Stop
            })
            .listen(move |_| {
                last.fetch_add(100, Ordering::SeqCst);
                ListenerFlow::Continue
            });

        dispatcher.dispatch(event());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.len(), 2);
    }
}
