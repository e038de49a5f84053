//! The update orchestrator.
//!
//! [`UpdateHandler`] owns the group table, pulls updates from an
//! [`UpdateSource`] and dispatches each one to every matching
//! [`HandlerGroup`] in priority order.
//!
//! # Dispatch
//!
//! For one update:
//!
//! 1. Take the sorted group snapshot, re-sorting only if a registration
//!    invalidated it.
//! 2. Evaluate each group's checker exactly once. A panicking checker counts
//!    as a failure of that group alone.
//! 3. For every match, build a fresh [`Request`], compose the group's chain
//!    and run it. Errors and panics are logged and reported as
//!    [`KernelEvent::HandlerGroupFailed`]; the loop moves on.
//! 4. Collect every response. Under [`DispatchPolicy::FanOut`] that is one
//!    per matched group unless a response stops propagation; under
//!    [`DispatchPolicy::FirstMatch`] it is at most one.
//!
//! Registration may happen while updates are being dispatched. An update in
//! flight keeps the snapshot it started with.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, debug_span, error, info, info_span, trace, warn};

use crate::context::{Request, Response};
use crate::error::{GroupFailure, KernelError, KernelResult, RegistrationError};
use crate::event::{BoxedEventDispatcher, EventDispatcher, KernelEvent, NoopEventDispatcher};
use crate::group::HandlerGroup;
use crate::handler::RequestHandler;
use crate::plugin::Plugin;
use teleroute_core::{
    ApiClient, BoxedApiClient, NoopApiClient, SourceError, Update, UpdateSource,
};

/// How many matching groups handle one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPolicy {
    /// Every matching group runs, unless a response stops propagation.
    #[default]
    FanOut,
    /// Dispatch ends with the first group that returns a response. Groups
    /// that fail are reported and the next match is tried.
    FirstMatch,
}

// =============================================================================
// GroupTable
// =============================================================================

#[derive(Default)]
struct GroupTable {
    entries: Vec<(u64, HandlerGroup)>,
    next_seq: u64,
    plugins: HashSet<String>,
    /// `None` when a registration happened since the last sort.
    sorted: Option<Arc<[HandlerGroup]>>,
}

impl GroupTable {
    fn push(&mut self, group: HandlerGroup) {
        self.entries.push((self.next_seq, group));
        self.next_seq += 1;
        self.sorted = None;
    }

    fn snapshot(&mut self) -> Arc<[HandlerGroup]> {
        if let Some(sorted) = &self.sorted {
            return Arc::clone(sorted);
        }
        let mut entries: Vec<&(u64, HandlerGroup)> = self.entries.iter().collect();
        entries.sort_by_key(|(seq, group)| (Reverse(group.priority()), *seq));
        let sorted: Arc<[HandlerGroup]> = entries.into_iter().map(|(_, g)| g.clone()).collect();
        trace!(groups = sorted.len(), "Re-sorted handler groups");
        self.sorted = Some(Arc::clone(&sorted));
        sorted
    }
}

// =============================================================================
// UpdateHandler
// =============================================================================

/// The root of the dispatch kernel.
///
/// `UpdateHandler` is `Send + Sync`; wrap it in an `Arc` to register groups
/// from other tasks while it listens.
pub struct UpdateHandler {
    source: Arc<dyn UpdateSource>,
    api: BoxedApiClient,
    events: BoxedEventDispatcher,
    policy: DispatchPolicy,
    span: Span,
    table: RwLock<GroupTable>,
}

impl UpdateHandler {
    /// Creates an orchestrator with default settings.
    pub fn new<S: UpdateSource>(source: S) -> Self {
        Self::builder(source).build()
    }

    pub fn builder<S: UpdateSource>(source: S) -> UpdateHandlerBuilder {
        UpdateHandlerBuilder::new(Arc::new(source))
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn api_client(&self) -> &BoxedApiClient {
        &self.api
    }

    /// Returns the number of registered groups.
    pub fn group_count(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Returns the names of the registered plugins, sorted.
    pub fn plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().plugins.iter().cloned().collect();
        names.sort();
        names
    }

    /// Registers every group a plugin supplies.
    ///
    /// The plugin name must be non-empty and not yet registered. On error the
    /// group table is unchanged.
    pub fn register_plugin<P: Plugin + ?Sized>(
        &self,
        plugin: &P,
    ) -> Result<(), RegistrationError> {
        let name = plugin.name();
        if name.trim().is_empty() {
            return Err(RegistrationError::EmptyPluginName);
        }
        if self.table.read().plugins.contains(name) {
            return Err(RegistrationError::DuplicatePlugin(name.to_string()));
        }

        let groups = plugin.handler_groups();
        let group_count = groups.len();
        {
            let mut table = self.table.write();
            // Re-checked under the write lock for concurrent registrations.
            if !table.plugins.insert(name.to_string()) {
                return Err(RegistrationError::DuplicatePlugin(name.to_string()));
            }
            for group in groups {
                table.push(group);
            }
        }

        info!(plugin = name, groups = group_count, "Registered plugin");
        self.events.dispatch(KernelEvent::PluginRegistered {
            plugin: name.to_string(),
            group_count,
        });
        Ok(())
    }

    /// Registers a single group.
    pub fn add_handler_group(&self, group: HandlerGroup) {
        let label = group.label().to_string();
        let priority = group.priority();
        self.table.write().push(group);

        debug!(group = %label, priority, "Added handler group");
        self.events.dispatch(KernelEvent::HandlerGroupAdded {
            group: label,
            priority,
        });
    }

    fn sorted_groups(&self) -> Arc<[HandlerGroup]> {
        let cached = self.table.read().sorted.clone();
        match cached {
            Some(sorted) => sorted,
            None => self.table.write().snapshot(),
        }
    }

    /// Dispatches one update and returns the responses of the groups that
    /// handled it, in priority order.
    pub async fn handle_update(&self, update: Update) -> Vec<Response> {
        let update = Arc::new(update);
        let span = info_span!(
            parent: &self.span,
            "update",
            update_id = update.update_id,
            update_type = %update.update_type(),
        );
        self.dispatch(update).instrument(span).await
    }

    async fn dispatch(&self, update: Arc<Update>) -> Vec<Response> {
        let groups = self.sorted_groups();
        let update_id = update.update_id;
        self.events.dispatch(KernelEvent::UpdateReceived {
            update: Arc::clone(&update),
        });

        let mut responses = Vec::new();
        for group in groups.iter() {
            let label = group.label();

            let checked = catch_unwind(AssertUnwindSafe(|| group.checker().check(&update)));
            let matched = match checked {
                Ok(matched) => matched,
                Err(payload) => {
                    let failure = GroupFailure::CheckerPanicked(panic_message(&*payload));
                    self.report_failure(group, update_id, failure);
                    continue;
                }
            };
            if !matched {
                trace!(group = label, "Checker did not match");
                continue;
            }

            let group_span = debug_span!("group", group = label, priority = group.priority());
            let request = Request::new(
                Arc::clone(&update),
                Arc::clone(&self.api),
                group_span.clone(),
            );
            let chain = group.chain();

            self.events.dispatch(KernelEvent::BeforeRequest {
                group: label.to_string(),
                request: request.clone(),
            });

            let outcome = AssertUnwindSafe(chain.handle(request.clone()))
                .catch_unwind()
                .instrument(group_span)
                .await;

            match outcome {
                Ok(Ok(response)) => {
                    self.events.dispatch(KernelEvent::AfterRequest {
                        group: label.to_string(),
                        request,
                        response: response.clone(),
                    });
                    let stopped = response.is_propagation_stopped();
                    responses.push(response);
                    if stopped {
                        debug!(group = label, "Propagation stopped, skipping remaining groups");
                        break;
                    }
                    if self.policy == DispatchPolicy::FirstMatch {
                        trace!(group = label, "First matching group handled the update");
                        break;
                    }
                }
                Ok(Err(e)) => {
                    self.report_failure(group, update_id, GroupFailure::HandlerFailed(e));
                }
                Err(payload) => {
                    let failure = GroupFailure::HandlerPanicked(panic_message(&*payload));
                    self.report_failure(group, update_id, failure);
                }
            }
        }

        debug!(responses = responses.len(), "Update dispatched");
        responses
    }

    fn report_failure(&self, group: &HandlerGroup, update_id: i64, failure: GroupFailure) {
        error!(group = group.label(), update_id, error = %failure, "Handler group failed");
        self.events.dispatch(KernelEvent::HandlerGroupFailed {
            group: group.label().to_string(),
            update_id,
            failure: Arc::new(failure),
        });
    }

    /// Pulls one batch from the source and dispatches it in order.
    ///
    /// Returns each update id paired with its responses.
    pub async fn handle(&self) -> KernelResult<Vec<(i64, Vec<Response>)>> {
        let updates = self.source.get_updates().await?;
        let update_count = updates.len();
        self.events.dispatch(KernelEvent::BeforeHandle { update_count });

        let mut results = Vec::with_capacity(update_count);
        for update in updates {
            let update_id = update.update_id;
            let responses = self.handle_update(update).await;
            results.push((update_id, responses));
        }

        let response_count = results.iter().map(|(_, r)| r.len()).sum();
        self.events.dispatch(KernelEvent::AfterHandle {
            update_count,
            response_count,
        });
        Ok(results)
    }

    /// Handles batches forever, sleeping `timeout_secs` between them.
    ///
    /// Returns early only if the source closes. A negative timeout is rejected
    /// before the first pull.
    pub async fn listen(&self, timeout_secs: i64) -> KernelResult<()> {
        self.listen_until(timeout_secs, CancellationToken::new()).await
    }

    /// Like [`listen`](Self::listen), but also stops once `token` is
    /// cancelled. Cancellation is observed between batches.
    pub async fn listen_until(
        &self,
        timeout_secs: i64,
        token: CancellationToken,
    ) -> KernelResult<()> {
        let interval = poll_interval(timeout_secs)?;
        info!(interval_secs = timeout_secs, policy = ?self.policy, "Listening for updates");

        while !token.is_cancelled() {
            match self.handle().await {
                Ok(results) => trace!(updates = results.len(), "Batch handled"),
                Err(KernelError::Source(SourceError::Closed)) => {
                    info!("Update source closed, stopping");
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "Failed to pull updates"),
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Listener cancelled");
        Ok(())
    }
}

fn poll_interval(timeout_secs: i64) -> KernelResult<Duration> {
    u64::try_from(timeout_secs)
        .map(Duration::from_secs)
        .map_err(|_| {
            KernelError::configuration(format!(
                "listen timeout must not be negative, got {timeout_secs}"
            ))
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Debug for UpdateHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read();
        f.debug_struct("UpdateHandler")
            .field("api", &self.api.id())
            .field("policy", &self.policy)
            .field("groups", &table.entries.len())
            .field("plugins", &table.plugins.len())
            .finish()
    }
}

// =============================================================================
// UpdateHandlerBuilder
// =============================================================================

/// Builder for [`UpdateHandler`].
///
/// ```rust,ignore
/// let (events, rx) = ChannelEventDispatcher::new();
/// let handler = UpdateHandler::builder(source)
///     .api_client(client)
///     .event_dispatcher(events)
///     .policy(DispatchPolicy::FirstMatch)
///     .build();
/// ```
pub struct UpdateHandlerBuilder {
    source: Arc<dyn UpdateSource>,
    api: BoxedApiClient,
    events: BoxedEventDispatcher,
    policy: DispatchPolicy,
    span: Option<Span>,
}

impl UpdateHandlerBuilder {
    pub fn new(source: Arc<dyn UpdateSource>) -> Self {
        Self {
            source,
            api: Arc::new(NoopApiClient),
            events: Arc::new(NoopEventDispatcher),
            policy: DispatchPolicy::default(),
            span: None,
        }
    }

    pub fn api_client<C: ApiClient>(self, client: C) -> Self {
        self.api_client_boxed(Arc::new(client))
    }

    pub fn api_client_boxed(mut self, client: BoxedApiClient) -> Self {
        self.api = client;
        self
    }

    pub fn event_dispatcher<D: EventDispatcher>(self, dispatcher: D) -> Self {
        self.event_dispatcher_boxed(Arc::new(dispatcher))
    }

    pub fn event_dispatcher_boxed(mut self, dispatcher: BoxedEventDispatcher) -> Self {
        self.events = dispatcher;
        self
    }

    pub fn policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the parent span of every dispatch.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> UpdateHandler {
        UpdateHandler {
            span: self
                .span
                .unwrap_or_else(|| info_span!("teleroute", api = self.api.id())),
            source: self.source,
            api: self.api,
            events: self.events,
            policy: self.policy,
            table: RwLock::new(GroupTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::checker_fn;
    use crate::context::Request;
    use crate::handler::handler_fn;
    use crate::plugin::PluginBundle;
    use crate::routing::on_any;
    use teleroute_core::{Message, QueueUpdateSource, UpdateKind};

    fn handler() -> UpdateHandler {
        let (source, _tx) = QueueUpdateSource::new();
        UpdateHandler::new(source)
    }

    fn group(name: &str, priority: i32) -> HandlerGroup {
        on_any()
            .name(name)
            .priority(priority)
            .handler(handler_fn(|_req: Request| async {}))
            .build()
            .unwrap()
    }

    fn names(groups: &[HandlerGroup]) -> Vec<&str> {
        groups.iter().map(HandlerGroup::label).collect()
    }

    #[test]
    fn test_snapshot_is_cached_until_registration() {
        let handler = handler();
        handler.add_handler_group(group("a", 1));

        let first = handler.sorted_groups();
        let second = handler.sorted_groups();
        assert!(Arc::ptr_eq(&first, &second));

        handler.add_handler_group(group("b", 2));
        let third = handler.sorted_groups();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(names(&third), vec!["b", "a"]);
    }

    #[test]
    fn test_register_plugin_validation() {
        let handler = handler();
        let plugin = PluginBundle::new("p").group(group("x", 0));

        assert_eq!(
            handler.register_plugin(&PluginBundle::new("  ")),
            Err(RegistrationError::EmptyPluginName)
        );
        handler.register_plugin(&plugin).unwrap();
        assert_eq!(
            handler.register_plugin(&plugin),
            Err(RegistrationError::DuplicatePlugin("p".to_string()))
        );
        assert_eq!(handler.group_count(), 1);
        assert_eq!(handler.plugin_names(), vec!["p"]);
    }

    #[test]
    fn test_poll_interval() {
        assert_eq!(poll_interval(0).unwrap(), Duration::ZERO);
        assert_eq!(poll_interval(3).unwrap(), Duration::from_secs(3));
        assert!(matches!(poll_interval(-1), Err(KernelError::Configuration(_))));
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| {
            panic!("boom");
        }).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom");

        let payload = std::panic::catch_unwind(|| {
            panic!("code {}", 7);
        }).unwrap_err();
        assert_eq!(panic_message(&*payload), "code 7");
    }

    #[tokio::test]
    async fn test_no_groups_yields_no_responses() {
        let update = Update::new(1, UpdateKind::Message(Message::text(1, 1, "hi")));
        assert!(handler().handle_update(update).await.is_empty());
    }

    #[tokio::test]
    async fn test_checker_evaluated_once_per_update() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = handler();
        handler.add_handler_group(
            HandlerGroup::builder()
                .checker(checker_fn(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                }))
                .handler(handler_fn(|_req: Request| async {}))
                .build()
                .unwrap(),
        );

        let update = Update::new(1, UpdateKind::Message(Message::text(1, 1, "hi")));
        handler.handle_update(update).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
