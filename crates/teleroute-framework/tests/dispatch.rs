//! End-to-end dispatch through `UpdateHandler`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;
use teleroute_core::{
    Message, QueueUpdateSource, Update, UpdateKind, UpdateType, WebhookUpdateSource,
};
use teleroute_framework::{
    ChannelEventDispatcher, DispatchPolicy, HandlerGroup, KernelError, KernelEvent,
    ListenerEventDispatcher, ListenerFlow, Next, PluginBundle, RegistrationError, Request,
    Response, StopPropagationMiddleware, UpdateHandler, checker_fn, handler_fn, middleware_fn,
    on_any, on_command, on_message,
};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn text_update(id: i64, text: &str) -> Update {
    Update::new(id, UpdateKind::Message(Message::text(id, 100, text)))
}

fn callback_update(id: i64) -> Update {
    Update::new(id, UpdateKind::CallbackQuery(json!({ "id": "cb", "data": "x" })))
}

fn idle_handler() -> UpdateHandler {
    let (source, _tx) = QueueUpdateSource::new();
    UpdateHandler::new(source)
}

/// A match-any group whose response carries its name under `"group"`.
fn named(name: &'static str, priority: i32) -> HandlerGroup {
    on_any()
        .name(name)
        .priority(priority)
        .handler(handler_fn(move |_req: Request| async move {
            Response::handled().with_attribute("group", name)
        }))
        .build()
        .unwrap()
}

fn group_names(responses: &[Response]) -> Vec<&'static str> {
    responses
        .iter()
        .map(|r| *r.get::<&'static str>("group").unwrap())
        .collect()
}

#[tokio::test]
async fn test_priority_order_is_stable() {
    let handler = idle_handler();
    handler.add_handler_group(named("g0", 5));
    handler.add_handler_group(named("g1", 1));
    handler.add_handler_group(named("g2", 5));
    handler.add_handler_group(named("g3", 3));

    let responses = handler.handle_update(text_update(1, "hi")).await;
    assert_eq!(group_names(&responses), vec!["g0", "g2", "g3", "g1"]);
}

#[tokio::test]
async fn test_fan_out_to_every_matching_group() {
    let handler = idle_handler();
    handler.add_handler_group(
        on_any()
            .name("g1")
            .priority(10)
            .handler(handler_fn(|_req: Request| async {
                Response::handled().with_attribute("seen", true)
            }))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(
        on_message()
            .name("g2")
            .handler(handler_fn(|_req: Request| async { Response::ignored() }))
            .build()
            .unwrap(),
    );

    let responses = handler.handle_update(text_update(1, "hello")).await;
    assert_eq!(responses.len(), 2);
    assert!(responses[0].has("seen"));
    assert!(!responses[1].has("seen"));

    let responses = handler.handle_update(callback_update(2)).await;
    assert_eq!(responses.len(), 1);
    assert!(responses[0].has("seen"));
}

#[tokio::test]
async fn test_panicking_checker_is_isolated() {
    let (events, mut rx) = ChannelEventDispatcher::new();
    let (source, _tx) = QueueUpdateSource::new();
    let handler = UpdateHandler::builder(source).event_dispatcher(events).build();

    handler.add_handler_group(
        HandlerGroup::builder()
            .name("broken")
            .priority(10)
            .checker(checker_fn(|_| panic!("checker exploded")))
            .handler(handler_fn(|_req: Request| async {}))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(named("healthy", 0));

    let responses = handler.handle_update(text_update(1, "hi")).await;
    assert_eq!(group_names(&responses), vec!["healthy"]);

    let mut failed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let KernelEvent::HandlerGroupFailed { group, update_id, failure } = event {
            failed.push((group, update_id, failure.to_string()));
        }
    }
    assert_eq!(
        failed,
        vec![(
            "broken".to_string(),
            1,
            "checker panicked: checker exploded".to_string()
        )]
    );
}

async fn explode(_req: Request) -> Response {
    panic!("handler exploded")
}

#[tokio::test]
async fn test_failing_handlers_do_not_stop_dispatch() {
    let handler = idle_handler();
    handler.add_handler_group(
        on_any()
            .priority(3)
            .handler(handler_fn(|_req: Request| async {
                Err::<Response, _>("refused")
            }))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(
        on_any()
            .priority(2)
            .handler(handler_fn(explode))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(named("survivor", 1));

    let responses = handler.handle_update(text_update(1, "hi")).await;
    assert_eq!(group_names(&responses), vec!["survivor"]);
}

#[tokio::test]
async fn test_short_circuit_only_skips_own_handler() {
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reached);

    let handler = idle_handler();
    handler.add_handler_group(
        on_any()
            .priority(1)
            .middleware(middleware_fn(|_req: Request, _next: Next| async {
                Response::ignored().with_attribute("gated", true)
            }))
            .handler(handler_fn(move |_req: Request| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(named("after", 0));

    let responses = handler.handle_update(text_update(1, "hi")).await;
    assert_eq!(responses.len(), 2);
    assert!(responses[0].has("gated"));
    assert_eq!(*responses[1].get::<&'static str>("group").unwrap(), "after");
    assert_eq!(reached.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_requests_are_fresh_per_group() {
    let handler = idle_handler();
    let tagging = middleware_fn(|req: Request, next: Next| async move {
        next.run(req.with_attribute("tag", 1u8)).await
    });
    handler.add_handler_group(
        on_any()
            .priority(1)
            .middleware(tagging)
            .handler(handler_fn(|req: Request| async move {
                Response::handled().with_attribute("tagged", req.has("tag"))
            }))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(
        on_any()
            .handler(handler_fn(|req: Request| async move {
                Response::handled().with_attribute("tagged", req.has("tag"))
            }))
            .build()
            .unwrap(),
    );

    let responses = handler.handle_update(text_update(1, "hi")).await;
    let tagged: Vec<bool> = responses
        .iter()
        .map(|r| *r.get::<bool>("tagged").unwrap())
        .collect();
    assert_eq!(tagged, vec![true, false]);
}

#[tokio::test]
async fn test_stop_propagation_skips_lower_groups() {
    let handler = idle_handler();
    handler.add_handler_group(
        on_command("start")
            .priority(10)
            .middleware(StopPropagationMiddleware)
            .handler(handler_fn(|_req: Request| async {
                Response::handled().with_attribute("group", "start")
            }))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(named("fallback", 0));

    let responses = handler.handle_update(text_update(1, "/start")).await;
    assert_eq!(group_names(&responses), vec!["start"]);
    assert!(responses[0].is_propagation_stopped());

    let responses = handler.handle_update(text_update(2, "/help")).await;
    assert_eq!(group_names(&responses), vec!["fallback"]);
}

#[tokio::test]
async fn test_first_match_policy() {
    let (source, _tx) = QueueUpdateSource::new();
    let handler = UpdateHandler::builder(source)
        .policy(DispatchPolicy::FirstMatch)
        .build();
    handler.add_handler_group(named("low", 0));
    handler.add_handler_group(
        HandlerGroup::builder()
            .name("commands-only")
            .priority(5)
            .checker(checker_fn(|u| {
                u.message()
                    .and_then(|m| m.text_str())
                    .is_some_and(|t| t.starts_with('/'))
            }))
            .handler(handler_fn(|_req: Request| async {
                Response::handled().with_attribute("group", "commands-only")
            }))
            .build()
            .unwrap(),
    );

    let responses = handler.handle_update(text_update(1, "/ping")).await;
    assert_eq!(group_names(&responses), vec!["commands-only"]);

    let responses = handler.handle_update(text_update(2, "plain")).await;
    assert_eq!(group_names(&responses), vec!["low"]);
}

#[tokio::test]
async fn test_first_match_skips_failed_group() {
    let (source, _tx) = QueueUpdateSource::new();
    let handler = UpdateHandler::builder(source)
        .policy(DispatchPolicy::FirstMatch)
        .build();
    handler.add_handler_group(named("fallback", 0));
    handler.add_handler_group(named("second", 0));
    handler.add_handler_group(
        on_any()
            .name("broken")
            .priority(9)
            .handler(handler_fn(|_req: Request| async {
                Err::<Response, _>("no backend")
            }))
            .build()
            .unwrap(),
    );

    let responses = handler.handle_update(text_update(1, "hi")).await;
    assert_eq!(group_names(&responses), vec!["fallback"]);
}

#[tokio::test]
async fn test_registration_during_dispatch_applies_to_next_update() {
    let handler = Arc::new(idle_handler());
    let registered = Arc::new(AtomicBool::new(false));
    let weak = Arc::downgrade(&handler);
    let flag = Arc::clone(&registered);
    handler.add_handler_group(
        on_any()
            .name("registrar")
            .priority(5)
            .handler(handler_fn(move |_req: Request| {
                let weak = weak.clone();
                let flag = Arc::clone(&flag);
                async move {
                    if !flag.swap(true, Ordering::SeqCst) {
                        if let Some(handler) = weak.upgrade() {
                            handler.add_handler_group(named("late", 1));
                        }
                    }
                    Response::handled().with_attribute("group", "registrar")
                }
            }))
            .build()
            .unwrap(),
    );
    handler.add_handler_group(named("early", 0));

    let first = handler.handle_update(text_update(1, "hi")).await;
    assert!(registered.load(Ordering::SeqCst));
    assert_eq!(group_names(&first), vec!["registrar", "early"]);

    let second = handler.handle_update(text_update(2, "hi")).await;
    assert_eq!(group_names(&second), vec!["registrar", "late", "early"]);
}

#[tokio::test]
async fn test_lifecycle_event_order() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let listeners = ListenerEventDispatcher::new();
    let sink = Arc::clone(&log);
    listeners.listen(move |event| {
        sink.lock().push(event.name().to_string());
        ListenerFlow::Continue
    });

    let (source, tx) = QueueUpdateSource::new();
    let handler = UpdateHandler::builder(source)
        .event_dispatcher(listeners)
        .build();

    handler
        .register_plugin(&PluginBundle::new("demo").group(named("a", 1)))
        .unwrap();
    handler.add_handler_group(
        on_message()
            .name("fails")
            .handler(handler_fn(|_req: Request| async {
                Err::<Response, _>("nope")
            }))
            .build()
            .unwrap(),
    );

    tx.send(text_update(1, "hi")).unwrap();
    let batch = assert_ok!(handler.handle().await);
    assert_eq!(batch.len(), 1);

    assert_eq!(
        *log.lock(),
        vec![
            "plugin_registered",
            "handler_group_added",
            "before_handle",
            "update_received",
            "before_request",
            "after_request",
            "before_request",
            "handler_group_failed",
            "after_handle",
        ]
    );
}

#[tokio::test]
async fn test_duplicate_plugin_rejected() {
    let handler = idle_handler();
    let plugin = PluginBundle::new("admin").group(named("ban", 0));

    assert_ok!(handler.register_plugin(&plugin));
    let err = assert_err!(handler.register_plugin(&plugin));
    assert_eq!(err, RegistrationError::DuplicatePlugin("admin".to_string()));
    assert_eq!(handler.group_count(), 1);

    let err = assert_err!(handler.register_plugin(&PluginBundle::new("")));
    assert_eq!(err, RegistrationError::EmptyPluginName);
}

#[tokio::test]
async fn test_handle_preserves_source_order() {
    let (source, tx) = QueueUpdateSource::new();
    let handler = UpdateHandler::new(source);
    handler.add_handler_group(named("only", 0));

    for id in [7, 3, 9] {
        tx.send(text_update(id, "x")).unwrap();
    }

    let batch = assert_ok!(handler.handle().await);
    let ids: Vec<i64> = batch.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![7, 3, 9]);
    assert!(batch.iter().all(|(_, responses)| responses.len() == 1));

    let empty = assert_ok!(handler.handle().await);
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_webhook_source_dispatches_once() {
    let body = r#"{
        "update_id": 42,
        "message": {
            "message_id": 1,
            "date": 0,
            "chat": { "id": 5, "type": "private" },
            "text": "/start"
        }
    }"#;
    let source = WebhookUpdateSource::from_body(body).unwrap();
    let handler = UpdateHandler::new(source);
    handler.add_handler_group(
        on_command("start")
            .handler(handler_fn(|req: Request| async move {
                Response::handled().with_attribute("kind", req.update().update_type())
            }))
            .build()
            .unwrap(),
    );

    let batch = assert_ok!(handler.handle().await);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].0, 42);
    let kind = batch[0].1[0].get::<UpdateType>("kind").unwrap();
    assert_eq!(*kind, UpdateType::Message);

    assert!(assert_ok!(handler.handle().await).is_empty());
}

#[tokio::test]
async fn test_negative_timeout_rejected() {
    let handler = idle_handler();
    let err = assert_err!(handler.listen(-1).await);
    assert!(matches!(err, KernelError::Configuration(_)));
}

#[tokio::test(start_paused = true)]
async fn test_listen_stops_when_source_closes() {
    let (source, tx) = QueueUpdateSource::new();
    let handler = UpdateHandler::new(source);

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    handler.add_handler_group(
        on_any()
            .handler(handler_fn(move |_req: Request| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .build()
            .unwrap(),
    );

    tx.send(text_update(1, "a")).unwrap();
    tx.send(text_update(2, "b")).unwrap();
    drop(tx);

    assert_ok!(handler.listen(5).await);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_listen_until_honours_cancellation() {
    let (source, _tx) = QueueUpdateSource::new();
    let handler = Arc::new(UpdateHandler::new(source));
    let token = CancellationToken::new();

    let task = tokio::spawn({
        let handler = Arc::clone(&handler);
        let token = token.clone();
        async move { handler.listen_until(1, token).await }
    });

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    token.cancel();

    let result = task.await.unwrap();
    assert_ok!(result);
}
