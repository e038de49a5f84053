//! Command Bot Demo
//!
//! Feeds a handful of scripted updates through an in-process queue and lets
//! the runtime dispatch them:
//!
//! - `/start` and `/echo <text>` reply through a console API client
//! - a timing middleware wraps every command group
//! - a low-priority group logs plain chat messages
//! - the built-in logging plugin records every update at the highest priority
//!
//! The runtime stops once the queue is drained and closed, or on Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package command-bot
//! TELEROUTE_LOGGING__LEVEL=debug cargo run --package command-bot
//! ```

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use teleroute::core::{ApiError, ApiResult};
use teleroute::framework::LoggingPlugin;
use teleroute::prelude::*;
use tracing::{debug, info};

// ============================================================================
// API client
// ============================================================================

/// Prints outgoing Bot API calls instead of sending them.
struct ConsoleApiClient;

#[async_trait]
impl ApiClient for ConsoleApiClient {
    fn id(&self) -> &str {
        "console"
    }

    async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        info!(method, %params, "Bot API call");
        match method {
            "sendMessage" => Ok(json!({ "message_id": 1 })),
            other => Err(ApiError::Other(format!("unsupported method {other}"))),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

async fn reply(request: &Request, text: &str) -> Result<Response, ApiError> {
    let Some(message) = request.update().message() else {
        return Ok(Response::ignored());
    };
    request
        .api()
        .call(
            "sendMessage",
            json!({ "chat_id": message.chat.id, "text": text }),
        )
        .await?;
    Ok(Response::handled())
}

// ============================================================================
// Handlers
// ============================================================================

async fn start_handler(request: Request) -> Result<Response, ApiError> {
    reply(&request, "Hi! Try /echo <text>.").await
}

async fn echo_handler(request: Request) -> Result<Response, ApiError> {
    let text = request
        .update()
        .message()
        .and_then(|m| m.text_str())
        .and_then(|t| t.strip_prefix("/echo"))
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if text.is_empty() {
        return reply(&request, "Usage: /echo <text>").await;
    }
    reply(&request, &text)
        .await
        .map(|res| res.with_propagation_stopped())
}

async fn chat_logger(request: Request) -> Response {
    if let Some(text) = request.update().message().and_then(|m| m.text_str()) {
        info!(text, "Chat message");
    }
    Response::ignored()
}

async fn timed(request: Request, next: Next) -> HandlerResult {
    let started = Instant::now();
    let response = next.run(request).await;
    debug!(elapsed = ?started.elapsed(), "Command handled");
    response
}

fn commands() -> Result<PluginBundle> {
    Ok(plugin! {
        name: "commands",
        groups: [
            on_command("start")
                .priority(10)
                .middleware(middleware_fn(timed))
                .handler(handler_fn(start_handler))
                .build()?,
            on_command("echo")
                .priority(10)
                .middleware(middleware_fn(timed))
                .handler(handler_fn(echo_handler))
                .build()?,
        ],
    })
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let (source, tx) = QueueUpdateSource::new();

    let runtime = TelerouteRuntime::builder(source)
        .api_client(ConsoleApiClient)
        .build()?;

    runtime.register_plugin(&LoggingPlugin)?;
    runtime.register_plugin(&commands()?)?;
    runtime.add_handler_group(
        on_message()
            .name("chat-logger")
            .priority(-10)
            .handler(handler_fn(chat_logger))
            .build()?,
    );

    let script = ["/start", "hello there", "/echo ping", "/echo", "/startup"];
    for (id, text) in (1..).zip(script) {
        tx.send(Update::new(
            id,
            UpdateKind::Message(Message::text(id, 42, text)),
        ))?;
    }
    // Dropping the sender closes the source once the script is drained.
    drop(tx);

    runtime.run().await?;
    Ok(())
}
