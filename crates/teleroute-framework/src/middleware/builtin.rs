//! Middlewares shipped with the framework.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{Instrument, Level, debug, event, warn};

use super::{Middleware, Next};
use crate::context::Request;
use crate::handler::HandlerResult;

/// Logs every request entering the chain and the outcome leaving it.
///
/// Records are emitted inside the request's span, so they carry the group
/// name and update id set up by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct LoggingMiddleware {
    level: Level,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self { level: Level::DEBUG }
    }

    /// Uses `INFO` instead of the default `DEBUG` for the entry/exit records.
    pub fn verbose() -> Self {
        Self { level: Level::INFO }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn process(&self, request: Request, next: Next) -> HandlerResult {
        let span = request.span().clone();
        let update_id = request.update().update_id;
        let update_type = request.update().update_type();
        let started = Instant::now();

        // `event!` needs a const level.
        span.in_scope(|| {
            if self.level == Level::INFO {
                event!(Level::INFO, update_id, %update_type, "Request entering chain");
            } else {
                event!(Level::DEBUG, update_id, %update_type, "Request entering chain");
            }
        });

        let result = next.run(request).instrument(span.clone()).await;
        let elapsed_ms = saturating_millis(started.elapsed());

        let _enter = span.enter();
        match &result {
            Ok(response) => debug!(
                update_id,
                status = ?response.status(),
                stopped = response.is_propagation_stopped(),
                elapsed_ms,
                "Request left chain"
            ),
            Err(e) => warn!(update_id, error = %e, elapsed_ms, "Request failed in chain"),
        }
        result
    }
}

fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Marks successful responses as stopping propagation.
///
/// Place it in a group's chain to make that group the last one to handle an
/// update whenever its handler succeeds. Failed and short-circuited chains
/// below it are passed through untouched, so errors never stop propagation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopPropagationMiddleware;

#[async_trait]
impl Middleware for StopPropagationMiddleware {
    async fn process(&self, request: Request, next: Next) -> HandlerResult {
        let response = next.run(request).await?;
        Ok(response.with_propagation_stopped())
    }
}
