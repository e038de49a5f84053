use tracing::info;

use crate::checker::AnyChecker;
use crate::context::{Request, Response};
use crate::group::HandlerGroup;
use crate::handler::handler_fn;
use crate::plugin::Plugin;

/// Logs a one-line summary of every update.
///
/// Contributes a single match-any group at the highest priority. Its response
/// is [`Ignored`](crate::context::ResponseStatus::Ignored), so it shows up in
/// fan-out results without counting as a real handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPlugin;

impl LoggingPlugin {
    pub const NAME: &'static str = "teleroute.logging";
}

async fn log_update(request: Request) -> Response {
    let update = request.update();
    request.span().in_scope(|| match update.message() {
        Some(message) => info!(
            update_id = update.update_id,
            update_type = %update.update_type(),
            chat_id = message.chat.id,
            text = message.text_str().unwrap_or_default(),
            "Update received"
        ),
        None => info!(
            update_id = update.update_id,
            update_type = %update.update_type(),
            "Update received"
        ),
    });
    Response::ignored()
}

impl Plugin for LoggingPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handler_groups(&self) -> Vec<HandlerGroup> {
        vec![HandlerGroup::named(
            Self::NAME,
            AnyChecker,
            handler_fn(log_update),
            Vec::new(),
            i32::MAX,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResponseStatus;
    use crate::handler::RequestHandler;
    use std::sync::Arc;
    use teleroute_core::{Message, NoopApiClient, Update, UpdateKind};
    use tracing::Span;

    #[tokio::test]
    async fn test_logging_plugin_group() {
        let groups = LoggingPlugin.handler_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].priority(), i32::MAX);
        assert_eq!(groups[0].name(), Some(LoggingPlugin::NAME));

        let update = Update::new(3, UpdateKind::Message(Message::text(1, 1, "hey")));
        assert!(groups[0].checker().check(&update));

        let request = Request::new(Arc::new(update), Arc::new(NoopApiClient), Span::none());
        let response = groups[0].chain().handle(request).await.unwrap();
        assert_eq!(response.status(), ResponseStatus::Ignored);
    }
}
