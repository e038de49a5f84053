//! Shorthand builders for common handler groups.
//!
//! Each function returns a [`HandlerGroupBuilder`] with its name and checker
//! preset; only the handler is left to supply.
//!
//! ```rust,ignore
//! let groups = vec![
//!     on_command("start").handler(handler_fn(start)).build()?,
//!     on_message().priority(-10).handler(handler_fn(echo)).build()?,
//!     on_callback_query().handler(handler_fn(buttons)).build()?,
//! ];
//! ```

use teleroute_core::UpdateType;

use crate::checker::{AnyChecker, CommandChecker, KindChecker};
use crate::group::HandlerGroupBuilder;

/// Creates a group builder matching one update kind.
///
/// The group is named after the kind.
pub fn on(kind: UpdateType) -> HandlerGroupBuilder {
    HandlerGroupBuilder::new()
        .name(kind.as_str())
        .checker(KindChecker::new(kind))
}

/// Creates a group builder matching `message` updates.
pub fn on_message() -> HandlerGroupBuilder {
    on(UpdateType::Message)
}

pub fn on_edited_message() -> HandlerGroupBuilder {
    on(UpdateType::EditedMessage)
}

pub fn on_callback_query() -> HandlerGroupBuilder {
    on(UpdateType::CallbackQuery)
}

pub fn on_inline_query() -> HandlerGroupBuilder {
    on(UpdateType::InlineQuery)
}

/// Creates a group builder matching the bot command `/{command}`.
///
/// The group is named after the command trigger, e.g. `"/start"`.
pub fn on_command(command: impl Into<String>) -> HandlerGroupBuilder {
    let checker = CommandChecker::new(command);
    HandlerGroupBuilder::new()
        .name(format!("/{}", checker.command()))
        .checker(checker)
}

/// Creates a group builder matching every update.
pub fn on_any() -> HandlerGroupBuilder {
    HandlerGroupBuilder::new().name("any").checker(AnyChecker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Request;
    use crate::handler::handler_fn;
    use crate::group::HandlerGroup;
    use teleroute_core::{Message, Update, UpdateKind};

    fn finish(builder: HandlerGroupBuilder) -> HandlerGroup {
        builder
            .handler(handler_fn(|_req: Request| async {}))
            .build()
            .unwrap()
    }

    #[test]
    fn test_on_command() {
        let group = finish(on_command("start"));
        assert_eq!(group.label(), "/start");

        let update = Update::new(1, UpdateKind::Message(Message::text(1, 1, "/start 5")));
        assert!(group.checker().check(&update));
    }

    #[test]
    fn test_on_kind_names_group() {
        let group = finish(on_callback_query());
        assert_eq!(group.label(), "callback_query");

        let update = Update::new(1, UpdateKind::Message(Message::text(1, 1, "hi")));
        assert!(!group.checker().check(&update));
        assert!(finish(on_message()).checker().check(&update));
    }

    #[test]
    fn test_on_any_priority_override() {
        let group = finish(on_any().priority(3));
        assert_eq!(group.priority(), 3);
        assert_eq!(group.label(), "any");
    }
}
