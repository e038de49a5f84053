//! Update model.
//!
//! An [`Update`] is one incoming bot event. Exactly one kind-specific payload
//! is populated per update; [`Update::update_type`] reports which one. The
//! dispatch kernel only ever looks at the kind and, for command routing, at the
//! text of a `message` update. Everything else travels as raw JSON.
//!
//! The serde representation follows the Bot API wire shape:
//!
//! ```json
//! { "update_id": 10, "message": { "message_id": 1, "date": 0, "chat": { "id": 7, "type": "private" }, "text": "/start" } }
//! ```

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single incoming event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    /// Monotonically increasing identifier assigned by the Bot API.
    pub update_id: i64,

    /// The populated payload.
    #[serde(flatten)]
    pub kind: UpdateKind,
}

impl Update {
    pub fn new(update_id: i64, kind: UpdateKind) -> Self {
        Self { update_id, kind }
    }

    /// Returns which kind-specific field is populated.
    pub fn update_type(&self) -> UpdateType {
        self.kind.update_type()
    }

    /// Returns the message payload of a `message` update.
    ///
    /// Edited messages and channel posts are deliberately not returned here;
    /// match on [`Update::kind`] to reach them.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Parses an update from a JSON document (for example a webhook body).
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

impl<'de> Deserialize<'de> for Update {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let update_id = fields
            .remove("update_id")
            .ok_or_else(|| de::Error::missing_field("update_id"))?;
        let update_id = i64::deserialize(update_id).map_err(de::Error::custom)?;

        if fields.len() != 1 {
            return Err(de::Error::invalid_length(
                fields.len(),
                &"exactly one update kind",
            ));
        }
        let kind = UpdateKind::deserialize(Value::Object(fields)).map_err(de::Error::custom)?;
        Ok(Self { update_id, kind })
    }
}

/// The kind-specific payload of an [`Update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    BusinessConnection(Value),
    BusinessMessage(Message),
    EditedBusinessMessage(Message),
    DeletedBusinessMessages(Value),
    MessageReaction(Value),
    MessageReactionCount(Value),
    InlineQuery(Value),
    ChosenInlineResult(Value),
    CallbackQuery(Value),
    ShippingQuery(Value),
    PreCheckoutQuery(Value),
    PurchasedPaidMedia(Value),
    Poll(Value),
    PollAnswer(Value),
    MyChatMember(Value),
    ChatMember(Value),
    ChatJoinRequest(Value),
    ChatBoost(Value),
    RemovedChatBoost(Value),
}

impl UpdateKind {
    pub fn update_type(&self) -> UpdateType {
        match self {
            Self::Message(_) => UpdateType::Message,
            Self::EditedMessage(_) => UpdateType::EditedMessage,
            Self::ChannelPost(_) => UpdateType::ChannelPost,
            Self::EditedChannelPost(_) => UpdateType::EditedChannelPost,
            Self::BusinessConnection(_) => UpdateType::BusinessConnection,
            Self::BusinessMessage(_) => UpdateType::BusinessMessage,
            Self::EditedBusinessMessage(_) => UpdateType::EditedBusinessMessage,
            Self::DeletedBusinessMessages(_) => UpdateType::DeletedBusinessMessages,
            Self::MessageReaction(_) => UpdateType::MessageReaction,
            Self::MessageReactionCount(_) => UpdateType::MessageReactionCount,
            Self::InlineQuery(_) => UpdateType::InlineQuery,
            Self::ChosenInlineResult(_) => UpdateType::ChosenInlineResult,
            Self::CallbackQuery(_) => UpdateType::CallbackQuery,
            Self::ShippingQuery(_) => UpdateType::ShippingQuery,
            Self::PreCheckoutQuery(_) => UpdateType::PreCheckoutQuery,
            Self::PurchasedPaidMedia(_) => UpdateType::PurchasedPaidMedia,
            Self::Poll(_) => UpdateType::Poll,
            Self::PollAnswer(_) => UpdateType::PollAnswer,
            Self::MyChatMember(_) => UpdateType::MyChatMember,
            Self::ChatMember(_) => UpdateType::ChatMember,
            Self::ChatJoinRequest(_) => UpdateType::ChatJoinRequest,
            Self::ChatBoost(_) => UpdateType::ChatBoost,
            Self::RemovedChatBoost(_) => UpdateType::RemovedChatBoost,
        }
    }
}

/// Discriminant of [`UpdateKind`], used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    BusinessConnection,
    BusinessMessage,
    EditedBusinessMessage,
    DeletedBusinessMessages,
    MessageReaction,
    MessageReactionCount,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
    PurchasedPaidMedia,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    ChatJoinRequest,
    ChatBoost,
    RemovedChatBoost,
}

impl UpdateType {
    /// Returns the wire name of the field this kind populates.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::BusinessConnection => "business_connection",
            Self::BusinessMessage => "business_message",
            Self::EditedBusinessMessage => "edited_business_message",
            Self::DeletedBusinessMessages => "deleted_business_messages",
            Self::MessageReaction => "message_reaction",
            Self::MessageReactionCount => "message_reaction_count",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::CallbackQuery => "callback_query",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::PurchasedPaidMedia => "purchased_paid_media",
            Self::Poll => "poll",
            Self::PollAnswer => "poll_answer",
            Self::MyChatMember => "my_chat_member",
            Self::ChatMember => "chat_member",
            Self::ChatJoinRequest => "chat_join_request",
            Self::ChatBoost => "chat_boost",
            Self::RemovedChatBoost => "removed_chat_boost",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of a Bot API `Message` the dispatch layer understands.
///
/// Unknown fields are ignored during deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Message {
    /// Builds a plain text message in a private chat.
    pub fn text(message_id: i64, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            message_id,
            date: 0,
            chat: Chat::private(chat_id),
            from: None,
            text: Some(text.into()),
        }
    }

    /// Returns the message text, if any.
    pub fn text_str(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Chat {
    pub fn private(id: i64) -> Self {
        Self {
            id,
            chat_type: "private".to_string(),
            title: None,
            username: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message_update() {
        let body = r#"{
            "update_id": 42,
            "message": {
                "message_id": 7,
                "date": 1700000000,
                "chat": { "id": 99, "type": "private" },
                "from": { "id": 5, "is_bot": false, "first_name": "Ada" },
                "text": "/start 123",
                "entities": [{ "type": "bot_command", "offset": 0, "length": 6 }]
            }
        }"#;

        let update = Update::from_json(body).unwrap();
        assert_eq!(update.update_id, 42);
        assert_eq!(update.update_type(), UpdateType::Message);
        let message = update.message().unwrap();
        assert_eq!(message.text_str(), Some("/start 123"));
        assert_eq!(message.chat.chat_type, "private");
        assert_eq!(message.from.as_ref().unwrap().first_name, "Ada");
    }

    #[test]
    fn test_parse_raw_kind() {
        let body = json!({
            "update_id": 3,
            "callback_query": { "id": "abc", "data": "press" }
        })
        .to_string();

        let update = Update::from_json(&body).unwrap();
        assert_eq!(update.update_type(), UpdateType::CallbackQuery);
        assert!(update.message().is_none());
        match update.kind {
            UpdateKind::CallbackQuery(v) => assert_eq!(v["data"], "press"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_edited_message_is_not_message() {
        let update = Update::new(1, UpdateKind::EditedMessage(Message::text(1, 1, "hi")));
        assert_eq!(update.update_type(), UpdateType::EditedMessage);
        assert!(update.message().is_none());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Update::from_json(r#"{"update_id": 1, "mystery": {}}"#).is_err());
    }

    #[test]
    fn test_exactly_one_kind_required() {
        let two = json!({
            "update_id": 1,
            "poll": {},
            "message": {
                "message_id": 1,
                "date": 0,
                "chat": { "id": 7, "type": "private" },
                "text": "hi"
            }
        })
        .to_string();
        let err = Update::from_json(&two).unwrap_err();
        assert!(err.to_string().contains("exactly one update kind"));

        let none = Update::from_json(r#"{"update_id": 1}"#).unwrap_err();
        assert!(none.to_string().contains("exactly one update kind"));

        assert!(Update::from_json(r#"{"poll": {}}"#).is_err());
    }

    #[test]
    fn test_serialized_update_parses_back() {
        let update = Update::new(5, UpdateKind::Message(Message::text(5, 9, "/help")));
        let body = serde_json::to_string(&update).unwrap();
        assert_eq!(Update::from_json(&body).unwrap(), update);
    }

    #[test]
    fn test_update_type_display() {
        assert_eq!(UpdateType::ChatJoinRequest.to_string(), "chat_join_request");
        assert_eq!(
            UpdateKind::Poll(Value::Null).update_type().as_str(),
            "poll"
        );
    }
}
