//! Inbound update model.
//!
//! Every event the platform delivers through long polling is an [`Update`].
//! The set of variants is closed: each one wraps a payload struct carrying the
//! envelope timestamp plus the fields specific to that kind of event. Tags the
//! framework does not know about decode into [`Update::Unknown`] so newer
//! platform additions never break the poller.
//!
//! # Decoding
//!
//! ```rust,ignore
//! use brass_core::Update;
//!
//! let raw = serde_json::json!({
//!     "update_type": "bot_started",
//!     "timestamp": 1,
//!     "chat_id": 42,
//!     "user": { "user_id": 7, "first_name": "Ann" }
//! });
//! let update = Update::from_value(raw)?;
//! assert_eq!(update.type_tag(), "bot_started");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, DecodeResult};

// =============================================================================
// Platform objects
// =============================================================================

/// A platform user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub last_activity_time: i64,
}

/// Where a message was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub chat_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Message contents.
///
/// Attachments are kept as raw JSON: their schema belongs to the platform
/// client and routing only ever looks at the `type` field of the first one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub seq: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

impl MessageBody {
    /// Declared `type` of the first attachment, if it is well formed.
    pub fn first_attachment_type(&self) -> Option<&str> {
        self.attachments
            .first()
            .and_then(|a| a.get("type"))
            .and_then(Value::as_str)
    }
}

/// A message as delivered inside an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub sender: Option<User>,
    #[serde(default)]
    pub recipient: Recipient,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub body: MessageBody,
    #[serde(default)]
    pub url: Option<String>,
}

impl Message {
    /// Text of the message body, if any.
    pub fn text(&self) -> Option<&str> {
        self.body.text.as_deref()
    }

    /// Chat identifier of the recipient, `0` when absent.
    pub fn chat_id(&self) -> i64 {
        self.recipient.chat_id.unwrap_or(0)
    }
}

/// An inline-button press.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callback {
    #[serde(default)]
    pub timestamp: i64,
    pub callback_id: String,
    #[serde(default)]
    pub payload: String,
    pub user: User,
}

/// A chat description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: i64,
    #[serde(rename = "type", default)]
    pub chat_type: String,
    #[serde(default)]
    pub title: Option<String>,
}

// =============================================================================
// Update type tags
// =============================================================================

/// Discriminant of a known update kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    MessageCreated,
    MessageCallback,
    MessageEdited,
    MessageRemoved,
    BotStarted,
    BotStopped,
    BotAdded,
    BotRemoved,
    UserAdded,
    UserRemoved,
    ChatTitleChanged,
    MessageChatCreated,
    DialogMuted,
    DialogUnmuted,
    DialogCleared,
    DialogRemoved,
}

impl UpdateType {
    /// Every known update kind, in platform documentation order.
    pub const ALL: [UpdateType; 16] = [
        Self::MessageCreated,
        Self::MessageCallback,
        Self::MessageEdited,
        Self::MessageRemoved,
        Self::BotStarted,
        Self::BotStopped,
        Self::BotAdded,
        Self::BotRemoved,
        Self::UserAdded,
        Self::UserRemoved,
        Self::ChatTitleChanged,
        Self::MessageChatCreated,
        Self::DialogMuted,
        Self::DialogUnmuted,
        Self::DialogCleared,
        Self::DialogRemoved,
    ];

    /// Wire tag of this update kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageCreated => "message_created",
            Self::MessageCallback => "message_callback",
            Self::MessageEdited => "message_edited",
            Self::MessageRemoved => "message_removed",
            Self::BotStarted => "bot_started",
            Self::BotStopped => "bot_stopped",
            Self::BotAdded => "bot_added",
            Self::BotRemoved => "bot_removed",
            Self::UserAdded => "user_added",
            Self::UserRemoved => "user_removed",
            Self::ChatTitleChanged => "chat_title_changed",
            Self::MessageChatCreated => "message_chat_created",
            Self::DialogMuted => "dialog_muted",
            Self::DialogUnmuted => "dialog_unmuted",
            Self::DialogCleared => "dialog_cleared",
            Self::DialogRemoved => "dialog_removed",
        }
    }

    /// Looks up a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Update payloads
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageCreatedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    pub message: Message,
    #[serde(default)]
    pub user_locale: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageCallbackUpdate {
    #[serde(default)]
    pub timestamp: i64,
    pub callback: Callback,
    /// The message carrying the pressed keyboard. Absent when it was deleted.
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub user_locale: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEditedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    pub message: Message,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRemovedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default)]
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStartedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chat_id: i64,
    pub user: User,
    /// Deep-link payload passed with the start button.
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub user_locale: Option<String>,
}

/// Shape shared by lifecycle updates that only name a chat and a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMemberUpdate {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chat_id: i64,
    pub user: User,
    #[serde(default)]
    pub is_channel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAddedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chat_id: i64,
    pub user: User,
    #[serde(default)]
    pub inviter_id: Option<i64>,
    #[serde(default)]
    pub is_channel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRemovedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chat_id: i64,
    pub user: User,
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub is_channel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTitleChangedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chat_id: i64,
    pub user: User,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChatCreatedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    pub chat: Chat,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub start_payload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogMutedUpdate {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chat_id: i64,
    pub user: User,
    #[serde(default)]
    pub muted_until: i64,
}

/// An update whose tag this crate does not recognise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownUpdate {
    pub update_type: String,
    pub timestamp: i64,
}

// =============================================================================
// Update
// =============================================================================

/// One inbound event from the chat platform. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    MessageCreated(MessageCreatedUpdate),
    MessageCallback(MessageCallbackUpdate),
    MessageEdited(MessageEditedUpdate),
    MessageRemoved(MessageRemovedUpdate),
    BotStarted(BotStartedUpdate),
    BotStopped(ChatMemberUpdate),
    BotAdded(ChatMemberUpdate),
    BotRemoved(ChatMemberUpdate),
    UserAdded(UserAddedUpdate),
    UserRemoved(UserRemovedUpdate),
    ChatTitleChanged(ChatTitleChangedUpdate),
    MessageChatCreated(MessageChatCreatedUpdate),
    DialogMuted(DialogMutedUpdate),
    DialogUnmuted(ChatMemberUpdate),
    DialogCleared(ChatMemberUpdate),
    DialogRemoved(ChatMemberUpdate),
    Unknown(UnknownUpdate),
}

impl Update {
    /// Decodes a raw platform object by its `update_type` tag.
    ///
    /// Unrecognised tags produce [`Update::Unknown`]; a missing tag or a
    /// payload that does not match its tag is an error.
    pub fn from_value(raw: Value) -> DecodeResult<Self> {
        let tag = raw
            .get("update_type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingTag)?
            .to_owned();

        let Some(kind) = UpdateType::from_tag(&tag) else {
            let timestamp = raw.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
            return Ok(Self::Unknown(UnknownUpdate {
                update_type: tag,
                timestamp,
            }));
        };

        macro_rules! decode {
            ($variant:ident) => {
                serde_json::from_value(raw)
                    .map(Self::$variant)
                    .map_err(|source| DecodeError::Json { tag, source })
            };
        }

        match kind {
            UpdateType::MessageCreated => decode!(MessageCreated),
            UpdateType::MessageCallback => decode!(MessageCallback),
            UpdateType::MessageEdited => decode!(MessageEdited),
            UpdateType::MessageRemoved => decode!(MessageRemoved),
            UpdateType::BotStarted => decode!(BotStarted),
            UpdateType::BotStopped => decode!(BotStopped),
            UpdateType::BotAdded => decode!(BotAdded),
            UpdateType::BotRemoved => decode!(BotRemoved),
            UpdateType::UserAdded => decode!(UserAdded),
            UpdateType::UserRemoved => decode!(UserRemoved),
            UpdateType::ChatTitleChanged => decode!(ChatTitleChanged),
            UpdateType::MessageChatCreated => decode!(MessageChatCreated),
            UpdateType::DialogMuted => decode!(DialogMuted),
            UpdateType::DialogUnmuted => decode!(DialogUnmuted),
            UpdateType::DialogCleared => decode!(DialogCleared),
            UpdateType::DialogRemoved => decode!(DialogRemoved),
        }
    }

    /// The kind of this update, `None` for unknown tags.
    pub fn update_type(&self) -> Option<UpdateType> {
        Some(match self {
            Self::MessageCreated(_) => UpdateType::MessageCreated,
            Self::MessageCallback(_) => UpdateType::MessageCallback,
            Self::MessageEdited(_) => UpdateType::MessageEdited,
            Self::MessageRemoved(_) => UpdateType::MessageRemoved,
            Self::BotStarted(_) => UpdateType::BotStarted,
            Self::BotStopped(_) => UpdateType::BotStopped,
            Self::BotAdded(_) => UpdateType::BotAdded,
            Self::BotRemoved(_) => UpdateType::BotRemoved,
            Self::UserAdded(_) => UpdateType::UserAdded,
            Self::UserRemoved(_) => UpdateType::UserRemoved,
            Self::ChatTitleChanged(_) => UpdateType::ChatTitleChanged,
            Self::MessageChatCreated(_) => UpdateType::MessageChatCreated,
            Self::DialogMuted(_) => UpdateType::DialogMuted,
            Self::DialogUnmuted(_) => UpdateType::DialogUnmuted,
            Self::DialogCleared(_) => UpdateType::DialogCleared,
            Self::DialogRemoved(_) => UpdateType::DialogRemoved,
            Self::Unknown(_) => return None,
        })
    }

    /// Wire tag of this update, including unknown ones.
    pub fn type_tag(&self) -> &str {
        match self {
            Self::Unknown(u) => &u.update_type,
            known => known.update_type().map(UpdateType::as_str).unwrap_or_default(),
        }
    }

    /// Envelope timestamp.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::MessageCreated(u) => u.timestamp,
            Self::MessageCallback(u) => u.timestamp,
            Self::MessageEdited(u) => u.timestamp,
            Self::MessageRemoved(u) => u.timestamp,
            Self::BotStarted(u) => u.timestamp,
            Self::BotStopped(u)
            | Self::BotAdded(u)
            | Self::BotRemoved(u)
            | Self::DialogUnmuted(u)
            | Self::DialogCleared(u)
            | Self::DialogRemoved(u) => u.timestamp,
            Self::UserAdded(u) => u.timestamp,
            Self::UserRemoved(u) => u.timestamp,
            Self::ChatTitleChanged(u) => u.timestamp,
            Self::MessageChatCreated(u) => u.timestamp,
            Self::DialogMuted(u) => u.timestamp,
            Self::Unknown(u) => u.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> Value {
        json!({ "user_id": 7, "first_name": "Ann" })
    }

    #[test]
    fn test_decode_message_created() {
        let raw = json!({
            "update_type": "message_created",
            "timestamp": 10,
            "message": {
                "sender": user(),
                "recipient": { "chat_id": 42, "chat_type": "dialog" },
                "body": { "mid": "m1", "seq": 1, "text": "hi" }
            }
        });

        let Update::MessageCreated(u) = Update::from_value(raw).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(u.timestamp, 10);
        assert_eq!(u.message.text(), Some("hi"));
        assert_eq!(u.message.chat_id(), 42);
        assert_eq!(u.message.sender.unwrap().user_id, 7);
    }

    #[test]
    fn test_decode_every_known_tag_shape() {
        let raws = [
            json!({ "update_type": "bot_stopped", "chat_id": 1, "user": user() }),
            json!({ "update_type": "dialog_muted", "chat_id": 1, "user": user(), "muted_until": 5 }),
            json!({ "update_type": "message_chat_created", "chat": { "chat_id": 3, "type": "chat" } }),
            json!({ "update_type": "message_removed", "message_id": "m", "chat_id": 1, "user_id": 2 }),
        ];
        let tags: Vec<String> = raws
            .into_iter()
            .map(|r| Update::from_value(r).unwrap().type_tag().to_owned())
            .collect();
        assert_eq!(
            tags,
            ["bot_stopped", "dialog_muted", "message_chat_created", "message_removed"]
        );
    }

    #[test]
    fn test_unknown_tag_is_not_an_error() {
        let raw = json!({ "update_type": "message_reacted", "timestamp": 3 });
        let update = Update::from_value(raw).unwrap();

        assert_eq!(update.update_type(), None);
        assert_eq!(update.type_tag(), "message_reacted");
        assert_eq!(update.timestamp(), 3);
    }

    #[test]
    fn test_missing_tag_is_an_error() {
        let err = Update::from_value(json!({ "timestamp": 3 })).unwrap_err();
        assert!(matches!(err, DecodeError::MissingTag));
    }

    #[test]
    fn test_mismatched_payload_is_an_error() {
        let raw = json!({ "update_type": "bot_started", "user": "nobody" });
        let err = Update::from_value(raw).unwrap_err();
        assert!(matches!(err, DecodeError::Json { ref tag, .. } if tag == "bot_started"));
    }

    #[test]
    fn test_first_attachment_type() {
        let mut body = MessageBody::default();
        assert_eq!(body.first_attachment_type(), None);

        body.attachments = vec![json!("garbage"), json!({ "type": "image" })];
        assert_eq!(body.first_attachment_type(), None);

        body.attachments = vec![json!({ "type": "contact" })];
        assert_eq!(body.first_attachment_type(), Some("contact"));
    }

    #[test]
    fn test_update_type_tags_round_trip() {
        for kind in UpdateType::ALL {
            assert_eq!(UpdateType::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(UpdateType::from_tag("nope"), None);
    }
}
