//! Endpoint keys and update resolution.
//!
//! An [`Endpoint`] is the routing key a handler is registered under. Keys live
//! in three namespaces that cannot collide:
//!
//! | Namespace      | Shape              | Example                     |
//! |----------------|--------------------|-----------------------------|
//! | Slash commands | `/name`            | `Endpoint::from("/start")`  |
//! | System events  | `\u{7}` + name     | [`Endpoint::TEXT`]          |
//! | Callbacks      | `\u{c}` + payload  | `Endpoint::callback("buy")` |
//!
//! [`resolve`] turns an [`Update`] into the endpoint it should be routed to.

use std::borrow::Cow;
use std::fmt;

use brass_core::{Update, UpdateType};

const EVENT_PREFIX: char = '\u{7}';
const CALLBACK_PREFIX: char = '\u{c}';

/// A routing key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(Cow<'static, str>);

impl Endpoint {
    /// Any created message with text that is not a command.
    pub const TEXT: Self = Self::from_static("\u{7}text");
    /// Any created message without text or a recognised attachment.
    pub const MESSAGE: Self = Self::from_static("\u{7}message");
    pub const EDITED: Self = Self::from_static("\u{7}edited");
    pub const REMOVED: Self = Self::from_static("\u{7}removed");

    pub const CONTACT: Self = Self::from_static("\u{7}contact");
    pub const PHOTO: Self = Self::from_static("\u{7}photo");
    pub const LOCATION: Self = Self::from_static("\u{7}location");

    pub const BOT_STARTED: Self = Self::from_static("\u{7}bot_started");
    pub const BOT_STOPPED: Self = Self::from_static("\u{7}bot_stopped");
    pub const BOT_ADDED: Self = Self::from_static("\u{7}bot_added");
    pub const BOT_REMOVED: Self = Self::from_static("\u{7}bot_removed");
    pub const USER_ADDED: Self = Self::from_static("\u{7}user_added");
    pub const USER_REMOVED: Self = Self::from_static("\u{7}user_removed");
    pub const TITLE_CHANGED: Self = Self::from_static("\u{7}title_changed");
    pub const CHAT_CREATED: Self = Self::from_static("\u{7}chat_created");
    pub const DIALOG_MUTED: Self = Self::from_static("\u{7}dialog_muted");
    pub const DIALOG_UNMUTED: Self = Self::from_static("\u{7}dialog_unmuted");
    pub const DIALOG_CLEARED: Self = Self::from_static("\u{7}dialog_cleared");
    pub const DIALOG_REMOVED: Self = Self::from_static("\u{7}dialog_removed");

    /// Matches every callback that has no payload-specific handler.
    pub const ANY_CALLBACK: Self = Self::from_static("\u{c}");

    /// Wraps a static key without allocating.
    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    /// Key for the slash command `/name`.
    pub fn command(name: &str) -> Self {
        Self(Cow::Owned(format!("/{name}")))
    }

    /// Key for callbacks carrying exactly `payload`. An empty payload gives
    /// [`Endpoint::ANY_CALLBACK`].
    pub fn callback(payload: &str) -> Self {
        Self(Cow::Owned(format!("{CALLBACK_PREFIX}{payload}")))
    }

    /// Attachment endpoint for a declared attachment `type`.
    pub fn for_attachment(kind: &str) -> Option<Self> {
        match kind {
            "contact" => Some(Self::CONTACT),
            "image" => Some(Self::PHOTO),
            "location" => Some(Self::LOCATION),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The empty key, which never routes anywhere.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_attachment(&self) -> bool {
        *self == Self::CONTACT || *self == Self::PHOTO || *self == Self::LOCATION
    }

    pub fn is_callback(&self) -> bool {
        self.0.starts_with(CALLBACK_PREFIX)
    }

    pub fn is_command(&self) -> bool {
        self.0.starts_with('/')
    }
}

impl From<&str> for Endpoint {
    fn from(key: &str) -> Self {
        Self(Cow::Owned(key.to_owned()))
    }
}

impl From<String> for Endpoint {
    fn from(key: String) -> Self {
        Self(Cow::Owned(key))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.0.strip_prefix(EVENT_PREFIX) {
            write!(f, "on:{name}")
        } else if let Some(payload) = self.0.strip_prefix(CALLBACK_PREFIX) {
            write!(f, "callback:{payload}")
        } else {
            f.write_str(&self.0)
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Where an update routes, plus the parsed command when there is one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub endpoint: Endpoint,
    /// Command name without the leading `/`. Empty for non-commands.
    pub command: String,
    /// Text after the first `:` of a command. Empty when absent.
    pub payload: String,
}

impl Resolution {
    fn endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Default::default()
        }
    }
}

/// Splits `/name:payload` into `(name, payload)`.
///
/// Only the first `:` separates; the payload may contain more. Text not
/// starting with `/` is not a command.
///
/// ```rust,ignore
/// assert_eq!(parse_command("/start:a:b"), Some(("start", "a:b")));
/// assert_eq!(parse_command("/"), Some(("", "")));
/// assert_eq!(parse_command("hello"), None);
/// ```
pub fn parse_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    Some(rest.split_once(':').unwrap_or((rest, "")))
}

/// Computes the endpoint for an update.
///
/// For created messages a recognised first attachment wins over text, then
/// slash commands, then plain text, then the generic message key. Unknown
/// updates resolve to the empty endpoint.
pub fn resolve(update: &Update) -> Resolution {
    match update {
        Update::MessageCreated(u) => {
            let body = &u.message.body;
            if let Some(endpoint) = body.first_attachment_type().and_then(Endpoint::for_attachment)
            {
                return Resolution::endpoint(endpoint);
            }

            match body.text.as_deref() {
                Some(text) => match parse_command(text) {
                    Some((name, payload)) => Resolution {
                        endpoint: Endpoint::command(name),
                        command: name.to_owned(),
                        payload: payload.to_owned(),
                    },
                    None => Resolution::endpoint(Endpoint::TEXT),
                },
                None => Resolution::endpoint(Endpoint::MESSAGE),
            }
        }
        Update::MessageCallback(u) => Resolution::endpoint(Endpoint::callback(&u.callback.payload)),
        Update::Unknown(_) => Resolution::default(),
        other => other
            .update_type()
            .and_then(lifecycle_endpoint)
            .map(Resolution::endpoint)
            .unwrap_or_default(),
    }
}

/// Fixed endpoint of update kinds that carry no routing data of their own.
fn lifecycle_endpoint(kind: UpdateType) -> Option<Endpoint> {
    Some(match kind {
        UpdateType::MessageEdited => Endpoint::EDITED,
        UpdateType::MessageRemoved => Endpoint::REMOVED,
        UpdateType::BotStarted => Endpoint::BOT_STARTED,
        UpdateType::BotStopped => Endpoint::BOT_STOPPED,
        UpdateType::BotAdded => Endpoint::BOT_ADDED,
        UpdateType::BotRemoved => Endpoint::BOT_REMOVED,
        UpdateType::UserAdded => Endpoint::USER_ADDED,
        UpdateType::UserRemoved => Endpoint::USER_REMOVED,
        UpdateType::ChatTitleChanged => Endpoint::TITLE_CHANGED,
        UpdateType::MessageChatCreated => Endpoint::CHAT_CREATED,
        UpdateType::DialogMuted => Endpoint::DIALOG_MUTED,
        UpdateType::DialogUnmuted => Endpoint::DIALOG_UNMUTED,
        UpdateType::DialogCleared => Endpoint::DIALOG_CLEARED,
        UpdateType::DialogRemoved => Endpoint::DIALOG_REMOVED,
        UpdateType::MessageCreated | UpdateType::MessageCallback => return None,
    })
}
