//! Per-update execution context.
//!
//! One [`Context`] is built for every dispatched update and handed, behind an
//! `Arc`, to the whole middleware and handler chain. It binds:
//!
//! - the decoded [`Update`] and its [`Meta`] snapshot (sender, chat, message);
//! - the resolved endpoint, command and payload;
//! - the platform client and retry policy used for replies;
//! - the bot's shutdown token;
//! - a small key/value store private to this update.
//!
//! Accessors never fail: they return `None`, `0` or an empty string when the
//! update has no such field. Operations that cannot work for the update shape
//! return a precondition [`ContextError`] instead of calling the platform.
//!
//! ```rust,ignore
//! router.handle("/echo", |ctx: Arc<Context>| async move {
//!     let text = ctx.payload().to_owned();
//!     ctx.reply(text, SendOptions::new()).await?;
//!     Ok::<_, ContextError>(())
//! });
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use brass_core::{
    BoxedClient, Callback, CallbackAnswer, Message, NewMessageBody, NewMessageLink, RetryPolicy,
    SenderAction, TextFormat, Update, User,
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{Endpoint, Resolution};
use crate::error::{ContextError, ContextResult};

// =============================================================================
// Meta
// =============================================================================

/// Routing-independent facts about an update, extracted once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub sender: Option<User>,
    /// Chat identifier, `0` when the update names no chat.
    pub chat_id: i64,
    pub message: Option<Message>,
}

impl Meta {
    pub fn from_update(update: &Update) -> Self {
        let member = |chat_id: i64, user: &User| Self {
            sender: Some(user.clone()),
            chat_id,
            message: None,
        };

        match update {
            Update::MessageCreated(u) => Self::from_message(&u.message),
            Update::MessageEdited(u) => Self::from_message(&u.message),
            Update::MessageCallback(u) => Self {
                sender: Some(u.callback.user.clone()),
                chat_id: u.message.as_ref().map_or(0, Message::chat_id),
                message: u.message.clone(),
            },
            Update::MessageRemoved(u) => Self {
                chat_id: u.chat_id,
                ..Self::default()
            },
            Update::MessageChatCreated(u) => Self {
                chat_id: u.chat.chat_id,
                ..Self::default()
            },
            Update::BotStarted(u) => member(u.chat_id, &u.user),
            Update::BotStopped(u)
            | Update::BotAdded(u)
            | Update::BotRemoved(u)
            | Update::DialogUnmuted(u)
            | Update::DialogCleared(u)
            | Update::DialogRemoved(u) => member(u.chat_id, &u.user),
            Update::UserAdded(u) => member(u.chat_id, &u.user),
            Update::UserRemoved(u) => member(u.chat_id, &u.user),
            Update::ChatTitleChanged(u) => member(u.chat_id, &u.user),
            Update::DialogMuted(u) => member(u.chat_id, &u.user),
            Update::Unknown(_) => Self::default(),
        }
    }

    fn from_message(message: &Message) -> Self {
        Self {
            sender: message.sender.clone(),
            chat_id: message.chat_id(),
            message: Some(message.clone()),
        }
    }
}

// =============================================================================
// SendOptions
// =============================================================================

/// Optional parameters of [`Context::send`] and friends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    reply_to: Option<String>,
    notify: Option<bool>,
    format: Option<TextFormat>,
    attachments: Vec<Value>,
    disable_link_preview: bool,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends the message as a reply to `mid`.
    pub fn reply_to(mut self, mid: impl Into<String>) -> Self {
        self.reply_to = Some(mid.into());
        self
    }

    /// Whether chat members get a notification.
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = Some(notify);
        self
    }

    pub fn format(mut self, format: TextFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Appends a raw attachment request.
    pub fn attachment(mut self, attachment: Value) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachments(mut self, attachments: impl IntoIterator<Item = Value>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    pub fn disable_link_preview(mut self) -> Self {
        self.disable_link_preview = true;
        self
    }

    fn into_body(self, text: String) -> NewMessageBody {
        NewMessageBody {
            text: Some(text),
            attachments: self.attachments,
            link: self.reply_to.map(NewMessageLink::reply),
            notify: self.notify,
            format: self.format,
            disable_link_preview: self.disable_link_preview,
        }
    }
}

// =============================================================================
// Context
// =============================================================================

/// The context handed to middleware and handlers for one update.
pub struct Context {
    update: Update,
    meta: Meta,
    resolution: Resolution,
    client: BoxedClient,
    retry: Arc<RetryPolicy>,
    cancel: CancellationToken,
    store: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Creates a context for an update that resolved to `resolution`.
    pub fn new(
        update: Update,
        resolution: Resolution,
        client: BoxedClient,
        retry: Arc<RetryPolicy>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            meta: Meta::from_update(&update),
            update,
            resolution,
            client,
            retry,
            cancel,
            store: RwLock::new(HashMap::new()),
        }
    }

    // ─── Update data ──────────────────────────────────────────────────────────

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn sender(&self) -> Option<&User> {
        self.meta.sender.as_ref()
    }

    /// Chat identifier, `0` when absent.
    pub fn chat(&self) -> i64 {
        self.meta.chat_id
    }

    pub fn message(&self) -> Option<&Message> {
        self.meta.message.as_ref()
    }

    /// Message text, empty when there is none.
    pub fn text(&self) -> &str {
        self.message().and_then(Message::text).unwrap_or_default()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.resolution.endpoint
    }

    /// Command name without the leading `/`.
    pub fn command(&self) -> &str {
        &self.resolution.command
    }

    /// Command payload, or the deep-link payload of a bot start.
    pub fn payload(&self) -> &str {
        if !self.resolution.payload.is_empty() {
            return &self.resolution.payload;
        }
        match &self.update {
            Update::BotStarted(u) => u.payload.as_deref().unwrap_or_default(),
            _ => "",
        }
    }

    /// [`payload`](Self::payload) split on whitespace.
    pub fn args(&self) -> Vec<&str> {
        self.payload().split_whitespace().collect()
    }

    pub fn callback(&self) -> Option<&Callback> {
        match &self.update {
            Update::MessageCallback(u) => Some(&u.callback),
            _ => None,
        }
    }

    /// Callback payload, empty for other updates.
    pub fn data(&self) -> &str {
        self.callback().map_or("", |cb| cb.payload.as_str())
    }

    // ─── Runtime handles ──────────────────────────────────────────────────────

    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Cancelled when the bot shuts down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    // ─── Store ────────────────────────────────────────────────────────────────

    /// Stores a value under `key`, replacing any previous one.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.store.write().insert(key.into(), Box::new(value));
    }

    /// Returns a clone of the value under `key` if it has type `T`.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.store
            .read()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.read().contains_key(key)
    }

    /// Removes the value under `key` whatever its type. Returns whether a
    /// value was present.
    pub fn remove(&self, key: &str) -> bool {
        self.store.write().remove(key).is_some()
    }

    /// Removes the value under `key` if it has type `T`.
    pub fn take<T: 'static>(&self, key: &str) -> Option<T> {
        let mut store = self.store.write();
        if !store.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        store
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    // ─── Platform operations ──────────────────────────────────────────────────

    /// Sends a message to the update's chat.
    pub async fn send(&self, text: impl Into<String>, options: SendOptions) -> ContextResult<Message> {
        let chat_id = self.chat();
        if chat_id == 0 {
            return Err(ContextError::NoChatId);
        }

        let body = options.into_body(text.into());
        let (client, cancel, body) = (&self.client, &self.cancel, &body);
        let sent = self
            .retry
            .run(cancel, move || client.send_message(cancel, chat_id, body))
            .await?;
        Ok(sent)
    }

    /// Replies to the update's message, or sends plainly when there is none.
    ///
    /// An explicit [`SendOptions::reply_to`] takes precedence.
    pub async fn reply(
        &self,
        text: impl Into<String>,
        mut options: SendOptions,
    ) -> ContextResult<Message> {
        if options.reply_to.is_none()
            && let Some(message) = self.message()
        {
            options.reply_to = Some(message.body.mid.clone());
        }
        self.send(text, options).await
    }

    /// Replaces the text of the update's message.
    pub async fn edit(&self, text: impl Into<String>, options: SendOptions) -> ContextResult<()> {
        let mid = self.message_id()?;
        let body = options.into_body(text.into());
        let (client, cancel, body) = (&self.client, &self.cancel, &body);
        self.retry
            .run(cancel, move || client.edit_message(cancel, mid, body))
            .await?;
        Ok(())
    }

    /// Deletes the update's message.
    pub async fn delete(&self) -> ContextResult<()> {
        let mid = self.message_id()?;
        let (client, cancel) = (&self.client, &self.cancel);
        self.retry
            .run(cancel, move || client.delete_message(cancel, mid))
            .await?;
        Ok(())
    }

    /// Answers the callback with a notification.
    pub async fn respond(&self, text: impl Into<String>) -> ContextResult<()> {
        let callback = self.callback().ok_or(ContextError::NoCallback)?;
        let answer = CallbackAnswer {
            message: None,
            notification: Some(text.into()),
        };
        let (client, cancel, answer) = (&self.client, &self.cancel, &answer);
        let id = callback.callback_id.as_str();
        self.retry
            .run(cancel, move || client.answer_callback(cancel, id, answer))
            .await?;
        Ok(())
    }

    /// Answers the callback with an alert.
    ///
    /// The platform renders every callback notification the same way, so
    /// this is [`respond`](Self::respond) under a more explicit name.
    pub async fn respond_alert(&self, text: impl Into<String>) -> ContextResult<()> {
        self.respond(text).await
    }

    /// Shows an activity indicator in the update's chat.
    pub async fn notify(&self, action: SenderAction) -> ContextResult<()> {
        let chat_id = self.chat();
        if chat_id == 0 {
            return Err(ContextError::NoChatId);
        }
        let (client, cancel) = (&self.client, &self.cancel);
        self.retry
            .run(cancel, move || client.send_action(cancel, chat_id, action))
            .await?;
        Ok(())
    }

    fn message_id(&self) -> ContextResult<&str> {
        self.message()
            .map(|m| m.body.mid.as_str())
            .ok_or(ContextError::NoMessage)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("update_type", &self.update.type_tag())
            .field("endpoint", &self.resolution.endpoint)
            .field("chat_id", &self.meta.chat_id)
            .finish_non_exhaustive()
    }
}
