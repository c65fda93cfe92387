//! Platform client contract.
//!
//! Brass does not talk HTTP itself. The runtime polls through, and handlers
//! reply through, an implementation of [`PlatformClient`] supplied by the
//! application. Every call takes the cancellation token of the operation it
//! belongs to so a shutdown can abort in-flight requests.
//!
//! Only [`PlatformClient::get_updates`] is required; the outbound calls
//! default to [`ApiError::NotSupported`] so read-only bots and test doubles
//! stay small.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::update::Message;

/// A type-erased platform client shared between the poller and handlers.
pub type BoxedClient = Arc<dyn PlatformClient>;

// =============================================================================
// Requests
// =============================================================================

/// Parameters of one long-poll request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetUpdatesOptions {
    /// How long the platform may hold the request open.
    pub timeout: Duration,
    /// Position to continue from; `None` on the first request.
    pub marker: Option<i64>,
    /// Update tags to receive. Empty means all.
    pub types: Vec<String>,
    /// Maximum number of updates per batch.
    pub limit: u32,
}

/// Text formatting applied by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    Markdown,
    Html,
}

/// How a new message relates to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Reply,
    Forward,
}

/// Link to an existing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageLink {
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub mid: String,
}

impl NewMessageLink {
    /// A reply link to the given message id.
    pub fn reply(mid: impl Into<String>) -> Self {
        Self {
            link_type: LinkType::Reply,
            mid: mid.into(),
        }
    }
}

/// Body of an outgoing or edited message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<NewMessageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,
    #[serde(default)]
    pub disable_link_preview: bool,
}

/// Answer to a callback button press.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackAnswer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<NewMessageBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
}

/// Activity indicator shown to chat members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderAction {
    TypingOn,
    SendingPhoto,
    SendingVideo,
    SendingAudio,
    SendingFile,
    MarkSeen,
}

// =============================================================================
// Responses
// =============================================================================

/// One batch of raw updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateList {
    #[serde(default)]
    pub updates: Vec<Value>,
    /// Position to pass on the next request.
    #[serde(default)]
    pub marker: Option<i64>,
}

/// Generic acknowledgement returned by mutating calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// PlatformClient
// =============================================================================

/// The calls Brass makes against the chat platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetches the next batch of updates, holding the request open for up
    /// to `options.timeout`.
    async fn get_updates(
        &self,
        cancel: &CancellationToken,
        options: &GetUpdatesOptions,
    ) -> ApiResult<UpdateList>;

    /// Sends a message to a chat.
    async fn send_message(
        &self,
        _cancel: &CancellationToken,
        _chat_id: i64,
        _body: &NewMessageBody,
    ) -> ApiResult<Message> {
        Err(ApiError::NotSupported("send_message"))
    }

    /// Replaces the contents of a message.
    async fn edit_message(
        &self,
        _cancel: &CancellationToken,
        _message_id: &str,
        _body: &NewMessageBody,
    ) -> ApiResult<SimpleResult> {
        Err(ApiError::NotSupported("edit_message"))
    }

    /// Deletes a message.
    async fn delete_message(
        &self,
        _cancel: &CancellationToken,
        _message_id: &str,
    ) -> ApiResult<SimpleResult> {
        Err(ApiError::NotSupported("delete_message"))
    }

    /// Answers a callback button press.
    async fn answer_callback(
        &self,
        _cancel: &CancellationToken,
        _callback_id: &str,
        _answer: &CallbackAnswer,
    ) -> ApiResult<SimpleResult> {
        Err(ApiError::NotSupported("answer_callback"))
    }

    /// Shows an activity indicator in a chat.
    async fn send_action(
        &self,
        _cancel: &CancellationToken,
        _chat_id: i64,
        _action: SenderAction,
    ) -> ApiResult<SimpleResult> {
        Err(ApiError::NotSupported("send_action"))
    }
}
