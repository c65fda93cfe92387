//! # Brass Core
//!
//! Building blocks shared by every Brass crate:
//!
//! - **Update model** ([`update`]): the closed set of inbound platform events
//!   and the tag-driven decoder that produces them ([`Update::from_value`]).
//! - **Client contract** ([`client`]): the [`PlatformClient`] trait the runtime
//!   polls through and handlers reply through, plus its request and response
//!   types.
//! - **Retry policy** ([`retry`]): classification of platform errors into
//!   wait schedules ([`RetryPolicy`]).
//! - **Errors** ([`error`]): [`ApiError`] and [`DecodeError`].
//!
//! Nothing here knows about routing or dispatch; those live in
//! `brass-framework` and `brass-runtime`.

pub mod client;
pub mod error;
pub mod retry;
pub mod update;

pub use client::{
    BoxedClient, CallbackAnswer, GetUpdatesOptions, LinkType, NewMessageBody, NewMessageLink,
    PlatformClient, SenderAction, SimpleResult, TextFormat, UpdateList,
};
pub use error::{ApiError, ApiResult, DecodeError, DecodeResult};
pub use retry::{DEFAULT_RATE_LIMIT_INTERVALS, DEFAULT_UPLOAD_RETRY_INTERVALS, RetryPolicy};
pub use update::{
    BotStartedUpdate, Callback, Chat, ChatMemberUpdate, ChatTitleChangedUpdate,
    DialogMutedUpdate, Message, MessageBody, MessageCallbackUpdate, MessageChatCreatedUpdate,
    MessageCreatedUpdate, MessageEditedUpdate, MessageRemovedUpdate, Recipient, UnknownUpdate,
    Update, UpdateType, User, UserAddedUpdate, UserRemovedUpdate,
};

// Re-exported so client implementations need no direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
