//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use brass_core::{
    ApiError, ApiResult, CallbackAnswer, GetUpdatesOptions, Message, MessageBody, NewMessageBody,
    PlatformClient, RetryPolicy, SenderAction, SimpleResult, Update, UpdateList,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::endpoint::resolve;

/// Records every outbound call and fails the ones queued with `fail_next`.
#[derive(Default)]
pub(crate) struct RecordingClient {
    calls: Mutex<Vec<String>>,
    sent: Mutex<Vec<(i64, NewMessageBody)>>,
    failures: Mutex<VecDeque<ApiError>>,
}

impl RecordingClient {
    pub(crate) fn fail_next(&self, err: ApiError) {
        self.failures.lock().push_back(err);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn sent_bodies(&self) -> Vec<(i64, NewMessageBody)> {
        self.sent.lock().clone()
    }

    fn record(&self, call: String) -> ApiResult<()> {
        self.calls.lock().push(call);
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformClient for RecordingClient {
    async fn get_updates(
        &self,
        _cancel: &CancellationToken,
        _options: &GetUpdatesOptions,
    ) -> ApiResult<UpdateList> {
        Ok(UpdateList::default())
    }

    async fn send_message(
        &self,
        _cancel: &CancellationToken,
        chat_id: i64,
        body: &NewMessageBody,
    ) -> ApiResult<Message> {
        self.record(format!("send_message:{chat_id}"))?;
        self.sent.lock().push((chat_id, body.clone()));
        Ok(Message {
            body: MessageBody {
                mid: "sent-1".into(),
                text: body.text.clone(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn edit_message(
        &self,
        _cancel: &CancellationToken,
        message_id: &str,
        _body: &NewMessageBody,
    ) -> ApiResult<SimpleResult> {
        self.record(format!("edit_message:{message_id}"))?;
        Ok(SimpleResult {
            success: true,
            message: None,
        })
    }

    async fn delete_message(
        &self,
        _cancel: &CancellationToken,
        message_id: &str,
    ) -> ApiResult<SimpleResult> {
        self.record(format!("delete_message:{message_id}"))?;
        Ok(SimpleResult {
            success: true,
            message: None,
        })
    }

    async fn answer_callback(
        &self,
        _cancel: &CancellationToken,
        callback_id: &str,
        answer: &CallbackAnswer,
    ) -> ApiResult<SimpleResult> {
        let text = answer.notification.as_deref().unwrap_or_default();
        self.record(format!("answer_callback:{callback_id}:{text}"))?;
        Ok(SimpleResult {
            success: true,
            message: None,
        })
    }

    async fn send_action(
        &self,
        _cancel: &CancellationToken,
        chat_id: i64,
        _action: SenderAction,
    ) -> ApiResult<SimpleResult> {
        self.record(format!("send_action:{chat_id}"))?;
        Ok(SimpleResult {
            success: true,
            message: None,
        })
    }
}

/// Builds a context for `update` backed by a fresh [`RecordingClient`].
pub(crate) fn context_for(update: Update) -> (Context, Arc<RecordingClient>) {
    let client = Arc::new(RecordingClient::default());
    let ctx = Context::new(
        update.clone(),
        resolve(&update),
        client.clone(),
        Arc::new(RetryPolicy::default()),
        CancellationToken::new(),
    );
    (ctx, client)
}
