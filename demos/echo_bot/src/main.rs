//! Echo Bot Demo
//!
//! Runs a Brass bot against an in-memory client that plays back a short
//! conversation and prints everything the bot sends.
//!
//! # Routing
//!
//! ```text
//! /start, /ping        → command handlers
//! /echo:<text>          → echo the payload
//! /admin                → group with a whitelist
//! callback "like"       → callback handler
//! any other text        → echo
//! photo without caption → message fallback
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use brass::core::{
    CallbackAnswer, GetUpdatesOptions, Message, MessageBody, NewMessageBody, Recipient,
    SimpleResult, UpdateList,
};
use brass::prelude::*;
use brass::runtime::LoggingBuilder;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::info;

// ============================================================================
// In-memory client
// ============================================================================

/// Serves scripted batches, then long-polls until the bot stops.
struct ConsoleClient {
    batches: Mutex<VecDeque<Vec<Value>>>,
}

impl ConsoleClient {
    fn new(batches: Vec<Vec<Value>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl PlatformClient for ConsoleClient {
    async fn get_updates(
        &self,
        cancel: &CancellationToken,
        _options: &GetUpdatesOptions,
    ) -> ApiResult<UpdateList> {
        let next = self.batches.lock().pop_front();
        match next {
            Some(updates) => Ok(UpdateList {
                updates,
                marker: None,
            }),
            None => {
                cancel.cancelled().await;
                Err(ApiError::Cancelled)
            }
        }
    }

    async fn send_message(
        &self,
        _cancel: &CancellationToken,
        chat_id: i64,
        body: &NewMessageBody,
    ) -> ApiResult<Message> {
        let text = body.text.clone().unwrap_or_default();
        println!("[chat {chat_id}] bot: {text}");
        Ok(Message {
            recipient: Recipient {
                chat_id: Some(chat_id),
                ..Default::default()
            },
            body: MessageBody {
                text: Some(text),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn answer_callback(
        &self,
        _cancel: &CancellationToken,
        callback_id: &str,
        answer: &CallbackAnswer,
    ) -> ApiResult<SimpleResult> {
        println!(
            "[callback {callback_id}] bot: {}",
            answer.notification.as_deref().unwrap_or("<ack>")
        );
        Ok(SimpleResult {
            success: true,
            message: None,
        })
    }
}

fn text(user_id: i64, text: &str) -> Value {
    json!({
        "update_type": "message_created",
        "timestamp": 1,
        "message": {
            "sender": { "user_id": user_id, "first_name": "Demo" },
            "recipient": { "chat_id": 100, "chat_type": "dialog" },
            "body": { "mid": format!("mid-{text}"), "text": text }
        }
    })
}

fn photo(user_id: i64) -> Value {
    json!({
        "update_type": "message_created",
        "timestamp": 2,
        "message": {
            "sender": { "user_id": user_id },
            "recipient": { "chat_id": 100 },
            "body": { "mid": "mid-photo", "attachments": [{ "type": "image" }] }
        }
    })
}

fn press(user_id: i64, payload: &str) -> Value {
    json!({
        "update_type": "message_callback",
        "timestamp": 3,
        "callback": {
            "callback_id": "cb-1",
            "payload": payload,
            "user": { "user_id": user_id }
        }
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn start(ctx: Arc<Context>) -> ContextResult<()> {
    ctx.send("Hi! Send me anything and I'll echo it.", SendOptions::new())
        .await?;
    Ok(())
}

async fn ping(ctx: Arc<Context>) -> ContextResult<()> {
    ctx.reply("Pong!", SendOptions::new()).await?;
    Ok(())
}

async fn echo_command(ctx: Arc<Context>) -> ContextResult<()> {
    ctx.reply(ctx.payload(), SendOptions::new()).await?;
    Ok(())
}

async fn echo(ctx: Arc<Context>) -> ContextResult<()> {
    ctx.reply(ctx.text(), SendOptions::new()).await?;
    Ok(())
}

async fn any_message(ctx: Arc<Context>) -> ContextResult<()> {
    ctx.send("Nice picture, but I only echo text.", SendOptions::new())
        .await?;
    Ok(())
}

async fn like(ctx: Arc<Context>) -> ContextResult<()> {
    ctx.respond("Thanks!").await
}

async fn admin(ctx: Arc<Context>) -> ContextResult<()> {
    ctx.send("Welcome, admin.", SendOptions::new()).await?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    LoggingBuilder::new()
        .directive("brass_framework=debug")
        .init();

    let client = ConsoleClient::new(vec![
        vec![text(1, "/start"), text(1, "hello there")],
        vec![text(1, "/ping"), text(1, "/echo:repeat after me")],
        vec![photo(1), press(1, "like")],
        vec![text(1, "/admin"), text(42, "/admin")],
    ]);

    let mut bot = Bot::new(Arc::new(client));
    bot.pre(middleware::logger())
        .use_middleware(middleware::recover())
        .use_middleware(middleware::auto_respond())
        .handle("/start", start)
        .handle("/ping", ping)
        .handle("/echo", echo_command)
        .handle(Endpoint::TEXT, echo)
        .handle(Endpoint::MESSAGE, any_message)
        .handle(Endpoint::callback("like"), like);

    bot.group()
        .use_middleware(middleware::whitelist([42]))
        .handle("/admin", admin);

    bot.run_until(tokio::time::sleep(Duration::from_millis(500)))
        .await?;
    info!("Demo finished");
    Ok(())
}
