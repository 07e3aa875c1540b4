use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::payloads::{SendMessageSetters, SendPhotoSetters};
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tracing::{debug, info, warn};
use url::Url;

use crate::compose::Reply;
use crate::config::ConfigStore;
use crate::handlers;
use crate::pipeline;
use crate::shorten::UrlShortener;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state: the live config store plus one HTTP client
/// reused by vendor lookups and the shortener.
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, http })
    }
}

/// Start the Telegram bot
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.current().telegram.bot_token);

    info!("Starting Telegram bot...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    // One snapshot for the whole pass; a reload mid-flight doesn't mix values.
    let config = state.config.current();

    if config.is_user_excluded(user.id.0, user.username.as_deref()) {
        debug!("Skipping message from excluded user {}", user.id.0);
        return Ok(());
    }

    if let Some(keyword) = text.strip_prefix('/') {
        if config.discount_keywords.iter().any(|k| k == keyword) {
            bot.send_message(msg.chat.id, "🧾 No hay descuentos activos todavía")
                .await?;
            return Ok(());
        }
    }

    // Link rewriting applies to group chats only.
    if !(msg.chat.is_group() || msg.chat.is_supergroup()) {
        return Ok(());
    }

    info!("Processing message from user {} in chat {}", user.id.0, msg.chat.id.0);

    let handlers = handlers::registry(&config, &state.http);
    let shortener = UrlShortener::new(state.http.clone(), config.shortener.base_url.clone());
    let replies = pipeline::process_message(&text, &handlers, &shortener).await;

    for reply in replies {
        send_reply(&bot, msg.chat.id, reply).await;
    }

    Ok(())
}

/// Best-effort send: a failed reply is logged by the error handler chain,
/// never fatal to the dispatcher.
async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) {
    match reply {
        Reply::Text(text) => {
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .await
                .ok();
        }
        Reply::Photo { image_url, caption } => match Url::parse(&image_url) {
            Ok(image) => {
                bot.send_photo(chat_id, InputFile::url(image))
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
                    .ok();
            }
            Err(_) => {
                // Unparseable image URL from the vendor: degrade to text.
                bot.send_message(chat_id, caption)
                    .parse_mode(ParseMode::Html)
                    .await
                    .ok();
            }
        },
    }
}
