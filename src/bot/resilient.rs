//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Sends are retried with exponential backoff and jitter. Cosmetic
//! operations (deleting the password message, refreshing the statistics,
//! acknowledging a button) degrade gracefully: their failures are logged and
//! swallowed.
//!
//! # Usage
//!
//! ```ignore
//! use herbarium_bot::bot::resilient::{send_message_resilient, delete_message_safe};
//!
//! let msg = send_message_resilient(&bot, chat_id, "Hello!", None, None).await?;
//! delete_message_safe(&bot, chat_id, msg.id).await;
//! ```

use anyhow::Result;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatId, InlineKeyboardMarkup, InputFile, Message, MessageId, ParseMode,
    ReplyMarkup,
};
use tracing::{debug, warn};

/// Send a message with automatic retry on network failures.
///
/// # Returns
///
/// The sent [`Message`] on success, or an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    markup: Option<ReplyMarkup>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Upload a local photo with a caption, retrying on network failures.
pub async fn send_photo_resilient(
    bot: &Bot,
    chat_id: ChatId,
    path: &Path,
    caption: &str,
) -> Result<Message> {
    crate::utils::retry_telegram_operation(|| async {
        bot.send_photo(chat_id, InputFile::file(path.to_path_buf()))
            .caption(caption.to_string())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram photo error: {e}"))
    })
    .await
}

/// Replace a MarkdownV2 message and its inline keyboard.
///
/// "message is not modified" is expected when nothing changed since the
/// last refresh and is logged at debug level.
pub async fn edit_markdown_safe(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    markup: InlineKeyboardMarkup,
) {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    if let Err(e) = bot
        .edit_message_text(chat_id, msg_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(markup)
        .await
    {
        let err_msg = e.to_string();
        if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
            debug!("Message update skipped: {err_msg}");
        } else {
            warn!("Failed to edit message: {e}");
        }
    }
}

/// Delete a message, ignoring failures (already deleted, too old, no rights).
pub async fn delete_message_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId) {
    if let Err(e) = bot.delete_message(chat_id, msg_id).await {
        debug!("Message deletion skipped: {e}");
    }
}

/// Stop the loading spinner on a tapped inline button.
pub async fn answer_callback_safe(bot: &Bot, q: &CallbackQuery) {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        debug!("Callback answer skipped: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::views::refresh_list_keyboard;

    // Nothing listens on the discard port, so every request fails fast
    fn unreachable_bot() -> anyhow::Result<Bot> {
        Ok(Bot::new("123456789:TEST").set_api_url("http://127.0.0.1:9/".parse()?))
    }

    #[tokio::test]
    async fn test_cosmetic_failures_are_swallowed() -> anyhow::Result<()> {
        let bot = unreachable_bot()?;
        let chat_id = ChatId(42);

        delete_message_safe(&bot, chat_id, MessageId(7)).await;
        edit_markdown_safe(&bot, chat_id, MessageId(7), "text", refresh_list_keyboard()).await;
        Ok(())
    }
}
