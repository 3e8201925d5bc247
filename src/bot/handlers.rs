use crate::bot::resilient::{
    answer_callback_safe, delete_message_safe, edit_markdown_safe, send_message_resilient,
    send_photo_resilient,
};
use crate::bot::views::{refresh_list_keyboard, reply_markup};
use crate::controller::{ConversationController, Event, Reply};
use crate::session::{Session, WaitingFor};
use crate::utils::truncate_str;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{CallbackQuery, ChatId, MessageId, ParseMode, ReplyMarkup},
    utils::command::BotCommands,
};
use tracing::{error, info};

/// Dialogue holding the per-chat session
pub type SessionDialogue = Dialogue<Session, InMemStorage<Session>>;

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message and menu
    #[command(description = "Start the bot.")]
    Start,
    /// Show category statistics
    #[command(description = "🌿 View all plant species")]
    List,
    /// Ask for a random photo
    #[command(description = "🎲 Get a random photo")]
    Random,
    /// Create a category (admin)
    #[command(description = "➕ Create new species")]
    AddSpecies,
    /// Start an upload session (admin)
    #[command(description = "📷 Upload photos")]
    Upload,
    /// End the admin session
    #[command(description = "🔓 End admin session")]
    Logout,
    /// Abort the pending input
    #[command(description = "❌ Cancel action")]
    Cancel,
    /// Finish the upload session
    #[command(description = "✅ Finish uploading")]
    Done,
}

impl From<Command> for Event {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => Self::Start,
            Command::List => Self::List,
            Command::Random => Self::Random,
            Command::AddSpecies => Self::AddCategory,
            Command::Upload => Self::Upload,
            Command::Logout => Self::Logout,
            Command::Cancel => Self::Cancel,
            Command::Done => Self::Done,
        }
    }
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Run one event through the controller with the chat's session.
///
/// The session is written back even when the controller fails, so partial
/// transitions are not lost.
async fn process_event(
    controller: &ConversationController,
    dialogue: &SessionDialogue,
    event: Event,
) -> Result<Vec<Reply>> {
    let mut session = dialogue
        .get_or_default()
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    let outcome = controller.handle(&mut session, event, Utc::now()).await;

    dialogue
        .update(session)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    Ok(outcome?)
}

/// Command handler
///
/// # Errors
///
/// Returns an error if the catalog or the session storage fails, or a reply cannot be sent.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} issued command {cmd:?}.");

    let replies = process_event(&controller, &dialogue, cmd.into()).await?;
    deliver(&bot, msg.chat.id, Some(msg.id), replies).await
}

/// Text message handler
///
/// # Errors
///
/// Returns an error if the catalog or the session storage fails, or a reply cannot be sent.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<()> {
    let text = msg.text().unwrap_or_default().to_string();
    let user_id = get_user_id_safe(&msg);

    let awaiting_password = dialogue
        .get()
        .await
        .map_err(|e| anyhow!(e.to_string()))?
        .is_some_and(|s| s.waiting_for == WaitingFor::Password);
    if awaiting_password {
        info!("User {user_id} submitted a password attempt.");
    } else {
        info!(
            "Handling text from user {user_id}: '{}'",
            truncate_str(&text, 100)
        );
    }

    let replies = process_event(&controller, &dialogue, Event::Text(text)).await?;
    deliver(&bot, msg.chat.id, Some(msg.id), replies).await
}

/// Photo message handler
///
/// # Errors
///
/// Returns an error if the session storage fails or a reply cannot be sent.
pub async fn handle_photo(
    bot: Bot,
    msg: Message,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<()> {
    // Telegram lists sizes ascending; keep the largest
    let Some(photo) = msg.photo().and_then(<[_]>::last) else {
        return Ok(());
    };
    let user_id = get_user_id_safe(&msg);
    info!("Received photo from user {user_id}.");

    let event = Event::Photo {
        file_id: photo.file.id.0.clone(),
    };
    let replies = process_event(&controller, &dialogue, event).await?;
    deliver(&bot, msg.chat.id, Some(msg.id), replies).await
}

/// Inline refresh button handler
///
/// # Errors
///
/// Returns an error if the catalog or the session storage fails.
pub async fn handle_refresh(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<()> {
    let replies = process_event(&controller, &dialogue, Event::RefreshList).await?;

    for reply in replies {
        match reply {
            Reply::EditStats { text } => {
                if let Some(message) = q.message.as_ref() {
                    edit_markdown_safe(
                        &bot,
                        message.chat().id,
                        message.id(),
                        &text,
                        refresh_list_keyboard(),
                    )
                    .await;
                }
            }
            Reply::AckCallback => answer_callback_safe(&bot, &q).await,
            other => error!("Unexpected reply to a refresh tap: {other:?}"),
        }
    }
    Ok(())
}

/// Render controller replies into Telegram calls, in order.
async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    incoming: Option<MessageId>,
    replies: Vec<Reply>,
) -> Result<()> {
    for reply in replies {
        match reply {
            Reply::Text { text, keyboard } => {
                send_message_resilient(bot, chat_id, text, None, reply_markup(&keyboard)).await?;
            }
            Reply::Stats { text, refreshable } => {
                let markup =
                    refreshable.then(|| ReplyMarkup::InlineKeyboard(refresh_list_keyboard()));
                send_message_resilient(bot, chat_id, text, Some(ParseMode::MarkdownV2), markup)
                    .await?;
            }
            Reply::Photo { path, caption } => {
                send_photo_resilient(bot, chat_id, &path, &caption).await?;
            }
            Reply::DeleteIncoming => {
                if let Some(msg_id) = incoming {
                    delete_message_safe(bot, chat_id, msg_id).await;
                }
            }
            Reply::EditStats { .. } | Reply::AckCallback => {
                error!("Callback-only reply produced for a message event");
            }
        }
    }
    Ok(())
}
