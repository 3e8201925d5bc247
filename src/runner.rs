use crate::auth::AuthGate;
use crate::bot::handlers::{self, Command, SessionDialogue};
use crate::bot::media::TelegramFetcher;
use crate::config::Settings;
use crate::controller::ConversationController;
use crate::presentation::CALLBACK_REFRESH_LIST;
use crate::session::Session;
use crate::storage::FsMediaStore;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<Settings>) {
    let store = init_storage(&settings).await;

    let bot = Bot::new(settings.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let gate = AuthGate::new(settings.bot_password.clone(), settings.admin_timeout);
    info!("Admin sessions last {} minutes.", gate.timeout_minutes());

    let controller = Arc::new(ConversationController::new(
        store,
        Arc::new(TelegramFetcher::new(bot.clone())),
        gate,
    ));
    let sessions = init_sessions();
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller, sessions])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_storage(settings: &Settings) -> Arc<FsMediaStore> {
    match FsMediaStore::open(&settings.storage_path, &settings.db_file).await {
        Ok(s) => {
            info!(
                "Catalog storage initialized at {}.",
                settings.storage_path.display()
            );
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize catalog storage: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_sessions() -> Arc<InMemStorage<Session>> {
    InMemStorage::<Session>::new()
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| q.data.as_deref() == Some(CALLBACK_REFRESH_LIST))
                .enter_dialogue::<CallbackQuery, InMemStorage<Session>, Session>()
                .endpoint(handle_refresh),
        )
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<Session>, Session>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo),
                )
                .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text)),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_command(bot, msg, cmd, controller, dialogue).await {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(bot, msg, controller, dialogue).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_photo(
    bot: Bot,
    msg: Message,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_photo(bot, msg, controller, dialogue).await {
        error!("Photo handler error: {}", e);
    }
    respond(())
}

async fn handle_refresh(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<ConversationController>,
    dialogue: SessionDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_refresh(bot, q, controller, dialogue).await {
        error!("Refresh handler error: {}", e);
    }
    respond(())
}
