//! Media download from Telegram
//!
//! Resolves a photo's file id to its bytes through the Bot API.

use crate::controller::MediaFetcher;
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::debug;

/// Downloads attachments through the Bot API
#[derive(Clone)]
pub struct TelegramFetcher {
    bot: Bot,
}

impl TelegramFetcher {
    /// Create a fetcher using `bot` for API calls.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MediaFetcher for TelegramFetcher {
    async fn fetch(&self, file_id: &str) -> anyhow::Result<Vec<u8>> {
        let buffer = crate::utils::retry_telegram_operation(|| async {
            let file = self.bot.get_file(FileId(file_id.to_string())).await?;
            let mut buf = Vec::new();
            self.bot.download_file(&file.path, &mut buf).await?;
            Ok(buf)
        })
        .await?;

        debug!(size = buffer.len(), "Downloaded photo from Telegram");
        Ok(buffer)
    }
}
