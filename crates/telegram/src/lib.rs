//! Telegram delivery for trading alerts.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{info, warn};

use common::Notifier;

/// Sends every alert to each configured chat as HTML.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_ids: &[i64]) -> Self {
        let chat_ids: Vec<ChatId> = chat_ids.iter().copied().map(ChatId).collect();
        info!(chats = chat_ids.len(), "Telegram notifier configured");
        Self { bot: Bot::new(token), chat_ids }
    }

    pub fn chat_count(&self) -> usize {
        self.chat_ids.len()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) {
        for &chat_id in &self.chat_ids {
            if let Err(e) = self.bot.send_message(chat_id, message).parse_mode(ParseMode::Html).await {
                warn!(chat_id = chat_id.0, error = %e, "Failed to send Telegram alert");
            }
        }
    }
}
