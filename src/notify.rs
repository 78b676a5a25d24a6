//! Notification rendering and delivery.
//!
//! Messages use Telegram's HTML parse mode. Bridge lines are embedded
//! verbatim inside `<code>` tags.
//!
//! Two [`Notifier`] implementations:
//! - **[`TelegramNotifier`]**: `sendMessage` on the Bot API, split into
//!   chunks of at most `max_message_chars` characters.
//! - **[`LogNotifier`]**: writes messages to the log; used when no bot
//!   token or chat id is configured.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::models::CategoryLines;
use crate::traits::Notifier;

pub const NEW_BRIDGES_TITLE: &str = "🚀 Latest Tor Bridges";
pub const DUPLICATE_BRIDGES_TITLE: &str = "Duplicate Bridges Found";
pub const FETCH_FAILED_MESSAGE: &str =
    "❌ <b>Failed to fetch any bridges.</b>\nPlease check logs or try again later.";

/// Renders a titled message with one section per non-empty category.
///
/// Returns `None` when there is nothing to send.
pub fn render_grouped(title: &str, groups: &CategoryLines) -> Option<String> {
    if groups.values().all(|lines| lines.is_empty()) {
        return None;
    }

    let mut message = format!("<b>{}:</b>\n\n", title);
    for (category, lines) in groups {
        if lines.is_empty() {
            continue;
        }
        message.push_str(&format!("<b>{}:</b>\n", category.label()));
        for line in lines {
            message.push_str(&format!("<code>{}</code>\n\n", line));
        }
    }
    Some(message)
}

/// Renders the flat listing of lines that failed classification.
pub fn render_malformed(lines: &[String]) -> String {
    let mut message = String::from("<b>Malformed Bridges Found:</b>\n\n");
    for line in lines {
        message.push_str(&format!("<code>{}</code>\n\n", line));
    }
    message
}

/// Splits `text` into pieces of at most `max_chars` characters, never
/// inside a UTF-8 sequence.
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Picks the Telegram notifier when credentials are configured, else logs.
pub fn create_notifier(config: &TelegramConfig) -> Result<Arc<dyn Notifier>> {
    if config.is_enabled() {
        Ok(Arc::new(TelegramNotifier::new(config)?))
    } else {
        warn!("Telegram bot token or chat id not set; notifications go to the log");
        Ok(Arc::new(LogNotifier))
    }
}

// ============ Telegram ============

pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
    max_chars: usize,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("telegram.bot_token required"))?;
        let chat_id = config
            .chat_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow::anyhow!("telegram.chat_id required"))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            chat_id,
            max_chars: config.max_message_chars,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, text: &str) -> Result<()> {
        for part in chunk_message(text, self.max_chars) {
            let body = serde_json::json!({
                "chat_id": self.chat_id,
                "text": part,
                "parse_mode": "HTML",
            });

            let resp = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .context("Telegram sendMessage request failed")?;

            let status = resp.status();
            if !status.is_success() {
                let detail = resp.text().await.unwrap_or_default();
                bail!("Telegram sendMessage returned HTTP {}: {}", status, detail);
            }
        }
        Ok(())
    }
}

// ============ Log ============

/// Writes every message to the log at `info` level.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str) -> Result<()> {
        info!(target: "notification", "{}", text);
        Ok(())
    }
}
