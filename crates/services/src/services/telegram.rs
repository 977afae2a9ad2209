//! Notification decisions for Telegram bots. Messages are sent outside this service.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use db::models::telegram_bot::{NotificationSettings, NotificationTiming, TelegramBot};
use serde::Serialize;
use ts_rs::TS;
use utils::{template, text::mask_secret};
use uuid::Uuid;

/// Bot as returned to the admin UI; the token is masked.
#[derive(Debug, Clone, Serialize, TS)]
pub struct TelegramBotView {
    pub id: Uuid,
    pub name: String,
    pub bot_token: String,
    pub chat_id: String,
    pub enabled: bool,
    pub notification_settings: NotificationSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TelegramBot> for TelegramBotView {
    fn from(bot: &TelegramBot) -> Self {
        Self {
            id: bot.id,
            name: bot.name.clone(),
            bot_token: mask_secret(&bot.bot_token),
            chat_id: bot.chat_id.clone(),
            enabled: bot.enabled,
            notification_settings: bot.parsed_settings(),
            created_at: bot.created_at,
            updated_at: bot.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct NotificationDecision {
    pub bot_id: Uuid,
    pub event: String,
    pub notify: bool,
    pub timing: Option<NotificationTiming>,
    /// Why nothing will be sent
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Whether `bot` notifies about `event`, when, and with what text.
pub fn decide(
    bot: &TelegramBot,
    event: &str,
    variables: &HashMap<String, String>,
) -> NotificationDecision {
    let skip = |reason: &str| NotificationDecision {
        bot_id: bot.id,
        event: event.to_string(),
        notify: false,
        timing: None,
        reason: Some(reason.to_string()),
        message: None,
    };

    if !bot.enabled {
        return skip("bot is disabled");
    }
    let settings = bot.parsed_settings();
    let Some(config) = settings.get(event) else {
        return skip("event is not configured for this bot");
    };
    if !config.enabled {
        return skip("event notifications are disabled");
    }

    let mut variables = variables.clone();
    variables
        .entry("event".to_string())
        .or_insert_with(|| event.to_string());
    let message = match config.template.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(tpl) => template::render(tpl, &variables),
        None => default_message(event, &variables),
    };

    NotificationDecision {
        bot_id: bot.id,
        event: event.to_string(),
        notify: true,
        timing: Some(config.timing),
        reason: None,
        message: Some(message),
    }
}

fn default_message(event: &str, variables: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<_, _> = variables.iter().filter(|(k, _)| k.as_str() != "event").collect();
    let mut message = format!("Event: {event}");
    for (key, value) in sorted {
        message.push_str(&format!("\n{key}: {value}"));
    }
    message
}
