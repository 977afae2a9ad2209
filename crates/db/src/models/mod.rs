pub mod ai_settings;
pub mod ai_usage;
pub mod integration;
pub mod logic_page;
pub mod oauth;
pub mod page;
pub mod reserved_page;
pub mod telegram_bot;
