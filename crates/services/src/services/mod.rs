pub mod ai_settings;
pub mod claude_api;
pub mod dispatcher;
pub mod language_model;
pub mod logic_pages;
pub mod oauth;
pub mod page_generator;
pub mod pricing;
pub mod prompt_context;
pub mod reserved_page;
pub mod response_parser;
pub mod structured_backend;
pub mod telegram;
pub mod ui_preview;
pub mod webhook;
