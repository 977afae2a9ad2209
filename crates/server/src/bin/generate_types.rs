//! Writes the TypeScript declarations of the API types for the admin UI.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ts_rs::TS;

#[derive(Parser)]
#[command(name = "generate_types", about = "Export API types to TypeScript")]
struct Cli {
    /// Output file
    #[arg(long, default_value = "shared/types.ts")]
    output: PathBuf,

    /// Fail instead of writing when the file is out of date
    #[arg(long)]
    check: bool,
}

fn declarations() -> Vec<String> {
    vec![
        utils::response::ApiResponse::<(), ()>::decl(),
        db::models::page::AccessLevel::decl(),
        db::models::page::Page::decl(),
        db::models::page::CreatePage::decl(),
        db::models::page::UpdatePage::decl(),
        db::models::logic_page::LogicPageStatus::decl(),
        db::models::logic_page::InputField::decl(),
        db::models::logic_page::LogicPage::decl(),
        db::models::logic_page::CreateLogicPage::decl(),
        db::models::logic_page::UpdateLogicPage::decl(),
        db::models::logic_page::LogicPageExecution::decl(),
        db::models::logic_page::CreateLogicPageExecution::decl(),
        db::models::reserved_page::ReservedPageOverride::decl(),
        db::models::ai_settings::UpdateAiSettings::decl(),
        db::models::ai_usage::AiUsage::decl(),
        db::models::integration::Integration::decl(),
        db::models::integration::CreateIntegration::decl(),
        db::models::integration::UpdateIntegration::decl(),
        db::models::oauth::OAuthService::decl(),
        db::models::oauth::CreateOAuthService::decl(),
        db::models::oauth::UpdateOAuthService::decl(),
        db::models::oauth::CreateOAuthConnection::decl(),
        db::models::telegram_bot::NotificationTiming::decl(),
        db::models::telegram_bot::EventNotification::decl(),
        db::models::telegram_bot::CreateTelegramBot::decl(),
        db::models::telegram_bot::UpdateTelegramBot::decl(),
        services::services::ai_settings::AiSettingsView::decl(),
        services::services::ai_settings::UsageSummary::decl(),
        services::services::prompt_context::RequiredElement::decl(),
        services::services::reserved_page::IterationType::decl(),
        services::services::reserved_page::GenerateReservedPageRequest::decl(),
        services::services::reserved_page::GeneratedReservedPage::decl(),
        services::services::reserved_page::ReservedPageSummary::decl(),
        services::services::structured_backend::GenerateStructuredBackendRequest::decl(),
        services::services::structured_backend::StructuredCode::decl(),
        services::services::structured_backend::GenerationMetadata::decl(),
        services::services::structured_backend::GeneratedBackend::decl(),
        services::services::page_generator::GeneratePageRequest::decl(),
        services::services::page_generator::GeneratedPage::decl(),
        services::services::ui_preview::PreviewType::decl(),
        services::services::ui_preview::GenerateUiPreviewRequest::decl(),
        services::services::ui_preview::PageData::decl(),
        services::services::ui_preview::FrontendConfig::decl(),
        services::services::ui_preview::ComponentConfig::decl(),
        services::services::ui_preview::FieldOptions::decl(),
        services::services::ui_preview::FieldOption::decl(),
        services::services::ui_preview::Styling::decl(),
        services::services::ui_preview::UiPreview::decl(),
        services::services::logic_pages::LogicPageWithInputs::decl(),
        services::services::webhook::PreviewWebhookRequest::decl(),
        services::services::webhook::RenderedWebhook::decl(),
        services::services::oauth::AuthorizeQuery::decl(),
        services::services::oauth::AuthorizeUrl::decl(),
        services::services::oauth::OAuthConnectionView::decl(),
        services::services::oauth::AccessToken::decl(),
        services::services::telegram::TelegramBotView::decl(),
        services::services::telegram::NotificationDecision::decl(),
        server::routes::logic_pages::UpdateLogicPageStatus::decl(),
        server::routes::ai::UsageReport::decl(),
    ]
}

fn render() -> String {
    let mut out = String::from(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit.\n\n",
    );
    for decl in declarations() {
        out.push_str("export ");
        out.push_str(&decl);
        out.push_str("\n\n");
    }
    out.push_str("export type NotificationSettings = { [event: string]: EventNotification };\n");
    out
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let rendered = render();

    if cli.check {
        let current = std::fs::read_to_string(&cli.output)
            .with_context(|| format!("Failed to read {}", cli.output.display()))?;
        if current != rendered {
            anyhow::bail!(
                "{} is out of date; run generate_types to refresh it",
                cli.output.display()
            );
        }
        println!("{} is up to date", cli.output.display());
        return Ok(());
    }

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&cli.output, rendered)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    println!("Wrote {}", cli.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_api_types() {
        let rendered = render();
        assert!(rendered.contains("type GeneratedReservedPage"));
        assert!(rendered.contains("type UiPreview"));
        assert!(rendered.contains("export type LogicPageStatus"));
    }
}
