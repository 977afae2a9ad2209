//! Inserts demo rows. Running a command twice leaves existing rows untouched.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use db::{
    DBService,
    models::{
        integration::{CreateIntegration, Integration},
        logic_page::{CreateLogicPage, InputField, LogicPage, LogicPageStatus},
        oauth::{CreateOAuthService, OAuthService},
        page::{AccessLevel, CreatePage, Page},
        telegram_bot::{
            CreateTelegramBot, EventNotification, NotificationSettings, NotificationTiming,
            TelegramBot,
        },
    },
};
use sqlx::SqlitePool;
use tracing::info;
use utils::{assets::database_path, logging::init_tracing};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "seed", version, about = "Insert demo data into the SaaS builder database")]
struct Cli {
    /// SQLite file to seed; defaults to the configured data directory
    #[arg(long, env = "DATABASE_PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// A demo page and a demo logic page
    ExamplePage,
    /// An OAuth service, a webhook, a Telegram bot and a published logic page
    LiveTest,
}

fn field(name: &str, label: &str, field_type: &str) -> InputField {
    InputField {
        name: name.to_string(),
        label: label.to_string(),
        field_type: field_type.to_string(),
        required: true,
        placeholder: None,
        options: None,
    }
}

async fn ensure_logic_page(
    pool: &SqlitePool,
    data: CreateLogicPage,
) -> anyhow::Result<LogicPage> {
    if let Some(existing) = LogicPage::find_by_slug(pool, &data.slug).await? {
        info!(slug = %existing.slug, "Logic page already present");
        return Ok(existing);
    }
    let page = LogicPage::create(pool, &data, Uuid::new_v4()).await?;
    info!(slug = %page.slug, "Logic page created");
    Ok(page)
}

async fn seed_example_page(pool: &SqlitePool) -> anyhow::Result<()> {
    if Page::find_by_slug(pool, "example").await?.is_none() {
        Page::create(
            pool,
            &CreatePage {
                slug: "example".to_string(),
                title: "Example Page".to_string(),
                html_content: Some(
                    "<section class=\"p-8\"><h1 class=\"text-3xl font-bold\">Example Page</h1>\
                     <p>Edit this page from the admin panel or regenerate it with AI.</p></section>"
                        .to_string(),
                ),
                css_content: None,
                js_content: None,
                is_published: Some(true),
                access_level: Some(AccessLevel::Public),
            },
            Uuid::new_v4(),
        )
        .await?;
        info!(slug = "example", "Page created");
    } else {
        info!(slug = "example", "Page already present");
    }

    ensure_logic_page(
        pool,
        CreateLogicPage {
            title: "BMI Calculator".to_string(),
            slug: "bmi-calculator".to_string(),
            description: Some("Body mass index from height and weight".to_string()),
            inputs: vec![
                field("height", "Height (cm)", "number"),
                field("weight", "Weight (kg)", "number"),
            ],
            backend_code: Some(
                "function calculateBmi({ height, weight }) {\n  const m = height / 100;\n  \
                 return { bmi: +(weight / (m * m)).toFixed(1) };\n}"
                    .to_string(),
            ),
            frontend_html: None,
            frontend_css: None,
            frontend_js: None,
        },
    )
    .await?;
    Ok(())
}

async fn seed_live_test(pool: &SqlitePool) -> anyhow::Result<()> {
    if OAuthService::find_by_name(pool, "google-demo").await?.is_none() {
        OAuthService::create(
            pool,
            &CreateOAuthService {
                name: "google-demo".to_string(),
                display_name: "Google (demo)".to_string(),
                authorization_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                userinfo_url: Some("https://openidconnect.googleapis.com/v1/userinfo".to_string()),
                scopes: vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
                client_id: "demo-client-id".to_string(),
                client_secret: "demo-client-secret".to_string(),
                enabled: Some(true),
            },
            Uuid::new_v4(),
        )
        .await?;
        info!(name = "google-demo", "OAuth service created");
    }

    if Integration::find_by_name(pool, "demo-webhook").await?.is_none() {
        let mut headers = serde_json::Map::new();
        headers.insert("Content-Type".to_string(), "application/json".into());
        headers.insert("X-Event".to_string(), "{{event}}".into());
        Integration::create(
            pool,
            &CreateIntegration {
                name: "demo-webhook".to_string(),
                url: "https://httpbin.org/post".to_string(),
                method: Some("POST".to_string()),
                headers,
                body_template: Some(
                    r#"{"event": "{{event}}", "email": "{{user.email}}"}"#.to_string(),
                ),
                trigger_events: vec!["user.signup".to_string(), "subscription.created".to_string()],
                enabled: Some(true),
            },
            Uuid::new_v4(),
        )
        .await?;
        info!(name = "demo-webhook", "Integration created");
    }

    if TelegramBot::find_by_name(pool, "demo-bot").await?.is_none() {
        let mut settings = NotificationSettings::new();
        settings.insert(
            "user.signup".to_string(),
            EventNotification {
                enabled: true,
                timing: NotificationTiming::Immediate,
                template: Some("New signup: {{email}}".to_string()),
            },
        );
        settings.insert(
            "subscription.created".to_string(),
            EventNotification {
                enabled: true,
                timing: NotificationTiming::Daily,
                template: None,
            },
        );
        TelegramBot::create(
            pool,
            &CreateTelegramBot {
                name: "demo-bot".to_string(),
                bot_token: "000000:demo-token".to_string(),
                chat_id: "0".to_string(),
                enabled: Some(false),
                notification_settings: settings,
            },
            Uuid::new_v4(),
        )
        .await?;
        info!(name = "demo-bot", "Telegram bot created");
    }

    let page = ensure_logic_page(
        pool,
        CreateLogicPage {
            title: "Live Test Tool".to_string(),
            slug: "live-test-tool".to_string(),
            description: Some("Echoes its input; used to check the publish flow".to_string()),
            inputs: vec![field("message", "Message", "text")],
            backend_code: Some(
                "function echo({ message }) {\n  return { message };\n}".to_string(),
            ),
            frontend_html: None,
            frontend_css: None,
            frontend_js: None,
        },
    )
    .await?;
    if page.status != LogicPageStatus::Published {
        LogicPage::update_status(pool, page.id, LogicPageStatus::Published).await?;
        info!(slug = %page.slug, "Logic page published");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info");
    let cli = Cli::parse();

    let path = cli.database.unwrap_or_else(database_path);
    let db = DBService::new(&path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    match cli.command {
        Command::ExamplePage => seed_example_page(&db.pool).await?,
        Command::LiveTest => seed_live_test(&db.pool).await?,
    }
    info!(database = %path.display(), "Seeding complete");
    Ok(())
}
