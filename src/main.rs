// This is the entry point of the moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases, LLM and alert APIs)
// - `discord/` = Discord-specific adapters (slash commands, presence)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::analytics::AnalyticsService;
use crate::core::config::AppConfig;
use crate::core::moderation::ModerationService;
use crate::discord::commands::presence;
use crate::discord::{Data, Error, SharedStore};
use crate::infra::classification::build_classifiers;
use crate::infra::moderation::{InMemoryModerationStore, SqliteModerationStore};
use crate::infra::notifications::build_dispatcher;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().expect(
        "Invalid configuration! Create a .env file with at least DISCORD_TOKEN set.",
    );

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let store: SharedStore = if config.uses_in_memory_store() {
        tracing::warn!("Using the in-memory moderation store; history is lost on restart");
        Arc::new(InMemoryModerationStore::new())
    } else {
        Arc::new(
            SqliteModerationStore::new(&config.database_path)
                .await
                .expect("Failed to initialize SQLite moderation store"),
        )
    };

    let classifiers = build_classifiers(&config.classifiers, config.http_timeout);
    let dispatcher = build_dispatcher(&config.notifications, config.http_timeout);

    let moderation_service = Arc::new(
        ModerationService::new(Arc::clone(&store), classifiers, dispatcher)
            .with_alert_channels(config.alert_channels.clone())
            .with_settle_timeout(config.http_timeout),
    );
    let analytics_service = Arc::new(AnalyticsService::new(Arc::clone(&store)));

    // Create the data structure that will be shared across all commands
    let data = Data {
        moderation: Arc::clone(&moderation_service),
        analytics: Arc::clone(&analytics_service),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Slash commands only, so no privileged intents are needed.

    let intents = serenity::GatewayIntents::GUILDS;

    let framework = poise::Framework::<Data, Error>::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::moderation::moderate()],
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                tracing::info!("Commands registered, bot is ready");
                presence::on_ready(ctx, &data.moderation.provider_names());

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
