// This is the entry point of the compatibility bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases, APIs)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands, event handlers and background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::compat::CompatService;
use crate::core::coordination::{AuditLock, Shutdown};
use crate::core::nicknames::NicknameEnforcer;
use crate::discord::compat::product_code_handler;
use crate::discord::nicknames::nickname_monitor;
use crate::discord::{Data, Error};
use crate::infra::compat::{CompatApiClient, SqliteThumbnailStore};
use crate::infra::nicknames::SqliteNicknameStore;
use poise::serenity_prelude as serenity;
use std::path::Path;
use std::sync::Arc;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = product_code_handler::handle_message(ctx, new_message, data).await {
                tracing::error!("Error handling product code lookup: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = nickname_monitor::handle_member_join(ctx, data, new_member).await {
                tracing::error!("Error enforcing nickname on join: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberUpdate { event, .. } => {
            if let Err(e) = nickname_monitor::handle_member_update(ctx, data, event).await {
                tracing::error!("Error enforcing nickname on update: {}", e);
            }
        }

        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    let config = Arc::new(BotConfig::from_env());

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    if let Some(parent) = Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent).expect("Failed to create data directory for SQLite files");
    }
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", config.database_path))
        .await
        .expect("Failed to connect to bot DB");

    let thumbnail_store = SqliteThumbnailStore::new(pool.clone());
    thumbnail_store
        .migrate()
        .await
        .expect("Failed to migrate thumbnail table");
    let nickname_store = SqliteNicknameStore::new(pool);
    nickname_store
        .migrate()
        .await
        .expect("Failed to migrate forced nickname table");

    let compat_client = CompatApiClient::new(&config.compat_api_url, config.compat_api_timeout)
        .expect("Failed to create compatibility API client");
    let compat_service = Arc::new(CompatService::new(
        compat_client,
        thumbnail_store,
        config.lookup.clone(),
        config.content_override.clone(),
    ));
    let nickname_enforcer = Arc::new(NicknameEnforcer::new(
        nickname_store,
        config.nicknames.clone(),
    ));

    // One sweep at a time, whether from the monitor or `/nicknames recheck`.
    let audit_lock = AuditLock::new();
    let shutdown = Arc::new(Shutdown::new());

    // Create the data structure that will be shared across all commands
    let data = Data {
        compat: compat_service,
        nicknames: nickname_enforcer,
        audit_lock,
        config: Arc::clone(&config),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_EMOJIS_AND_STICKERS;

    let monitor_signal = shutdown.signal();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                discord::commands::compat::compat(),
                discord::commands::nicknames::nicknames(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".into()),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                // Background nickname monitor. Runs until shutdown.
                nickname_monitor::spawn_monitor(ctx, &data, monitor_signal);

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    // Ctrl-C stops the monitor and the gateway connection.
    let shard_manager = client.shard_manager.clone();
    let ctrl_c_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Shutting down");
        ctrl_c_shutdown.trigger();
        shard_manager.shutdown_all().await;
    });

    if let Err(e) = client.start().await {
        tracing::error!("Client error: {}", e);
    }
    shutdown.trigger();
}
