// Discord-specific product code handling - finds codes in chat messages and
// hands them to the core pipeline with a Discord-backed reply sink.

use crate::config::BotConfig;
use crate::core::compat::{
    extract_codes, select_codes, DisplayResult, ReplyError, ReplyOrigin, ReplySink,
};
use crate::discord::compat::embeds::build_result_embed;
use crate::discord::Data;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

const PLEASE_WAIT: char = '⏳';
const OVERRIDE_EMOJI_NAME: &str = "sqvat";
const OVERRIDE_FALLBACK: char = '❌';

/// Look up any product codes mentioned in `msg` and post the results.
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> anyhow::Result<()> {
    if msg.author.bot {
        return Ok(());
    }

    let codes = extract_codes(&msg.content);
    if codes.is_empty() {
        return Ok(());
    }

    let is_private = msg.guild_id.is_none();
    let previous = previous_replies(ctx, msg, &data.config).await;
    let codes = select_codes(codes, &previous, is_private, data.config.code_limits);
    if codes.is_empty() {
        return Ok(());
    }

    let origin = ReplyOrigin {
        author_id: msg.author.id.get(),
        is_private,
    };
    let sink = Arc::new(MessageReplySink::new(ctx, msg));
    let report = data.compat.lookup_and_reply(&codes, origin, sink).await;

    tracing::debug!(
        channel_id = msg.channel_id.get(),
        requested = codes.len(),
        delivered = report.delivered,
        "Product code lookup finished"
    );
    Ok(())
}

/// Text of the bot's own recent replies in the channel, so we don't answer the
/// same code twice in a row.
async fn previous_replies(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    config: &BotConfig,
) -> String {
    let bot_id = ctx.cache.current_user().id;
    let history = match msg
        .channel_id
        .messages(
            ctx,
            serenity::GetMessages::new()
                .before(msg.id)
                .limit(config.history_throttle),
        )
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!("Failed to fetch message history: {}", e);
            return String::new();
        }
    };

    let cutoff = chrono::Utc::now().timestamp() - config.history_window.as_secs() as i64;
    let mut previous = String::new();
    for earlier in history
        .iter()
        .filter(|m| m.author.id == bot_id && m.timestamp.unix_timestamp() >= cutoff)
    {
        previous.push_str(&earlier.content);
        previous.push('\n');
        for embed in &earlier.embeds {
            for text in [&embed.title, &embed.description].into_iter().flatten() {
                previous.push_str(text);
                previous.push('\n');
            }
        }
    }
    previous
}

/// Reply sink bound to the message that triggered the lookup.
pub struct MessageReplySink {
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
    channel_id: serenity::ChannelId,
    message_id: serenity::MessageId,
    guild_id: Option<serenity::GuildId>,
}

impl MessageReplySink {
    pub fn new(ctx: &serenity::Context, msg: &serenity::Message) -> Self {
        Self {
            http: ctx.http.clone(),
            cache: ctx.cache.clone(),
            channel_id: msg.channel_id,
            message_id: msg.id,
            guild_id: msg.guild_id,
        }
    }

    /// Custom emoji by name from the guild, or the fallback.
    fn override_reaction(&self) -> serenity::ReactionType {
        self.guild_id
            .and_then(|guild_id| {
                let guild = self.cache.guild(guild_id)?;
                let emoji = guild
                    .emojis
                    .values()
                    .find(|e| e.name == OVERRIDE_EMOJI_NAME)
                    .cloned();
                emoji
            })
            .map(serenity::ReactionType::from)
            .unwrap_or_else(|| serenity::ReactionType::from(OVERRIDE_FALLBACK))
    }
}

#[async_trait]
impl ReplySink for MessageReplySink {
    async fn mark_working(&self) -> Result<(), ReplyError> {
        self.channel_id
            .create_reaction(&*self.http, self.message_id, PLEASE_WAIT)
            .await
            .map_err(|e| ReplyError(e.to_string()))
    }

    async fn clear_working(&self) -> Result<(), ReplyError> {
        self.channel_id
            .delete_reaction(&*self.http, self.message_id, None, PLEASE_WAIT)
            .await
            .map_err(|e| ReplyError(e.to_string()))
    }

    async fn flag_override(&self) -> Result<(), ReplyError> {
        let reaction = self.override_reaction();
        self.channel_id
            .create_reaction(&*self.http, self.message_id, reaction)
            .await
            .map_err(|e| ReplyError(e.to_string()))
    }

    async fn send_result(&self, result: &DisplayResult) -> Result<(), ReplyError> {
        self.channel_id
            .send_message(
                &*self.http,
                serenity::CreateMessage::new().embed(build_result_embed(result)),
            )
            .await
            .map(|_| ())
            .map_err(|e| ReplyError(e.to_string()))
    }
}
