// Discord commands for compatibility lookups.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result

use crate::config::BotConfig;
use crate::core::compat::{dedup_by_title, extract_codes, CompatService};
use crate::core::coordination::AuditLock;
use crate::core::nicknames::NicknameEnforcer;
use crate::discord::compat::embeds::build_result_embed;
use crate::infra::compat::{CompatApiClient, SqliteThumbnailStore};
use crate::infra::nicknames::SqliteNicknameStore;
use std::sync::Arc;

// Discord allows at most 10 embeds per message.
const EMBEDS_PER_MESSAGE: usize = 10;

/// Look up compatibility status for one or more product codes.
#[poise::command(slash_command, prefix_command, aliases("c"))]
pub async fn compat(
    ctx: Context<'_>,
    #[description = "Product code(s), e.g. BLES00932, or any text containing them"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    let limit = ctx.data().config.code_limits.private;
    let codes: Vec<_> = extract_codes(&text).into_iter().take(limit).collect();
    if codes.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("No product codes found. They look like `BLES00932` or `NPUB-30123`.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    ctx.defer().await?;
    let results = dedup_by_title(ctx.data().compat.lookup_many(&codes).await);
    if results.is_empty() {
        ctx.say("Couldn't look up any of those codes right now, try again later.")
            .await?;
        return Ok(());
    }

    for chunk in results.chunks(EMBEDS_PER_MESSAGE) {
        let reply = chunk
            .iter()
            .fold(poise::CreateReply::default(), |reply, result| {
                reply.embed(build_result_embed(result))
            });
        ctx.send(reply).await?;
    }

    Ok(())
}

// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub compat: Arc<CompatService<CompatApiClient, SqliteThumbnailStore>>,
    pub nicknames: Arc<NicknameEnforcer<SqliteNicknameStore>>,
    pub audit_lock: AuditLock,
    pub config: Arc<BotConfig>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
