// Forced nickname slash commands for moderators.

use crate::core::nicknames::SweepOutcome;
use crate::discord::nicknames::nickname_monitor::SerenityGuildGateway;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Forced nickname commands.
#[poise::command(
    slash_command,
    subcommands("recheck", "list"),
    required_permissions = "MANAGE_NICKNAMES",
    guild_only
)]
pub async fn nicknames(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Enforce all forced nicknames right now instead of waiting for the next sweep.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_NICKNAMES")]
pub async fn recheck(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let gateway = SerenityGuildGateway::new(ctx.serenity_context());
    let data = ctx.data();
    let message = match data.nicknames.sweep(&gateway, &data.audit_lock).await {
        SweepOutcome::Skipped => {
            "⏳ An audit is running right now, try again in a bit.".to_string()
        }
        SweepOutcome::Completed(report) => {
            let mut message = format!(
                "✅ Checked {} server(s), renamed {} member(s).",
                report.guilds_checked, report.renamed
            );
            if report.failed > 0 {
                message.push_str(&format!("\n⚠️ {} rename(s) failed.", report.failed));
            }
            if report.members_missing > 0 {
                message.push_str(&format!(
                    "\n{} member(s) with a forced nickname are no longer here.",
                    report.members_missing
                ));
            }
            message
        }
    };

    ctx.send(poise::CreateReply::default().content(message).ephemeral(true))
        .await?;
    Ok(())
}

/// Show the forced nicknames for this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_NICKNAMES")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let records = ctx
        .data()
        .nicknames
        .forced_nicknames(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    let description = if records.is_empty() {
        "No forced nicknames in this server.".to_string()
    } else {
        records
            .iter()
            .take(50)
            .map(|r| format!("<@{}> → `{}`", r.user_id, r.nickname))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("📛 Forced Nicknames")
        .description(description)
        .color(0x5865F2)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{} record(s)",
            records.len()
        )));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
