// Discord side of nickname enforcement: member events, the serenity-backed
// gateway and the background monitor task.

use crate::core::coordination::ShutdownSignal;
use crate::core::nicknames::{GuildGateway, MemberSnapshot, NicknameError};
use crate::discord::Data;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// `GuildGateway` over serenity's HTTP client and cache.
pub struct SerenityGuildGateway {
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
}

impl SerenityGuildGateway {
    pub fn new(ctx: &serenity::Context) -> Self {
        Self {
            http: ctx.http.clone(),
            cache: ctx.cache.clone(),
        }
    }
}

#[async_trait]
impl GuildGateway for SerenityGuildGateway {
    fn guild_ids(&self) -> Vec<u64> {
        self.cache.guilds().iter().map(|g| g.get()).collect()
    }

    fn can_manage_nicknames(&self, guild_id: u64) -> bool {
        let bot_id = self.cache.current_user().id;
        let Some(guild) = self.cache.guild(serenity::GuildId::new(guild_id)) else {
            return true;
        };
        let Some(me) = guild.members.get(&bot_id) else {
            return true;
        };

        guild
            .member_permissions(me)
            .contains(serenity::Permissions::MANAGE_NICKNAMES)
    }

    async fn display_name(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<String>, NicknameError> {
        let guild_id = serenity::GuildId::new(guild_id);
        let user_id = serenity::UserId::new(user_id);

        let cached = self.cache.guild(guild_id).and_then(|guild| {
            let name = guild
                .members
                .get(&user_id)
                .map(|m| m.display_name().to_string());
            name
        });
        if cached.is_some() {
            return Ok(cached);
        }

        match self.http.get_member(guild_id, user_id).await {
            Ok(member) => Ok(Some(member.display_name().to_string())),
            Err(serenity::Error::Http(e)) if e.status_code().map(|s| s.as_u16()) == Some(404) => {
                Ok(None)
            }
            Err(e) => Err(NicknameError::Gateway(e.to_string())),
        }
    }

    async fn set_nickname(
        &self,
        guild_id: u64,
        user_id: u64,
        nickname: &str,
    ) -> Result<(), NicknameError> {
        serenity::GuildId::new(guild_id)
            .edit_member(
                &*self.http,
                serenity::UserId::new(user_id),
                serenity::EditMember::new().nickname(nickname),
            )
            .await
            .map(|_| ())
            .map_err(|e| NicknameError::Gateway(e.to_string()))
    }
}

/// Build the enforcer's view of a member from the pieces member events carry.
fn snapshot(
    guild_id: serenity::GuildId,
    user: &serenity::User,
    nick: Option<&str>,
    roles: &[serenity::RoleId],
    allow_listed_roles: &[u64],
) -> MemberSnapshot {
    let display_name = nick
        .or(user.global_name.as_deref())
        .unwrap_or(&user.name)
        .to_string();

    MemberSnapshot {
        guild_id: guild_id.get(),
        user_id: user.id.get(),
        username: user.name.clone(),
        display_name,
        allow_listed: user.bot || roles.iter().any(|r| allow_listed_roles.contains(&r.get())),
    }
}

pub async fn handle_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> anyhow::Result<()> {
    let snapshot = snapshot(
        member.guild_id,
        &member.user,
        member.nick.as_deref(),
        &member.roles,
        &data.config.allow_listed_roles,
    );
    let gateway = SerenityGuildGateway::new(ctx);
    data.nicknames.on_member_changed(&gateway, &snapshot).await;
    Ok(())
}

pub async fn handle_member_update(
    ctx: &serenity::Context,
    data: &Data,
    event: &serenity::GuildMemberUpdateEvent,
) -> anyhow::Result<()> {
    let snapshot = snapshot(
        event.guild_id,
        &event.user,
        event.nick.as_deref(),
        &event.roles,
        &data.config.allow_listed_roles,
    );
    let gateway = SerenityGuildGateway::new(ctx);
    data.nicknames.on_member_changed(&gateway, &snapshot).await;
    Ok(())
}

/// Start the periodic sweep. It stops when `shutdown` fires.
pub fn spawn_monitor(
    ctx: &serenity::Context,
    data: &Data,
    shutdown: ShutdownSignal,
) -> tokio::task::JoinHandle<()> {
    let gateway = SerenityGuildGateway::new(ctx);
    let enforcer = Arc::clone(&data.nicknames);
    let lock = data.audit_lock.clone();

    tokio::spawn(async move {
        enforcer.run_monitor(&gateway, &lock, shutdown).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, global_name: Option<&str>, bot: bool) -> serenity::User {
        let mut user = serenity::User::default();
        user.id = serenity::UserId::new(10);
        user.name = name.to_string();
        user.global_name = global_name.map(String::from);
        user.bot = bot;
        user
    }

    #[test]
    fn test_display_name_prefers_nick_then_global_name() {
        let guild = serenity::GuildId::new(1);

        let s = snapshot(guild, &user("kot", Some("Kot"), false), Some("Mr Kot"), &[], &[]);
        assert_eq!(s.display_name, "Mr Kot");

        let s = snapshot(guild, &user("kot", Some("Kot"), false), None, &[], &[]);
        assert_eq!(s.display_name, "Kot");

        let s = snapshot(guild, &user("kot", None, false), None, &[], &[]);
        assert_eq!(s.display_name, "kot");
    }

    #[test]
    fn test_allow_list_by_role_or_bot() {
        let guild = serenity::GuildId::new(1);
        let roles = [serenity::RoleId::new(5), serenity::RoleId::new(7)];

        assert!(snapshot(guild, &user("kot", None, false), None, &roles, &[7]).allow_listed);
        assert!(!snapshot(guild, &user("kot", None, false), None, &roles, &[8]).allow_listed);
        assert!(snapshot(guild, &user("robot", None, true), None, &[], &[]).allow_listed);
    }
}
