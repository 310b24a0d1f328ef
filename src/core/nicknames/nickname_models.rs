// Nickname enforcement domain models and ports.
//
// These are pure domain types with no Discord dependencies.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NicknameError {
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Discord error: {0}")]
    Gateway(String),
}

/// Administratively mandated display name for a guild member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedNickname {
    pub guild_id: u64,
    pub user_id: u64,
    pub nickname: String,
}

/// What the enforcer needs to know about a member that just changed.
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub guild_id: u64,
    pub user_id: u64,
    pub username: String,
    pub display_name: String,
    /// Exempt from enforcement (moderators, bots, ...).
    pub allow_listed: bool,
}

/// Result of checking a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforceOutcome {
    AllowListed,
    NoPermission,
    NoRecord,
    AlreadyCorrect,
    Renamed,
}

/// Counters for one full sweep over all guilds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub guilds_checked: usize,
    pub renamed: usize,
    pub failed: usize,
    pub members_missing: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The audit lock was held elsewhere; nothing was checked this cycle.
    Skipped,
    Completed(SweepReport),
}

#[derive(Debug, Clone)]
pub struct NicknameConfig {
    /// Delay between periodic sweeps.
    pub recheck_interval: Duration,
    /// Whether rename failures during a sweep are logged. The event-driven
    /// path always logs them.
    pub log_sweep_failures: bool,
}

impl Default for NicknameConfig {
    fn default() -> Self {
        Self {
            recheck_interval: Duration::from_secs(3 * 60 * 60),
            log_sweep_failures: true,
        }
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// Read access to persisted forced nicknames.
#[async_trait]
pub trait ForcedNicknameStore: Send + Sync {
    async fn get_forced_nickname(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<ForcedNickname>, NicknameError>;

    async fn list_for_guild(&self, guild_id: u64) -> Result<Vec<ForcedNickname>, NicknameError>;
}

/// Chat platform operations the enforcer needs.
#[async_trait]
pub trait GuildGateway: Send + Sync {
    /// All guilds the bot currently knows about.
    fn guild_ids(&self) -> Vec<u64>;

    /// Whether the bot may rename members in this guild. Unknown counts as yes.
    fn can_manage_nicknames(&self, guild_id: u64) -> bool;

    /// Current display name of a member, `None` if they are not in the guild.
    async fn display_name(&self, guild_id: u64, user_id: u64)
        -> Result<Option<String>, NicknameError>;

    async fn set_nickname(
        &self,
        guild_id: u64,
        user_id: u64,
        nickname: &str,
    ) -> Result<(), NicknameError>;
}
