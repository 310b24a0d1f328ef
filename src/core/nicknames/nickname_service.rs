// Nickname enforcement service.
//
// Two entry points share the same comparison:
// - member events check one member right away
// - the monitor sweeps every stored record periodically, but only while it
//   can grab the audit lock without waiting

use super::nickname_models::{
    EnforceOutcome, ForcedNickname, ForcedNicknameStore, GuildGateway, MemberSnapshot,
    NicknameConfig, NicknameError, SweepOutcome, SweepReport,
};
use crate::core::coordination::{AuditLock, ShutdownSignal};

pub struct NicknameEnforcer<S: ForcedNicknameStore> {
    store: S,
    config: NicknameConfig,
}

impl<S: ForcedNicknameStore> NicknameEnforcer<S> {
    pub fn new(store: S, config: NicknameConfig) -> Self {
        Self { store, config }
    }

    /// Stored records for one guild, for moderators to review.
    pub async fn forced_nicknames(
        &self,
        guild_id: u64,
    ) -> Result<Vec<ForcedNickname>, NicknameError> {
        self.store.list_for_guild(guild_id).await
    }

    /// Check a single member and rename them if their display name drifted.
    pub async fn enforce_member(
        &self,
        gateway: &dyn GuildGateway,
        member: &MemberSnapshot,
    ) -> Result<EnforceOutcome, NicknameError> {
        if member.allow_listed {
            return Ok(EnforceOutcome::AllowListed);
        }

        if !gateway.can_manage_nicknames(member.guild_id) {
            return Ok(EnforceOutcome::NoPermission);
        }

        let Some(forced) = self
            .store
            .get_forced_nickname(member.guild_id, member.user_id)
            .await?
        else {
            return Ok(EnforceOutcome::NoRecord);
        };

        if member.display_name == forced.nickname {
            return Ok(EnforceOutcome::AlreadyCorrect);
        }

        gateway
            .set_nickname(member.guild_id, member.user_id, &forced.nickname)
            .await?;
        tracing::info!(
            guild_id = member.guild_id,
            user_id = member.user_id,
            username = %member.username,
            nickname = %forced.nickname,
            "Enforced nickname"
        );
        Ok(EnforceOutcome::Renamed)
    }

    /// Event-driven path: failures are logged, never returned.
    pub async fn on_member_changed(
        &self,
        gateway: &dyn GuildGateway,
        member: &MemberSnapshot,
    ) -> Option<EnforceOutcome> {
        match self.enforce_member(gateway, member).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(
                    guild_id = member.guild_id,
                    user_id = member.user_id,
                    error = %e,
                    "Failed to enforce nickname"
                );
                None
            }
        }
    }

    /// One pass over every guild and every stored record.
    pub async fn sweep(&self, gateway: &dyn GuildGateway, lock: &AuditLock) -> SweepOutcome {
        let Some(_guard) = lock.try_acquire() else {
            tracing::debug!("Audit in progress, skipping nickname sweep");
            return SweepOutcome::Skipped;
        };

        let mut report = SweepReport::default();
        for guild_id in gateway.guild_ids() {
            if !gateway.can_manage_nicknames(guild_id) {
                continue;
            }

            if let Err(e) = self.sweep_guild(gateway, guild_id, &mut report).await {
                tracing::error!(guild_id, error = %e, "Nickname sweep failed for guild");
            }
        }

        SweepOutcome::Completed(report)
    }

    async fn sweep_guild(
        &self,
        gateway: &dyn GuildGateway,
        guild_id: u64,
        report: &mut SweepReport,
    ) -> Result<(), NicknameError> {
        let records = self.store.list_for_guild(guild_id).await?;
        if records.is_empty() {
            return Ok(());
        }
        report.guilds_checked += 1;

        for forced in records {
            let display_name = match gateway.display_name(guild_id, forced.user_id).await {
                Ok(Some(name)) => name,
                Ok(None) => {
                    report.members_missing += 1;
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    if self.config.log_sweep_failures {
                        tracing::warn!(
                            guild_id,
                            user_id = forced.user_id,
                            error = %e,
                            "Failed to fetch member for nickname check"
                        );
                    }
                    continue;
                }
            };

            if display_name == forced.nickname {
                continue;
            }

            match gateway
                .set_nickname(guild_id, forced.user_id, &forced.nickname)
                .await
            {
                Ok(()) => {
                    report.renamed += 1;
                    tracing::info!(
                        guild_id,
                        user_id = forced.user_id,
                        nickname = %forced.nickname,
                        "Enforced nickname"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    if self.config.log_sweep_failures {
                        tracing::warn!(
                            guild_id,
                            user_id = forced.user_id,
                            error = %e,
                            "Failed to enforce nickname"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Periodic monitor. Waits one interval, sweeps, and repeats until shutdown.
    pub async fn run_monitor(
        &self,
        gateway: &dyn GuildGateway,
        lock: &AuditLock,
        mut shutdown: ShutdownSignal,
    ) {
        tracing::info!(
            interval_secs = self.config.recheck_interval.as_secs(),
            "Nickname monitor started"
        );

        while shutdown.sleep(self.config.recheck_interval).await {
            match self.sweep(gateway, lock).await {
                SweepOutcome::Completed(report) => {
                    tracing::debug!(
                        guilds = report.guilds_checked,
                        renamed = report.renamed,
                        failed = report.failed,
                        "Nickname sweep completed"
                    );
                }
                SweepOutcome::Skipped => {}
            }
        }

        tracing::info!("Nickname monitor stopped");
    }
}

// ============================================================================
// TESTS
// ============================================================================
