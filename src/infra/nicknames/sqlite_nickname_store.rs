// SQLite-backed forced nickname records. Read-only from the bot's side;
// moderators manage the table.
//
// Tables:
// - forced_nicknames: (guild_id, user_id) -> nickname

use crate::core::nicknames::{ForcedNickname, ForcedNicknameStore, NicknameError};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteNicknameStore {
    pool: Pool<Sqlite>,
}

impl SqliteNicknameStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forced_nicknames (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                nickname TEXT NOT NULL,
                PRIMARY KEY (guild_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn map_row(row: &SqliteRow) -> ForcedNickname {
        ForcedNickname {
            guild_id: row.get::<i64, _>("guild_id") as u64,
            user_id: row.get::<i64, _>("user_id") as u64,
            nickname: row.get("nickname"),
        }
    }
}

#[async_trait]
impl ForcedNicknameStore for SqliteNicknameStore {
    async fn get_forced_nickname(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<ForcedNickname>, NicknameError> {
        let row = sqlx::query(
            "SELECT guild_id, user_id, nickname FROM forced_nicknames WHERE guild_id = ? AND user_id = ?",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| NicknameError::StorageError(e.to_string()))?;

        Ok(row.as_ref().map(Self::map_row))
    }

    async fn list_for_guild(&self, guild_id: u64) -> Result<Vec<ForcedNickname>, NicknameError> {
        let rows = sqlx::query(
            r#"
            SELECT guild_id, user_id, nickname
            FROM forced_nicknames
            WHERE guild_id = ?
            ORDER BY user_id
            "#,
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NicknameError::StorageError(e.to_string()))?;

        Ok(rows.iter().map(Self::map_row).collect())
    }
}
