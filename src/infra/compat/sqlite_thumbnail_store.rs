// SQLite-backed thumbnail lookup.
//
// Tables:
// - thumbnails: product code -> cover image URL

use crate::core::compat::{CompatError, ProductCode, ThumbnailSource};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteThumbnailStore {
    pool: Pool<Sqlite>,
}

impl SqliteThumbnailStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS thumbnails (
                product_code TEXT PRIMARY KEY,
                url TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ThumbnailSource for SqliteThumbnailStore {
    async fn thumbnail_url(&self, code: &ProductCode) -> Result<Option<String>, CompatError> {
        let row = sqlx::query("SELECT url FROM thumbnails WHERE product_code = ?")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CompatError::Store(e.to_string()))?;

        Ok(row
            .and_then(|r| r.get::<Option<String>, _>("url"))
            .filter(|url| !url.trim().is_empty()))
    }
}
