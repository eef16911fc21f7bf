use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use sqlx::SqlitePool;

use super::email_cache::EmailCache;
use super::email_filter::{EmailFilter, normalize};

/// Registered-email lookup: cuckoo filter for fast negatives, cache for fast
/// positives, database as the fallback.
#[derive(Default)]
pub struct EmailIndex {
    filter: EmailFilter,
    cache: EmailCache,
}

impl EmailIndex {
    /// true  => email AVAILABLE
    /// false => email TAKEN
    pub async fn is_available(&self, pool: &SqlitePool, email: &str) -> Result<bool, sqlx::Error> {
        let email = normalize(email);

        // 1️⃣ Cuckoo filter: fast negative
        if !self.filter.might_exist(&email) {
            return Ok(true);
        }

        // 2️⃣ Moka cache: fast positive
        if self.cache.is_taken(&email).await {
            return Ok(false);
        }

        // 3️⃣ Database fallback
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? COLLATE NOCASE LIMIT 1)",
        )
        .bind(&email)
        .fetch_one(pool)
        .await?;

        if exists {
            self.cache.mark_taken(&email).await;
        }

        Ok(!exists)
    }

    pub async fn register(&self, email: &str) {
        self.filter.insert(email);
        self.cache.mark_taken(email).await;
    }

    pub async fn unregister(&self, email: &str) {
        self.filter.remove(email);
        self.cache.forget(email).await;
    }

    /// Load every email into the filter, streamed in batches
    pub async fn warmup_filter(&self, pool: &SqlitePool, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>("SELECT email FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (email,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

            batch.push(email);
            total += 1;

            if batch.len() == batch_size {
                self.filter.insert_batch(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.filter.insert_batch(&batch);
        }

        log::info!("Email filter warmup complete: {} users", total);
        Ok(())
    }

    /// Load only RECENTLY active emails into the cache
    pub async fn warmup_cache(&self, pool: &SqlitePool, days: u32, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT email
            FROM users
            WHERE last_login_at >= datetime('now', 'localtime', '-' || ? || ' days')
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(days as i64)
        .fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (email,) = row?;
            batch.push(email);
            total += 1;

            if batch.len() >= batch_size {
                self.cache.batch_mark(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.cache.batch_mark(&batch).await;
        }

        log::info!(
            "Email cache warmup complete: {} recent users (last {} days)",
            total,
            days
        );
        Ok(())
    }
}
