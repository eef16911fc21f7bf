use moka::future::Cache;
use std::time::Duration;

use super::email_filter::normalize;

/// Emails known to be TAKEN. Absence means "unknown", never "available".
#[derive(Clone)]
pub struct EmailCache {
    inner: Cache<String, ()>,
}

impl Default for EmailCache {
    fn default() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(500_000) // tune based on memory
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }
}

impl EmailCache {
    pub async fn mark_taken(&self, email: &str) {
        self.inner.insert(normalize(email), ()).await;
    }

    pub async fn is_taken(&self, email: &str) -> bool {
        self.inner.get(&normalize(email)).await.is_some()
    }

    pub async fn forget(&self, email: &str) {
        self.inner.invalidate(&normalize(email)).await;
    }

    /// Batch mark emails as taken
    pub async fn batch_mark(&self, emails: &[String]) {
        let futures: Vec<_> = emails
            .iter()
            .map(|e| self.inner.insert(normalize(e), ()))
            .collect();

        // Await all insertions concurrently
        futures::future::join_all(futures).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn remembers_and_forgets() {
        let cache = EmailCache::default();
        assert!(!cache.is_taken("jane@example.com").await);

        cache.mark_taken("JANE@example.com").await;
        assert!(cache.is_taken("jane@example.com").await);

        cache.forget("jane@example.com").await;
        assert!(!cache.is_taken("jane@example.com").await);
    }

    #[actix_web::test]
    async fn batch_marks_everything() {
        let cache = EmailCache::default();
        cache
            .batch_mark(&["a@x.io".to_string(), "b@x.io".to_string()])
            .await;
        assert!(cache.is_taken("a@x.io").await);
        assert!(cache.is_taken("b@x.io").await);
    }
}
