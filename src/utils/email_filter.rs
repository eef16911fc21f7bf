use autoscale_cuckoo_filter::CuckooFilter;
use std::sync::{PoisonError, RwLock};

/// Expected capacity and false-positive rate.
/// Tune these based on real headcount.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Probabilistic set of registered emails (false positives possible, no false negatives).
pub struct EmailFilter {
    inner: RwLock<CuckooFilter<String>>,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self {
            inner: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }
}

impl EmailFilter {
    pub fn might_exist(&self, email: &str) -> bool {
        let email = normalize(email);
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&email)
    }

    pub fn insert(&self, email: &str) {
        let email = normalize(email);
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&email);
    }

    /// Only remove emails that were inserted, or unrelated entries may vanish.
    pub fn remove(&self, email: &str) {
        let email = normalize(email);
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&email);
    }

    /// Insert a batch of emails under one write lock
    pub fn insert_batch(&self, emails: &[String]) {
        let mut filter = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for email in emails {
            filter.add(&normalize(email));
        }
    }
}
