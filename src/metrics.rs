use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-local counters for monitoring. Reset on restart.
#[derive(Clone)]
pub struct Metrics {
    pub users_registered: Arc<AtomicU64>,
    pub posts_created: Arc<AtomicU64>,
    pub comments_created: Arc<AtomicU64>,
    pub follows_created: Arc<AtomicU64>,
    pub follows_removed: Arc<AtomicU64>,
    pub auth_failures: Arc<AtomicU64>,
    pub rate_limited: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            users_registered: Arc::new(AtomicU64::new(0)),
            posts_created: Arc::new(AtomicU64::new(0)),
            comments_created: Arc::new(AtomicU64::new(0)),
            follows_created: Arc::new(AtomicU64::new(0)),
            follows_removed: Arc::new(AtomicU64::new(0)),
            auth_failures: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_users_registered(&self) {
        self.users_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_posts_created(&self) {
        self.posts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_comments_created(&self) {
        self.comments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_follows_created(&self) {
        self.follows_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_follows_removed(&self) {
        self.follows_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            posts_created: self.posts_created.load(Ordering::Relaxed),
            comments_created: self.comments_created.load(Ordering::Relaxed),
            follows_created: self.follows_created.load(Ordering::Relaxed),
            follows_removed: self.follows_removed.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub users_registered: u64,
    pub posts_created: u64,
    pub comments_created: u64,
    pub follows_created: u64,
    pub follows_removed: u64,
    pub auth_failures: u64,
    pub rate_limited: u64,
    pub uptime_seconds: u64,
}
