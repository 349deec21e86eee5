use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct EndpointRateLimiter {
    state: Arc<Mutex<HashMap<String, RateWindow>>>,
    window: Duration,
    sync_limit: u32,
    recognition_limit: u32,
    metrics: Arc<RateLimitMetrics>,
}

#[derive(Clone, Copy)]
pub enum ProtectedEndpoint {
    AttendanceSync,
    Recognition,
}

#[derive(Default)]
struct RateLimitMetrics {
    sync_allowed: AtomicU64,
    sync_limited: AtomicU64,
    recognition_allowed: AtomicU64,
    recognition_limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub sync_allowed: u64,
    pub sync_limited: u64,
    pub recognition_allowed: u64,
    pub recognition_limited: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

impl EndpointRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            window: config.rate_limit_window,
            sync_limit: config.sync_rate_limit_per_window,
            recognition_limit: config.recognition_rate_limit_per_window,
            metrics: Arc::new(RateLimitMetrics::default()),
        }
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, faculty_id: &str) -> Result<(), AppError> {
        let limit = match endpoint {
            ProtectedEndpoint::AttendanceSync => self.sync_limit,
            ProtectedEndpoint::Recognition => self.recognition_limit,
        };

        let key = format!("{}:{faculty_id}", endpoint.label());
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        let entry = guard.entry(key).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(entry.started_at))
                .as_secs();
            self.mark_limited(endpoint);
            tracing::warn!(
                endpoint = endpoint.label(),
                faculty = faculty_fingerprint(faculty_id),
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(AppError::too_many_requests(
                "Rate limit exceeded for protected endpoint",
                retry_after_secs,
            ));
        }

        entry.count += 1;
        self.mark_allowed(endpoint);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            sync_allowed: self.metrics.sync_allowed.load(Ordering::Relaxed),
            sync_limited: self.metrics.sync_limited.load(Ordering::Relaxed),
            recognition_allowed: self.metrics.recognition_allowed.load(Ordering::Relaxed),
            recognition_limited: self.metrics.recognition_limited.load(Ordering::Relaxed),
        }
    }

    fn mark_allowed(&self, endpoint: ProtectedEndpoint) {
        match endpoint {
            ProtectedEndpoint::AttendanceSync => {
                self.metrics.sync_allowed.fetch_add(1, Ordering::Relaxed);
            }
            ProtectedEndpoint::Recognition => {
                self.metrics
                    .recognition_allowed
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn mark_limited(&self, endpoint: ProtectedEndpoint) {
        match endpoint {
            ProtectedEndpoint::AttendanceSync => {
                self.metrics.sync_limited.fetch_add(1, Ordering::Relaxed);
            }
            ProtectedEndpoint::Recognition => {
                self.metrics
                    .recognition_limited
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AttendanceSync => "attendance_sync",
            Self::Recognition => "recognition",
        }
    }
}

fn faculty_fingerprint(faculty_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    faculty_id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_blocks_after_limit() {
        let limiter = EndpointRateLimiter {
            state: Arc::new(Mutex::new(HashMap::new())),
            window: Duration::from_secs(60),
            sync_limit: 2,
            recognition_limit: 2,
            metrics: Arc::new(RateLimitMetrics::default()),
        };

        limiter
            .check(ProtectedEndpoint::AttendanceSync, "faculty-a")
            .await
            .unwrap();
        limiter
            .check(ProtectedEndpoint::AttendanceSync, "faculty-a")
            .await
            .unwrap();

        let err = limiter
            .check(ProtectedEndpoint::AttendanceSync, "faculty-a")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests(_, _)));

        let metrics = limiter.metrics_snapshot();
        assert_eq!(metrics.sync_allowed, 2);
        assert_eq!(metrics.sync_limited, 1);
    }

    #[tokio::test]
    async fn rate_limiter_isolates_faculty_keys() {
        let limiter = EndpointRateLimiter {
            state: Arc::new(Mutex::new(HashMap::new())),
            window: Duration::from_secs(60),
            sync_limit: 1,
            recognition_limit: 1,
            metrics: Arc::new(RateLimitMetrics::default()),
        };

        limiter
            .check(ProtectedEndpoint::AttendanceSync, "faculty-a")
            .await
            .unwrap();
        // A different faculty member gets their own window
        limiter
            .check(ProtectedEndpoint::AttendanceSync, "faculty-b")
            .await
            .unwrap();
    }
}
