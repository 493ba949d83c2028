use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::DomainError;
use crate::store::{self, Store};

pub const NOTIFY_CHANNEL: &str = "staffdesk_complaints";
pub const POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Three submissions up front, then one per minute.
        Self {
            capacity: 3.0,
            refill_per_sec: 1.0 / 60.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Bucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Token bucket persisted per source key. The bucket expires once it would be
/// fully refilled anyway, so idle sources leave nothing behind.
pub async fn allow(
    store: &dyn Store,
    source: &str,
    cfg: &RateLimitConfig,
    now: DateTime<Utc>,
) -> Result<bool> {
    let key = format!("ratelimit/{source}");
    let mut bucket = store::get_json::<Bucket>(store, &key)
        .await?
        .unwrap_or(Bucket {
            tokens: cfg.capacity,
            last_refill: now,
        });

    let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
    bucket.last_refill = now;
    bucket.tokens = (bucket.tokens + elapsed * cfg.refill_per_sec).min(cfg.capacity);

    let allowed = bucket.tokens >= 1.0;
    if allowed {
        bucket.tokens -= 1.0;
    }

    let full_refill_secs = (cfg.capacity / cfg.refill_per_sec).ceil() as i64;
    store::set_json(store, &key, &bucket, Some(Duration::seconds(full_refill_secs))).await?;

    Ok(allowed)
}

/// Anonymous by construction: only category and body are stored, the source
/// key feeds the rate limiter and goes no further.
pub async fn submit(
    pool: &PgPool,
    store: &dyn Store,
    category: &str,
    body: &str,
    source: &str,
) -> Result<Uuid> {
    let cfg = RateLimitConfig::default();
    if !allow(store, source, &cfg, Utc::now()).await? {
        return Err(DomainError::RateLimited {
            source_key: source.to_string(),
        }
        .into());
    }

    let id = db::insert_complaint(pool, category, body).await?;

    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(NOTIFY_CHANNEL)
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("failed to notify complaint channel")?;

    Ok(id)
}

/// Tails the complaint feed. Wakes on either the notify channel or a 30-second
/// poll; both may fire for the same row, and the re-query plus the
/// `submitted_at` cursor make the duplicate wakeup harmless.
pub async fn watch(pool: &PgPool) -> Result<()> {
    let mut listener = PgListener::connect_with(pool)
        .await
        .context("failed to open complaint listener")?;
    listener
        .listen(NOTIFY_CHANNEL)
        .await
        .context("failed to subscribe to complaint channel")?;

    let mut poll = tokio::time::interval(std::time::Duration::from_secs(POLL_INTERVAL_SECS));
    let mut last_seen: Option<DateTime<Utc>> = None;

    info!(channel = NOTIFY_CHANNEL, "watching for complaints");

    loop {
        tokio::select! {
            notification = listener.recv() => {
                if let Err(err) = notification {
                    warn!(%err, "complaint listener dropped, relying on polling");
                }
            }
            _ = poll.tick() => {}
        }

        let fresh = db::fetch_complaints_since(pool, last_seen).await?;
        for complaint in &fresh {
            println!(
                "[{}] {}: {}",
                complaint.submitted_at.format("%Y-%m-%d %H:%M:%S"),
                complaint.category,
                complaint.body
            );
            last_seen = Some(match last_seen {
                Some(seen) => seen.max(complaint.submitted_at),
                None => complaint.submitted_at,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).single().expect("valid timestamp")
    }

    fn cfg() -> RateLimitConfig {
        RateLimitConfig {
            capacity: 2.0,
            refill_per_sec: 0.1,
        }
    }

    #[tokio::test]
    async fn burst_drains_the_bucket() {
        let store = MemoryStore::new();
        let cfg = cfg();

        assert!(allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
        assert!(allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
        assert!(!allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
    }

    #[tokio::test]
    async fn tokens_refill_over_time() {
        let store = MemoryStore::new();
        let cfg = cfg();

        assert!(allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
        assert!(allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
        assert!(!allow(&store, "kiosk-1", &cfg, now()).await.unwrap());

        let later = now() + Duration::seconds(10);
        assert!(allow(&store, "kiosk-1", &cfg, later).await.unwrap());
    }

    #[tokio::test]
    async fn sources_are_limited_independently() {
        let store = MemoryStore::new();
        let cfg = cfg();

        assert!(allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
        assert!(allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
        assert!(!allow(&store, "kiosk-1", &cfg, now()).await.unwrap());
        assert!(allow(&store, "kiosk-2", &cfg, now()).await.unwrap());
    }

    #[tokio::test]
    async fn refill_never_exceeds_capacity() {
        let store = MemoryStore::new();
        let cfg = cfg();

        assert!(allow(&store, "kiosk-1", &cfg, now()).await.unwrap());

        let much_later = now() + Duration::seconds(3_600);
        assert!(allow(&store, "kiosk-1", &cfg, much_later).await.unwrap());
        assert!(allow(&store, "kiosk-1", &cfg, much_later).await.unwrap());
        assert!(!allow(&store, "kiosk-1", &cfg, much_later).await.unwrap());
    }
}
