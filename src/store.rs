//! Injected key-value store with optional TTL.
//!
//! Replaces the browser-local-storage blobs the portal used as a fallback
//! store. `PgStore` is the production implementation; `MemoryStore` is the
//! in-memory fake used under test. Values under a known set of sensitive key
//! prefixes are kept under a trivial reversible obfuscation, matching the
//! original store's treatment of those keys; it is not a security boundary.

#[cfg(test)]
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{PgPool, Row};
#[cfg(test)]
use tokio::sync::Mutex;
use tracing::warn;

pub const OBFUSCATED_PREFIXES: &[&str] = &["ratelimit/"];

const OBFUSCATION_KEY: &[u8] = b"staffdesk";

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(key, %err, "dropping corrupt store value");
            store.delete(key).await?;
            Ok(None)
        }
    }
}

pub async fn set_json<T: Serialize>(
    store: &dyn Store,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    store.set(key, &serde_json::to_string(value)?, ttl).await
}

fn is_obfuscated(key: &str) -> bool {
    OBFUSCATED_PREFIXES.iter().any(|p| key.starts_with(p))
}

fn obfuscate(value: &str) -> String {
    value
        .bytes()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(b, k)| format!("{:02x}", b ^ k))
        .collect()
}

fn deobfuscate(value: &str) -> Option<String> {
    if value.len() % 2 != 0 {
        return None;
    }

    let mut plain = Vec::with_capacity(value.len() / 2);
    for (i, k) in (0..value.len()).step_by(2).zip(OBFUSCATION_KEY.iter().cycle()) {
        let byte = u8::from_str_radix(value.get(i..i + 2)?, 16).ok()?;
        plain.push(byte ^ k);
    }

    String::from_utf8(plain).ok()
}

fn encode(key: &str, value: &str) -> String {
    if is_obfuscated(key) {
        obfuscate(value)
    } else {
        value.to_string()
    }
}

fn decode(key: &str, raw: String) -> Option<String> {
    if is_obfuscated(key) {
        deobfuscate(&raw)
    } else {
        Some(raw)
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value, expires_at FROM staffdesk.kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Lazy expiry: a read past the deadline removes the row.
        let expires_at: Option<DateTime<Utc>> = row.try_get("expires_at")?;
        if let Some(expires_at) = expires_at {
            if expires_at <= Utc::now() {
                self.delete(key).await?;
                return Ok(None);
            }
        }

        let raw: String = row.try_get("value")?;
        match decode(key, raw) {
            Some(value) => Ok(Some(value)),
            None => {
                warn!(key, "dropping unreadable store value");
                self.delete(key).await?;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| Utc::now() + ttl);
        sqlx::query(
            r#"
            INSERT INTO staffdesk.kv_store (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(encode(key, value))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM staffdesk.kv_store WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
struct StoredValue {
    raw: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory fake with the same lazy-expiry contract as `PgStore`, against an
/// injectable clock.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    now_override: Mutex<Option<DateTime<Utc>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_now(&self, now: DateTime<Utc>) {
        *self.now_override.lock().await = Some(now);
    }

    async fn now(&self) -> DateTime<Utc> {
        self.now_override.lock().await.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.now().await;
        let mut entries = self.entries.lock().await;

        let expired = matches!(
            entries.get(key),
            Some(StoredValue {
                expires_at: Some(expires_at),
                ..
            }) if *expires_at <= now
        );
        if expired {
            entries.remove(key);
            return Ok(None);
        }

        let Some(stored) = entries.get(key) else {
            return Ok(None);
        };

        match decode(key, stored.raw.clone()) {
            Some(value) => Ok(Some(value)),
            None => {
                warn!(key, "dropping unreadable store value");
                entries.remove(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let now = self.now().await;
        let expires_at = ttl.map(|ttl| now + ttl);
        self.entries.lock().await.insert(
            key.to_string(),
            StoredValue {
                raw: encode(key, value),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).single().expect("valid timestamp")
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store.set("agenda/draft", "{\"title\":\"sync\"}", None).await.unwrap();
        let value = store.get("agenda/draft").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"title\":\"sync\"}"));
    }

    #[tokio::test]
    async fn expired_key_is_removed_on_read() {
        let store = MemoryStore::new();
        store.set_now(fixed_now()).await;
        store
            .set("agenda/draft", "stale", Some(Duration::seconds(60)))
            .await
            .unwrap();

        store.set_now(fixed_now() + Duration::seconds(61)).await;
        assert_eq!(store.get("agenda/draft").await.unwrap(), None);
        assert!(store.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unexpired_key_survives_read() {
        let store = MemoryStore::new();
        store.set_now(fixed_now()).await;
        store
            .set("agenda/draft", "fresh", Some(Duration::seconds(60)))
            .await
            .unwrap();

        store.set_now(fixed_now() + Duration::seconds(59)).await;
        assert_eq!(store.get("agenda/draft").await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn obfuscated_prefix_round_trips_but_is_unreadable_at_rest() {
        let store = MemoryStore::new();
        store.set("ratelimit/cli", "{\"tokens\":3.0}", None).await.unwrap();

        let at_rest = store.entries.lock().await.get("ratelimit/cli").map(|v| v.raw.clone());
        let at_rest = at_rest.expect("stored");
        assert_ne!(at_rest, "{\"tokens\":3.0}");
        assert!(at_rest.bytes().all(|b| b.is_ascii_hexdigit()));

        let value = store.get("ratelimit/cli").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"tokens\":3.0}"));
    }

    #[tokio::test]
    async fn corrupt_json_is_deleted_and_reported_absent() {
        let store = MemoryStore::new();
        store.set("sweep/cursor", "{not json", None).await.unwrap();

        #[derive(serde::Deserialize)]
        struct Cursor {
            #[allow(dead_code)]
            offset: u64,
        }

        let cursor: Option<Cursor> = get_json(&store, "sweep/cursor").await.unwrap();
        assert!(cursor.is_none());
        assert_eq!(store.get("sweep/cursor").await.unwrap(), None);
    }

    #[tokio::test]
    async fn json_helpers_round_trip() {
        let store = MemoryStore::new();

        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Cursor {
            offset: u64,
        }

        set_json(&store, "sweep/cursor", &Cursor { offset: 7 }, None)
            .await
            .unwrap();
        let cursor: Option<Cursor> = get_json(&store, "sweep/cursor").await.unwrap();
        assert_eq!(cursor, Some(Cursor { offset: 7 }));
    }

    #[test]
    fn obfuscation_is_reversible() {
        let plain = "{\"tokens\":2.5,\"last_refill\":\"2024-06-10T12:00:00Z\"}";
        let masked = obfuscate(plain);
        assert_ne!(masked, plain);
        assert_eq!(deobfuscate(&masked).as_deref(), Some(plain));
    }

    #[test]
    fn deobfuscate_rejects_malformed_input() {
        assert_eq!(deobfuscate("abc"), None);
        assert_eq!(deobfuscate("zz"), None);
    }
}
