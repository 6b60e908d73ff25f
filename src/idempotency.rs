use crate::models::RunReport;
use redis::AsyncCommands;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::warn;

/// Reports of deliveries that completed, keyed by delivery key. Backed by
/// Redis when `REDIS_URL` is set, else by process memory.
#[derive(Clone)]
pub struct DeliveryLog {
    redis: Option<redis::Client>,
    local: Arc<Mutex<HashMap<String, RunReport>>>,
    ttl_secs: u64,
}

impl DeliveryLog {
    pub fn new(redis: Option<redis::Client>, ttl_secs: u64) -> Self {
        Self {
            redis,
            local: Arc::new(Mutex::new(HashMap::new())),
            ttl_secs,
        }
    }

    pub fn from_env() -> Self {
        let redis = std::env::var("REDIS_URL").ok().and_then(|url| {
            redis::Client::open(url)
                .inspect_err(|err| {
                    warn!(target = "sync.api", error = %err, "redis_url_invalid_using_memory")
                })
                .ok()
        });
        let ttl_secs = std::env::var("IDEMPOTENCY_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(86_400);
        Self::new(redis, ttl_secs)
    }

    pub async fn get(&self, key: &str) -> Option<RunReport> {
        match &self.redis {
            Some(client) => redis_get(client, key).await,
            None => self.local.lock().await.get(key).cloned(),
        }
    }

    pub async fn record(&self, key: &str, report: &RunReport) {
        match &self.redis {
            Some(client) => redis_set(client, key, report, self.ttl_secs).await,
            None => {
                self.local
                    .lock()
                    .await
                    .insert(key.to_string(), report.clone());
            }
        }
    }
}

async fn redis_get(client: &redis::Client, key: &str) -> Option<RunReport> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(err) => {
            warn!(target = "sync.api", error = %err, "redis_unavailable");
            return None;
        }
    };
    let s: Option<String> = conn.get(key).await.ok();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

async fn redis_set(client: &redis::Client, key: &str, value: &RunReport, ttl_secs: u64) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn.set_ex(key, json, ttl_secs).await;
    }
}
