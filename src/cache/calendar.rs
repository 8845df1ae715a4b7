use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::CacheService;

/// Key of a cached calendar response. `query` must already be canonical
/// (same parameters, same string) so equal requests share an entry.
pub fn calendar_key(user_id: Uuid, view: &str, query: &str) -> String {
    format!("calendar:{user_id}:{view}:{query}")
}

impl CacheService {
    /// Cached JSON body for `key`. Redis trouble is a miss, not an error.
    pub async fn get_calendar(&self, key: &str) -> Option<String> {
        let mut conn = self.redis.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Calendar cache read failed: {:?}", e);
                None
            }
        }
    }

    pub async fn put_calendar(&self, key: &str, body: &str) {
        let mut conn = self.redis.conn.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, body, self.ttl_secs).await {
            warn!("Calendar cache write failed: {:?}", e);
        }
    }

    /// Drops every cached calendar response of a user. Called after any
    /// write that can change what their calendar shows.
    pub async fn invalidate_user_calendar(&self, user_id: Uuid) -> Result<(), redis::RedisError> {
        let pattern = format!("calendar:{user_id}:*");
        let mut conn = self.redis.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS").arg(&pattern).query_async(&mut conn).await?;
        if !keys.is_empty() {
            let _: () = conn.del(&keys).await?;
        }
        debug!("Invalidated {} calendar cache entries for user {}", keys.len(), user_id);
        Ok(())
    }
}
