use crate::redis_client::RedisClient;

pub mod calendar;
pub mod rate_limit;

pub use rate_limit::{Penalty, RateDecision};

/// Redis-backed helpers shared by the handlers: cached calendar responses
/// and request rate limiting.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    ttl_secs: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }
}
