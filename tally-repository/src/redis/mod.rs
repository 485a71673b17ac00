//! Redis implementation of the counter cache.
mod counter_cache;

pub use counter_cache::RedisCounterCache;
