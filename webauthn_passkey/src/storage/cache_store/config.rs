use std::{env, sync::LazyLock};
use tokio::sync::Mutex;

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore};

/// Challenge and session cache, selected by `GENERIC_CACHE_STORE_TYPE`.
/// Behind one mutex because the in-memory backend mutates its map.
pub static GENERIC_CACHE_STORE: LazyLock<Mutex<Box<dyn CacheStore>>> =
    LazyLock::new(|| Mutex::new(build_store()));

fn build_store() -> Box<dyn CacheStore> {
    let store_type =
        env::var("GENERIC_CACHE_STORE_TYPE").expect("GENERIC_CACHE_STORE_TYPE must be set");
    let store_url =
        env::var("GENERIC_CACHE_STORE_URL").expect("GENERIC_CACHE_STORE_URL must be set");

    tracing::info!(
        "Initializing cache store with type: {}, url: {}",
        store_type,
        store_url
    );

    match store_type.as_str() {
        "memory" => Box::new(InMemoryCacheStore::new()),
        "redis" => Box::new(connect_redis(&store_url)),
        t => panic!("Unsupported cache store type: {t}. Supported types are 'memory' and 'redis'"),
    }
}

/// Open the Redis client and verify the connection before first use, so a
/// bad URL fails at startup rather than mid-ceremony.
fn connect_redis(url: &str) -> RedisCacheStore {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => panic!("Failed to create Redis client: {e}"),
    };

    let store = RedisCacheStore { client };
    let ping =
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(store.init()));
    if let Err(e) = ping {
        panic!("Failed to connect to Redis: {e}");
    }

    store
}
