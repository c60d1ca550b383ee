mod config;
mod memory;
mod redis;
mod types;

pub use config::GENERIC_CACHE_STORE;
