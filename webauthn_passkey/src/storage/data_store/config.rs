//! Credential database selection and table naming.

use sqlx::postgres::PgPool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::{env, str::FromStr, sync::LazyLock};

/// Handle to the credential database, selected by
/// `GENERIC_DATA_STORE_TYPE`. sqlx pools are internally synchronized, so
/// the handle is shared by reference without further locking.
pub(crate) enum DataStore {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

pub(crate) static GENERIC_DATA_STORE: LazyLock<DataStore> = LazyLock::new(|| {
    let store_type =
        env::var("GENERIC_DATA_STORE_TYPE").expect("GENERIC_DATA_STORE_TYPE must be set");
    let store_url =
        env::var("GENERIC_DATA_STORE_URL").expect("GENERIC_DATA_STORE_URL must be set");

    tracing::info!(
        "Initializing data store with type: {}, url: {}",
        store_type,
        store_url
    );

    match store_type.as_str() {
        "sqlite" => {
            let opts = SqliteConnectOptions::from_str(&store_url)
                .expect("Failed to parse SQLite connection string")
                .create_if_missing(true);
            DataStore::Sqlite(SqlitePool::connect_lazy_with(opts))
        }
        "postgres" => DataStore::Postgres(
            PgPool::connect_lazy(&store_url).expect("Failed to create Postgres pool"),
        ),
        t => panic!("Unsupported store type: {t}. Supported types are 'sqlite' and 'postgres'"),
    }
});

/// Table prefix from environment variable
pub(crate) static DB_TABLE_PREFIX: LazyLock<String> =
    LazyLock::new(|| env::var("DB_TABLE_PREFIX").unwrap_or_else(|_| "wap_".to_string()));

pub static DB_TABLE_PASSKEY_CREDENTIALS: LazyLock<String> =
    LazyLock::new(|| format!("{}passkey_credentials", *DB_TABLE_PREFIX));
