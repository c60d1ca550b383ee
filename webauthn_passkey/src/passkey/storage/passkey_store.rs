use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Sqlite, postgres::PgRow, sqlite::SqliteRow};

use crate::storage::{DB_TABLE_PASSKEY_CREDENTIALS, DataStore, GENERIC_DATA_STORE};

use super::super::errors::PasskeyError;
use super::super::types::{CredentialSearchField, PasskeyCredential, PublicKeyCredentialUserEntity};

pub(crate) struct PasskeyStore;

impl PasskeyStore {
    pub(crate) async fn init() -> Result<(), PasskeyError> {
        match &*GENERIC_DATA_STORE {
            DataStore::Sqlite(pool) => create_tables_sqlite(pool).await,
            DataStore::Postgres(pool) => create_tables_postgres(pool).await,
        }
    }

    /// Insert a credential. A second insert with the same credential ID is
    /// a conflict, never an overwrite.
    pub(crate) async fn store_credential(credential: PasskeyCredential) -> Result<(), PasskeyError> {
        match &*GENERIC_DATA_STORE {
            DataStore::Sqlite(pool) => store_credential_sqlite(pool, &credential).await,
            DataStore::Postgres(pool) => store_credential_postgres(pool, &credential).await,
        }
    }

    pub(crate) async fn get_credential(
        credential_id: &str,
    ) -> Result<Option<PasskeyCredential>, PasskeyError> {
        match &*GENERIC_DATA_STORE {
            DataStore::Sqlite(pool) => get_credential_sqlite(pool, credential_id).await,
            DataStore::Postgres(pool) => get_credential_postgres(pool, credential_id).await,
        }
    }

    pub(crate) async fn get_credentials_by(
        field: CredentialSearchField,
    ) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        match &*GENERIC_DATA_STORE {
            DataStore::Sqlite(pool) => get_credentials_by_sqlite(pool, field).await,
            DataStore::Postgres(pool) => get_credentials_by_postgres(pool, field).await,
        }
    }

    /// Conditionally advance the sign counter. The UPDATE only matches
    /// when the stored counter is still below `new_sign_count`, so of two
    /// racing assertions carrying the same counter exactly one wins.
    /// Returns whether a row was updated.
    pub(crate) async fn update_sign_count(
        credential_id: &str,
        new_sign_count: u32,
    ) -> Result<bool, PasskeyError> {
        match &*GENERIC_DATA_STORE {
            DataStore::Sqlite(pool) => {
                update_sign_count_sqlite(pool, credential_id, new_sign_count).await
            }
            DataStore::Postgres(pool) => {
                update_sign_count_postgres(pool, credential_id, new_sign_count).await
            }
        }
    }

    /// Refresh `last_used_at` without touching the counter. Used for
    /// counter-less authenticators that always report zero.
    pub(crate) async fn touch_last_used(credential_id: &str) -> Result<(), PasskeyError> {
        match &*GENERIC_DATA_STORE {
            DataStore::Sqlite(pool) => touch_last_used_sqlite(pool, credential_id).await,
            DataStore::Postgres(pool) => touch_last_used_postgres(pool, credential_id).await,
        }
    }

    pub(crate) async fn delete_credential_by(
        field: CredentialSearchField,
    ) -> Result<(), PasskeyError> {
        match &*GENERIC_DATA_STORE {
            DataStore::Sqlite(pool) => delete_credential_by_sqlite(pool, field).await,
            DataStore::Postgres(pool) => delete_credential_by_postgres(pool, field).await,
        }
    }
}

fn search_column(field: &CredentialSearchField) -> (&'static str, &str) {
    match field {
        CredentialSearchField::CredentialId(id) => ("credential_id", id),
        CredentialSearchField::UserId(id) => ("user_id", id),
        CredentialSearchField::UserHandle(handle) => ("user_handle", handle),
        CredentialSearchField::UserName(name) => ("user_name", name),
    }
}

// SQLite implementations

async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            public_key TEXT NOT NULL,
            algorithm INTEGER NOT NULL,
            sign_count INTEGER NOT NULL DEFAULT 0,
            transports TEXT NOT NULL DEFAULT '[]',
            user_handle TEXT NOT NULL,
            user_name TEXT NOT NULL,
            user_display_name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_used_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_user_id ON {table}(user_id)"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_user_handle ON {table}(user_handle)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

fn credential_from_sqlite_row(row: &SqliteRow) -> Result<PasskeyCredential, PasskeyError> {
    let transports_json: String = row.try_get("transports")?;
    Ok(PasskeyCredential {
        credential_id: row.try_get("credential_id")?,
        user_id: row.try_get("user_id")?,
        public_key: row.try_get("public_key")?,
        algorithm: row.try_get::<i64, _>("algorithm")? as i32,
        sign_count: row.try_get::<i64, _>("sign_count")? as u32,
        transports: serde_json::from_str(&transports_json).unwrap_or_default(),
        user: PublicKeyCredentialUserEntity {
            user_handle: row.try_get("user_handle")?,
            name: row.try_get("user_name")?,
            display_name: row.try_get("user_display_name")?,
        },
        created_at: row.try_get("created_at")?,
        last_used_at: row.try_get("last_used_at")?,
    })
}

async fn store_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    let transports_json = serde_json::to_string(&credential.transports)
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {} (
            credential_id, user_id, public_key, algorithm, sign_count,
            transports, user_handle, user_name, user_display_name,
            created_at, last_used_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.public_key)
    .bind(credential.algorithm as i64)
    .bind(credential.sign_count as i64)
    .bind(&transports_json)
    .bind(&credential.user.user_handle)
    .bind(&credential.user.name)
    .bind(&credential.user.display_name)
    .bind(credential.created_at)
    .bind(credential.last_used_at)
    .execute(pool)
    .await?;

    Ok(())
}

async fn get_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<Option<PasskeyCredential>, PasskeyError> {
    let row = sqlx::query(&format!(
        "SELECT * FROM {} WHERE credential_id = ?",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(credential_from_sqlite_row).transpose()
}

async fn get_credentials_by_sqlite(
    pool: &Pool<Sqlite>,
    field: CredentialSearchField,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let (column, value) = search_column(&field);
    let rows = sqlx::query(&format!(
        "SELECT * FROM {} WHERE {column} = ?",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(value)
    .fetch_all(pool)
    .await?;

    rows.iter().map(credential_from_sqlite_row).collect()
}

async fn update_sign_count_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
    new_sign_count: u32,
) -> Result<bool, PasskeyError> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET sign_count = ?, last_used_at = ? WHERE credential_id = ? AND sign_count < ?",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(new_sign_count as i64)
    .bind(Utc::now())
    .bind(credential_id)
    .bind(new_sign_count as i64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn touch_last_used_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<(), PasskeyError> {
    sqlx::query(&format!(
        "UPDATE {} SET last_used_at = ? WHERE credential_id = ?",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(Utc::now())
    .bind(credential_id)
    .execute(pool)
    .await?;

    Ok(())
}

async fn delete_credential_by_sqlite(
    pool: &Pool<Sqlite>,
    field: CredentialSearchField,
) -> Result<(), PasskeyError> {
    let (column, value) = search_column(&field);
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {column} = ?",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

// PostgreSQL implementations

async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            public_key TEXT NOT NULL,
            algorithm INTEGER NOT NULL,
            sign_count BIGINT NOT NULL DEFAULT 0,
            transports TEXT NOT NULL DEFAULT '[]',
            user_handle TEXT NOT NULL,
            user_name TEXT NOT NULL,
            user_display_name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_used_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_user_id ON {table}(user_id)"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_user_handle ON {table}(user_handle)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

fn credential_from_postgres_row(row: &PgRow) -> Result<PasskeyCredential, PasskeyError> {
    let transports_json: String = row.try_get("transports")?;
    Ok(PasskeyCredential {
        credential_id: row.try_get("credential_id")?,
        user_id: row.try_get("user_id")?,
        public_key: row.try_get("public_key")?,
        algorithm: row.try_get::<i32, _>("algorithm")?,
        sign_count: row.try_get::<i64, _>("sign_count")? as u32,
        transports: serde_json::from_str(&transports_json).unwrap_or_default(),
        user: PublicKeyCredentialUserEntity {
            user_handle: row.try_get("user_handle")?,
            name: row.try_get("user_name")?,
            display_name: row.try_get("user_display_name")?,
        },
        created_at: row.try_get("created_at")?,
        last_used_at: row.try_get("last_used_at")?,
    })
}

async fn store_credential_postgres(
    pool: &Pool<Postgres>,
    credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    let transports_json = serde_json::to_string(&credential.transports)
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {} (
            credential_id, user_id, public_key, algorithm, sign_count,
            transports, user_handle, user_name, user_display_name,
            created_at, last_used_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.public_key)
    .bind(credential.algorithm)
    .bind(credential.sign_count as i64)
    .bind(&transports_json)
    .bind(&credential.user.user_handle)
    .bind(&credential.user.name)
    .bind(&credential.user.display_name)
    .bind(credential.created_at)
    .bind(credential.last_used_at)
    .execute(pool)
    .await?;

    Ok(())
}

async fn get_credential_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<Option<PasskeyCredential>, PasskeyError> {
    let row = sqlx::query(&format!(
        "SELECT * FROM {} WHERE credential_id = $1",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(credential_from_postgres_row).transpose()
}

async fn get_credentials_by_postgres(
    pool: &Pool<Postgres>,
    field: CredentialSearchField,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let (column, value) = search_column(&field);
    let rows = sqlx::query(&format!(
        "SELECT * FROM {} WHERE {column} = $1",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(value)
    .fetch_all(pool)
    .await?;

    rows.iter().map(credential_from_postgres_row).collect()
}

async fn update_sign_count_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    new_sign_count: u32,
) -> Result<bool, PasskeyError> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET sign_count = $1, last_used_at = $2 WHERE credential_id = $3 AND sign_count < $1",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(new_sign_count as i64)
    .bind(Utc::now())
    .bind(credential_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn touch_last_used_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<(), PasskeyError> {
    sqlx::query(&format!(
        "UPDATE {} SET last_used_at = $1 WHERE credential_id = $2",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(Utc::now())
    .bind(credential_id)
    .execute(pool)
    .await?;

    Ok(())
}

async fn delete_credential_by_postgres(
    pool: &Pool<Postgres>,
    field: CredentialSearchField,
) -> Result<(), PasskeyError> {
    let (column, value) = search_column(&field);
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {column} = $1",
        DB_TABLE_PASSKEY_CREDENTIALS.as_str()
    ))
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
