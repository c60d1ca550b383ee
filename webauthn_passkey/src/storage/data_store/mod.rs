mod config;

pub use config::DB_TABLE_PASSKEY_CREDENTIALS;
pub(crate) use config::{DataStore, GENERIC_DATA_STORE};
