//! Shared test bootstrap: points the stores at in-memory/temp-file
//! backends and fixes the origin and RP ID the fixtures assume.

use std::sync::Once;

use crate::passkey::PasskeyStore;

static INIT: Once = Once::new();

/// Set up the test environment once per process and make sure the
/// credential table exists. Safe to call from every test.
pub(crate) async fn init_test_environment() {
    INIT.call_once(|| {
        let db_path = std::env::temp_dir().join("webauthn_passkey_test.sqlite3");
        let _ = std::fs::remove_file(&db_path);

        // Env var manipulation affects process-global state; all tests
        // funnel through this Once before any config static is touched.
        unsafe {
            std::env::set_var("ORIGIN", "https://app.example");
            std::env::set_var("PASSKEY_RP_ID", "example");
            std::env::set_var("PASSKEY_USER_VERIFICATION", "required");
            std::env::set_var("GENERIC_CACHE_STORE_TYPE", "memory");
            std::env::set_var("GENERIC_CACHE_STORE_URL", "memory://test");
            std::env::set_var("GENERIC_DATA_STORE_TYPE", "sqlite");
            std::env::set_var(
                "GENERIC_DATA_STORE_URL",
                format!("sqlite:{}", db_path.display()),
            );
        }
    });

    PasskeyStore::init()
        .await
        .expect("Failed to initialize test credential store");
}
