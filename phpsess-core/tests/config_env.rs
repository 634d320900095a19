//! Environment overrides run in their own test binary so the variables
//! cannot leak into other config tests.

use phpsess_core::SessionConfig;
use std::time::Duration;

#[test]
fn test_environment_overrides_defaults() {
    std::env::set_var("PHPSESS_LOCK_TIMEOUT", "7");
    std::env::set_var("PHPSESS_LOCK_SUFFIX", "_MUTEX");
    std::env::set_var("PHPSESS_JSON_FIELDS", "cart,wishlist");

    let config = SessionConfig::load(None).unwrap();

    assert_eq!(config.lock_timeout(), Duration::from_secs(7));
    assert_eq!(config.lock_suffix(), "_MUTEX");
    assert!(config.json_fields().contains("cart"));
    assert!(config.json_fields().contains("wishlist"));
    assert_eq!(config.json_fields().len(), 2);
    assert_eq!(config.session_prefix(), "PHPREDIS_SESSION:");
}
