//! Protocol constants shared with the PHP redis session handler.
//!
//! Changing any of these breaks interoperability with PHP processes that use
//! the same store: both sides must derive identical keys and follow the same
//! lock cadence.

use std::time::Duration;

/// Key prefix used by phpredis for session data (`session.save_path?prefix=`)
pub const SESSION_PREFIX: &str = "PHPREDIS_SESSION:";

/// Suffix phpredis appends to the session key to form the lock key
pub const LOCK_SUFFIX: &str = "_LOCK";

/// Session lifetime in seconds, PHP's `session.gc_maxlifetime` default for this deployment
pub const DEFAULT_SESSION_EXPIRE: u64 = 86_400;

/// Lock acquisition timeout in seconds
pub const DEFAULT_LOCK_TIMEOUT: f64 = 30.0;

/// Delay between two `SET NX` attempts while waiting for a lock
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Session fields known to hold JSON strings written by the PHP application
pub const DEFAULT_JSON_FIELDS: [&str; 4] = ["scart_items", "ga_data", "session_view_log", "MPIReceive"];

/// Fields starting with this prefix are treated as JSON as well
pub const DEFAULT_JSON_PREFIX: &str = "trace_list_";

/// Name of the cookie carrying the session id
pub const DEFAULT_COOKIE_NAME: &str = "PHPSESSID";

/// Token-checked lock release, identical to the script phpredis runs.
///
/// Deletes `KEYS[1]` only while it still holds `ARGV[1]`; returns 1 when the
/// key was deleted and 0 otherwise.
pub const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Accepted session id shape. PHP itself also allows `,` and `-`; they are
/// rejected here so an id can never smuggle key separators.
pub const SESSION_ID_PATTERN: &str = r"^[A-Za-z0-9]{26,128}$";

/// Number of id characters that may appear in logs and error messages
pub const REDACTED_PREFIX_LEN: usize = 8;
