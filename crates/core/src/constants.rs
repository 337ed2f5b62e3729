//! Shared constants for the analysis console.

/// Maximum number of results for any list query.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Default number of results when limit is not specified by the caller.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// PostgreSQL connection pool: maximum connections.
pub const PG_POOL_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL connection pool: acquire timeout in seconds.
pub const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL connection pool: idle timeout in seconds.
pub const PG_POOL_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default timeout for a single remote call issued by the thread synchronizer.
pub const DEFAULT_SYNC_CALL_TIMEOUT_SECS: u64 = 10;

/// Default idle time before a fully synced thread mirror is evicted.
pub const DEFAULT_THREAD_IDLE_SECS: u64 = 1800;

/// Maximum length of a single follow-up message body, in bytes.
pub const MAX_MESSAGE_LEN: usize = 32_000;

/// Maximum size of a single uploaded file, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Capacity of the change-notification broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
