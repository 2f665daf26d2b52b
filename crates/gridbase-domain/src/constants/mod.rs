//! Fixed names and limits referenced across crates, kept in one place so
//! physical-layout strings never drift between the schema provider, the
//! record store, and the calculation engine.

/// The seven system columns every physical table carries, spec §3/§6.
pub mod system_columns {
    pub const ID: &str = "__id";
    pub const AUTO_NUMBER: &str = "__auto_number";
    pub const CREATED_TIME: &str = "__created_time";
    pub const LAST_MODIFIED_TIME: &str = "__last_modified_time";
    pub const CREATED_BY: &str = "__created_by";
    pub const LAST_MODIFIED_BY: &str = "__last_modified_by";
    pub const VERSION: &str = "__version";

    /// All seven, in physical creation order.
    pub const ALL: [&str; 7] = [
        ID,
        AUTO_NUMBER,
        CREATED_TIME,
        LAST_MODIFIED_TIME,
        CREATED_BY,
        LAST_MODIFIED_BY,
        VERSION,
    ];
}

/// Maximum length of a validated SQL identifier (spec §4.1's identifier
/// safety rule).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Offset pagination beyond this value SHOULD emit a warning and prefer a
/// caller-supplied cursor (spec §4.3).
pub const LARGE_OFFSET_WARNING_THRESHOLD: i64 = 1000;

/// Default pub/sub/event-bus broadcast channel buffer capacity.
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;

/// Pub/sub receive timeout, spec §4.9 ("short, ≈5s").
pub const PUBSUB_RECEIVE_TIMEOUT_SECS: u64 = 5;
