use crate::model::{HOUR_MS, MINUTE_MS, Ms};

// ── Slot policy ──────────────────────────────────────────────────

pub const MIN_SLOT_MINUTES: i64 = 1;
pub const MAX_SLOT_MINUTES: i64 = 180;
pub const DEFAULT_SLOT_MINUTES: i64 = 30;

/// Intervals at least this long are read as "free all day" (23.5 h).
pub const ALL_DAY_THRESHOLD_MS: Ms = 23 * HOUR_MS + 30 * MINUTE_MS;

// ── Server ───────────────────────────────────────────────────────

/// Longest accepted request line, in bytes.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

pub const DEFAULT_MAX_CONNECTIONS: usize = 256;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
pub const DRAIN_TIMEOUT_SECS: u64 = 10;
