pub(crate) const DEFAULT_UPSTREAM: &str = "127.0.0.1:5000";
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_READ_TIMEOUT_SECS: u64 = 600;
pub(crate) const DEFAULT_WRITE_TIMEOUT_MILLIS: u64 = 5_000;
/// Upper bound on one newline-terminated snapshot, newline excluded.
pub(crate) const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
/// Operator events buffered before a slow reader starts lagging.
pub(crate) const EVENT_CAPACITY: usize = 64;
