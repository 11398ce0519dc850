pub mod apply;
pub mod canon;
pub mod config;
pub mod init;
pub mod keys;
pub mod manifest;
pub mod sign;
pub mod state;
pub mod verify;

/// Caller-supplied time wins; otherwise the wall clock.
pub(crate) fn now_ms(explicit: Option<i64>) -> i64 {
    explicit.unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
}
