use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generates a 50-character primary key that sorts by creation time.
///
/// Layout: 15-digit millisecond timestamp, 32 hex digits of a random UUID, `000`.
///
/// ```
/// let id = sqlx_context_db::next_id();
/// assert_eq!(id.len(), 50);
/// assert!(id.ends_with("000"));
/// ```
pub fn next_id() -> String {
    next_id_at(SystemTime::now())
}

/// Same as [`next_id`] with the timestamp part taken from `time`.
pub fn next_id_at(time: SystemTime) -> String {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{:015}{}000", millis, Uuid::new_v4().simple())
}
