pub mod api;
pub mod events;
pub mod models;

/// Milliseconds since the Unix epoch.
pub type TimeStamp = i64;

/// The timestamp a client sends when it has nothing cached.
pub const NONE_TIMESTAMP: TimeStamp = 0;

/// Record ids are UUID v4 strings.
pub type RecordId = String;

pub fn now_millis() -> TimeStamp {
    chrono::Utc::now().timestamp_millis()
}

/// Next value for an `updated` field. Always strictly greater than `previous`,
/// even when two mutations land in the same millisecond.
pub fn next_timestamp(previous: TimeStamp) -> TimeStamp {
    now_millis().max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_timestamp_is_strictly_increasing() {
        let far_future = now_millis() + 60_000;
        assert_eq!(next_timestamp(far_future), far_future + 1);
        assert!(next_timestamp(NONE_TIMESTAMP) > NONE_TIMESTAMP);
    }
}
