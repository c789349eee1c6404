//! Utility functions shared across the workspace.

/// Returns the current Unix time in milliseconds.
///
/// All expiry timestamps and event timestamps use this clock so that values
/// produced on different nodes are comparable.
pub fn current_timestamp_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let first = current_timestamp_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = current_timestamp_ms();
        assert!(first > 0);
        assert!(second > first);
    }
}
