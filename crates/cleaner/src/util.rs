//! Shared helpers

use std::time::Duration;

/// Human readable duration ("1 days 2 hours 3 minutes 4 seconds")
///
/// Leading zero units are dropped; seconds are always shown.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{} days {} hours {} minutes {} seconds", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{} hours {} minutes {} seconds", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{} minutes {} seconds", minutes, seconds)
    } else {
        format!("{} seconds", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(900)), "0 seconds");
        assert_eq!(format_duration(Duration::from_secs(59)), "59 seconds");
        assert_eq!(format_duration(Duration::from_secs(61)), "1 minutes 1 seconds");
        assert_eq!(
            format_duration(Duration::from_secs(3600 + 5)),
            "1 hours 0 minutes 5 seconds"
        );
        assert_eq!(
            format_duration(Duration::from_secs(2 * 86_400 + 3 * 3600 + 4 * 60 + 5)),
            "2 days 3 hours 4 minutes 5 seconds"
        );
    }
}
