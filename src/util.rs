//! Small formatting helpers for rendering decoded SNMP values.

/// Format a TIME-TICKS value (hundredths of a second) as `Dd HH:MM:SS`,
/// the conventional rendering of `sysUpTime` and similar counters.
pub fn format_uptime(ticks: i64) -> String {
    let seconds = ticks / 100;
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{} day{} {:02}:{:02}:{:02}", days, if days != 1 { "s" } else { "" }, hours, minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sub_day_uptime() {
        assert_eq!(format_uptime(360_000), "01:00:00");
    }

    #[test]
    fn formats_multi_day_uptime() {
        assert_eq!(format_uptime(3 * 86400 * 100 + 3661 * 100), "3 days 01:01:01");
    }
}
