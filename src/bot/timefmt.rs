// Abbreviated time-period text for log lines: "59 sec", "12 min", "1 hr 12 min".

/// Render a duration in seconds as short human text. Minutes are only
/// reported alongside hours for periods under four hours.
pub fn time_to_text(seconds: u64) -> String {
    if seconds >= 3600 {
        let mins = (seconds % 3600) / 60;
        if seconds < 14400 && mins > 10 {
            format!("{} hr {} min", seconds / 3600, mins)
        } else {
            format!("{} hr", seconds / 3600)
        }
    } else if seconds >= 60 {
        format!("{} min", seconds / 60)
    } else {
        format!("{} sec", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds() {
        assert_eq!(time_to_text(0), "0 sec");
        assert_eq!(time_to_text(59), "59 sec");
    }

    #[test]
    fn minutes() {
        assert_eq!(time_to_text(60), "1 min");
        assert_eq!(time_to_text(3599), "59 min");
    }

    #[test]
    fn hours_with_minutes_under_four_hours() {
        assert_eq!(time_to_text(3600), "1 hr");
        assert_eq!(time_to_text(4320), "1 hr 12 min");
        assert_eq!(time_to_text(3660), "1 hr");
    }

    #[test]
    fn long_periods_drop_the_minutes() {
        assert_eq!(time_to_text(14400), "4 hr");
        assert_eq!(time_to_text(18000 + 1200), "5 hr");
    }
}
