//! Elapsed-time extraction from narration such as `2h 15m`, `45 min` or `3 hours`.

use once_cell::sync::Lazy;
use regex::Regex;

static HOURS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*h(?:ours?|rs?)?(?:[^a-z]|$)").expect("hours pattern")
});

static MINUTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*m(?:in(?:ute)?s?)?(?:[^a-z]|$)").expect("minutes pattern")
});

/// Total minutes mentioned in `text`, if any hour or minute figure is present.
///
/// Hours and minutes are matched independently (first occurrence of each), so
/// `2h 15m`, `15m 2h`, `45m` and `3h` all resolve.
pub fn parse_duration(text: &str) -> Option<u32> {
    let hours = first_number(&HOURS, text);
    let minutes = first_number(&MINUTES, text);
    if hours.is_none() && minutes.is_none() {
        return None;
    }
    let total = hours
        .unwrap_or(0)
        .saturating_mul(60)
        .saturating_add(minutes.unwrap_or(0));
    Some(total)
}

/// Like [`parse_duration`], with `0` when nothing matches.
pub fn duration_minutes(text: &str) -> u32 {
    parse_duration(text).unwrap_or(0)
}

fn first_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hours_and_minutes_combine() {
        assert_eq!(duration_minutes("2h 15m"), 135);
        assert_eq!(duration_minutes("took 1 hour 5 minutes"), 65);
        assert_eq!(duration_minutes("2h15m"), 135);
    }

    #[test]
    fn single_units() {
        assert_eq!(duration_minutes("45m"), 45);
        assert_eq!(duration_minutes("3h"), 180);
        assert_eq!(duration_minutes("Time: 50 min."), 50);
        assert_eq!(duration_minutes("2 hrs"), 120);
    }

    #[test]
    fn no_figures_means_zero() {
        assert_eq!(parse_duration("picking finished"), None);
        assert_eq!(duration_minutes("picking finished"), 0);
        // Words that only start like a unit do not count.
        assert_eq!(parse_duration("5 messages, 3 halls"), None);
    }

    #[test]
    fn overflowing_figures_are_ignored() {
        assert_eq!(duration_minutes("99999999999h 10m"), 10);
    }

    proptest! {
        #[test]
        fn formatted_durations_parse_back(h in 0u32..100, m in 0u32..60) {
            prop_assert_eq!(duration_minutes(&format!("{h}h {m}m")), h * 60 + m);
        }

        #[test]
        fn never_panics(text in ".*") {
            let _ = parse_duration(&text);
        }
    }
}
