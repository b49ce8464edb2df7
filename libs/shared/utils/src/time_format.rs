use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use regex::Regex;

fn clock_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([01]?\d|2[0-3]):?([0-5]\d)$").expect("static clock-time pattern")
    })
}

/// Parses a 24-hour wall time: `19:00`, `9:30` and `0930` are accepted.
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let captures = clock_time_pattern().captures(raw.trim())?;
    let hour = captures.get(1)?.as_str().parse().ok()?;
    let minute = captures.get(2)?.as_str().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

pub fn format_clock_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Accepts a plain `YYYY-MM-DD` date, or an RFC 3339 timestamp read in the given offset.
pub fn parse_calendar_date(raw: &str, offset: FixedOffset) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|instant| instant.with_timezone(&offset).date_naive())
    })
}

/// Serde adapter for `NaiveTime` fields carried as `"HH:mm"`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_clock_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Database rows come back as HH:MM:SS.
        super::parse_clock_time(&raw)
            .or_else(|| NaiveTime::parse_from_str(&raw, "%H:%M:%S").ok())
            .ok_or_else(|| de::Error::custom(format!("invalid time '{}', expected HH:mm", raw)))
    }
}

pub mod hhmm_option {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => super::hhmm::serialize(time, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::hhmm")] NaiveTime);

        let value: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(value.map(|Wrapper(time)| time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_spellings() {
        let seven_pm = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        assert_eq!(parse_clock_time("19:00"), Some(seven_pm));
        assert_eq!(parse_clock_time("1900"), Some(seven_pm));
        assert_eq!(parse_clock_time("9:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_clock_time(" 09:30 "), NaiveTime::from_hms_opt(9, 30, 0));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(parse_clock_time("24:00"), None);
        assert_eq!(parse_clock_time("19:60"), None);
        assert_eq!(parse_clock_time("7pm"), None);
        assert_eq!(parse_clock_time(""), None);
    }

    #[test]
    fn timestamps_are_read_in_the_given_offset() {
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();

        assert_eq!(parse_calendar_date("2026-03-01", dhaka), NaiveDate::from_ymd_opt(2026, 3, 1));
        // 20:00 UTC on Feb 28 is already March 1 in Dhaka.
        assert_eq!(parse_calendar_date("2026-02-28T20:00:00Z", dhaka), NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(parse_calendar_date("next sunday", dhaka), None);
    }

    #[test]
    fn formats_with_leading_zero() {
        assert_eq!(format_clock_time(NaiveTime::from_hms_opt(9, 5, 0).unwrap()), "09:05");
    }
}
