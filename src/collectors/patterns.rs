//! Shared regular expressions and field extractors for raw dumps.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// `Location[<provider> <lat>,<lon> ...]` as printed by `Location.toString()`.
pub static LOCATION_BRACKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Location\[([A-Za-z]+)\s+(-?\d+(?:\.\d+)?),\s*(-?\d+(?:\.\d+)?)").unwrap()
});

static ACCURACY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:acc|hacc|accuracy)\s*[=:]\s*(\d+(?:\.\d+)?)").unwrap()
});

static TIME_MILLIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btime=(\d{10,13})\b").unwrap());

/// Logcat `threadtime` prefix: `MM-DD HH:MM:SS.mmm`.
static THREADTIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{2})-(\d{2})\s+(\d{2}):(\d{2}):(\d{2})(?:\.(\d{1,3}))?").unwrap()
});

static LOG_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d{2}-\d{2}\s+\S+\s+\d+\s+\d+\s+[VDIWEFA]\s+([^:]+?)\s*:").unwrap()
});

static ISO_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4}-\d{2}-\d{2})[T ](\d{2}:\d{2}:\d{2}(?:\.\d+)?)(Z|[+-]\d{2}:?\d{2})?")
        .unwrap()
});

static EPOCH_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:timestamp|time|ts)"?\s*[=:]\s*"?(\d{13}|\d{10})\b"#).unwrap()
});

/// Parse a coordinate string.
pub fn parse_f64(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Extract `acc=`, `hAcc=` or `accuracy=` in meters.
pub fn accuracy(line: &str) -> Option<f64> {
    ACCURACY
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_f64(m.as_str()))
}

/// Extract `time=<epoch millis>`.
pub fn time_millis(line: &str) -> Option<DateTime<Utc>> {
    let raw = TIME_MILLIS.captures(line)?.get(1)?.as_str();
    epoch_to_datetime(raw)
}

/// Interpret 13 digits as milliseconds and 10 as seconds.
pub fn epoch_to_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let value: i64 = raw.parse().ok()?;
    if raw.len() >= 13 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// Parse the logcat `threadtime` prefix.
///
/// The prefix carries no year: the year of `now` is assumed, falling back to
/// the previous year when that would place the line after `now`.
pub fn threadtime(line: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = THREADTIME.captures(line)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let millis = caps
        .get(6)
        .map(|m| format!("{:0<3}", m.as_str()))
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    let (month, day) = (num(1)?, num(2)?);
    let (hour, minute, second) = (num(3)?, num(4)?, num(5)?);

    let in_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_milli_opt(hour, minute, second, millis))
            .map(|naive| Utc.from_utc_datetime(&naive))
    };

    match in_year(now.year()) {
        Some(ts) if ts <= now => Some(ts),
        _ => in_year(now.year() - 1),
    }
}

/// Logcat tag of a `threadtime` line.
pub fn log_tag(line: &str) -> Option<String> {
    LOG_TAG
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First ISO-8601 or epoch timestamp embedded in a free-form line.
pub fn embedded_timestamp(line: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = ISO_TIMESTAMP.captures(line) {
        let date = caps.get(1)?.as_str();
        let time = caps.get(2)?.as_str();
        let parsed = match caps.get(3).map(|m| m.as_str()) {
            Some(offset) => {
                let offset = if offset == "Z" {
                    "+00:00".to_string()
                } else if offset.contains(':') {
                    offset.to_string()
                } else {
                    format!("{}:{}", &offset[..3], &offset[3..])
                };
                DateTime::parse_from_rfc3339(&format!("{}T{}{}", date, time, offset))
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }
            None => NaiveDateTime::parse_from_str(
                &format!("{} {}", date, time),
                "%Y-%m-%d %H:%M:%S%.f",
            )
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive)),
        };
        if parsed.is_some() {
            return parsed;
        }
    }

    let raw = EPOCH_FIELD.captures(line)?.get(1)?.as_str();
    epoch_to_datetime(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_bracket() {
        let caps = LOCATION_BRACKET
            .captures("Location[gps 37.42190,-122.08400 acc=5.0 time=1700000000000]")
            .unwrap();
        assert_eq!(&caps[1], "gps");
        assert_eq!(&caps[2], "37.42190");
        assert_eq!(&caps[3], "-122.08400");
    }

    #[test]
    fn test_accuracy_variants() {
        assert_eq!(accuracy("acc=5.0 time=1"), Some(5.0));
        assert_eq!(accuracy("hAcc=20 et=+1s"), Some(20.0));
        assert_eq!(accuracy("accuracy: 12.5"), Some(12.5));
        assert_eq!(accuracy("no precision here"), None);
    }

    #[test]
    fn test_time_millis() {
        let dt = time_millis("acc=5 time=1700000000000]").unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert!(time_millis("elapsed=1700000000000").is_none());
    }

    #[test]
    fn test_threadtime_prefix() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let dt = threadtime("01-15 10:30:45.123  1234  5678 D Tag: msg", now).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T10:30:45.123+00:00");
        assert!(threadtime("not a log line", now).is_none());
    }

    #[test]
    fn test_threadtime_across_new_year() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        let dt = threadtime("12-31 23:59:58.000  1234  5678 D Tag: msg", now).unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-12-31T23:59:58+00:00");
        assert!(dt <= now);

        let dt = threadtime("01-01 00:04:59.000  1234  5678 D Tag: msg", now).unwrap();
        assert_eq!(dt.year(), 2024);
    }

    #[test]
    fn test_log_tag() {
        let line = "01-15 10:30:45.123  1234  5678 D LocationManagerService: Location[gps 1,2]";
        assert_eq!(log_tag(line).as_deref(), Some("LocationManagerService"));
    }

    #[test]
    fn test_embedded_timestamp_forms() {
        let dt = embedded_timestamp("2024-03-01T12:00:00Z lat: 1 lng: 2").unwrap();
        assert_eq!(dt.timestamp(), 1_709_294_400);

        let dt = embedded_timestamp("2024-03-01 13:00:00+0100 fix").unwrap();
        assert_eq!(dt.timestamp(), 1_709_294_400);

        let dt = embedded_timestamp("{\"ts\": 1709294400000}").unwrap();
        assert_eq!(dt.timestamp(), 1_709_294_400);

        assert!(embedded_timestamp("lat: 1 lng: 2").is_none());
    }
}
