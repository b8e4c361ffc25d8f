//! Destination key construction.
//!
//! Keys have the form `{timestamp}/{base_name}/{relative_path}`. The path part
//! is used verbatim: local file names are trusted and are not rewritten to
//! suit any particular storage backend.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// `YYYY-MM-DDTHH-MM-SS`: fixed width, sorts as text, no colons.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Wall-clock time of `timestamp` in its own zone; the offset is not part of
/// the output.
pub fn format_timestamp<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Prefix `destination` with the formatted pass timestamp.
pub fn build_key<Tz>(destination: &str, timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{}/{}", format_timestamp(timestamp), destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_key_format() {
        let ts = at(2024, 3, 7, 2, 5, 9);
        assert_eq!(
            build_key("documents/invoices/invoice-001.txt", &ts),
            "2024-03-07T02-05-09/documents/invoices/invoice-001.txt"
        );
    }

    #[test]
    fn test_key_uses_wall_clock_of_the_timestamp_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let ts = at(2024, 3, 6, 17, 5, 9).with_timezone(&tokyo);
        assert_eq!(build_key("docs/a.txt", &ts), "2024-03-07T02-05-09/docs/a.txt");
    }

    #[test]
    fn test_key_is_deterministic_and_verbatim() {
        let ts = at(2023, 12, 31, 23, 59, 59);
        let path = "photos/summer trip/ä #1?.jpg";
        assert_eq!(build_key(path, &ts), build_key(path, &ts));
        assert_eq!(
            build_key(path, &ts),
            "2023-12-31T23-59-59/photos/summer trip/ä #1?.jpg"
        );
    }

    #[test]
    fn test_distinct_inputs_give_distinct_keys() {
        let ts = at(2024, 1, 1, 0, 0, 0);
        let later = at(2024, 1, 1, 0, 0, 1);
        assert_ne!(build_key("a/x.txt", &ts), build_key("a/y.txt", &ts));
        assert_ne!(build_key("a/x.txt", &ts), build_key("a/x.txt", &later));
    }

    #[test]
    fn test_timestamps_sort_chronologically() {
        let stamps = [
            at(2024, 1, 9, 23, 0, 0),
            at(2024, 1, 10, 1, 0, 0),
            at(2024, 11, 2, 0, 0, 0),
        ];
        let formatted: Vec<String> = stamps.iter().map(format_timestamp).collect();
        let mut sorted = formatted.clone();
        sorted.sort();
        assert_eq!(formatted, sorted);
        assert!(formatted.iter().all(|s| s.len() == 19 && !s.contains(':')));
    }
}
