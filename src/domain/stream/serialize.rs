//! Serialization helpers: raw JSON passthrough and timezone-aware datetime
//! formatting.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;

/// A fragment of pre-serialized JSON, spliced verbatim into the output
/// buffer instead of being re-encoded. Used for payloads already retrieved
/// as JSON text from the backing store.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RawJson(Box<RawValue>);

impl RawJson {
    /// Wraps `text`, validating that it holds a single well-formed JSON
    /// value.
    pub fn new(text: impl Into<String>) -> serde_json::Result<RawJson> {
        RawValue::from_string(text.into()).map(RawJson)
    }

    pub fn get(&self) -> &str {
        self.0.get()
    }
}

/// A JSON value that is either already serialized text or a tree still to
/// be encoded.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonFragment {
    Raw(RawJson),
    Value(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatetimeFormat {
    #[default]
    Rfc3339,
    Rfc2822,
}

impl DatetimeFormat {
    /// Parses the configuration spelling (`rfc-3339` / `rfc-2822`).
    pub fn from_config(value: &str) -> Option<DatetimeFormat> {
        match value {
            "rfc-3339" => Some(DatetimeFormat::Rfc3339),
            "rfc-2822" => Some(DatetimeFormat::Rfc2822),
            _ => None,
        }
    }
}

/// Formats `dt` with an explicit UTC offset.
///
/// RFC 2822 output comes from chrono's fixed English month and weekday
/// vocabulary, never from locale-sensitive formatting routines. RFC 2822
/// cannot carry years outside 0..=9999, so those fall back to RFC 3339.
pub fn format_datetime(dt: &DateTime<Utc>, format: DatetimeFormat) -> String {
    match format {
        DatetimeFormat::Rfc3339 => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        DatetimeFormat::Rfc2822 if (0..=9999).contains(&dt.year()) => dt.to_rfc2822(),
        DatetimeFormat::Rfc2822 => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn raw_json_is_spliced_verbatim() {
        let raw = RawJson::new(r#"{"v":[1,2.50,3],"tag":"x"}"#).unwrap();
        let out = serde_json::to_string(&raw).unwrap();
        // Exact text preserved, including the non-canonical 2.50
        assert_eq!(out, r#"{"v":[1,2.50,3],"tag":"x"}"#);
    }

    #[test]
    fn raw_json_rejects_malformed_text() {
        assert!(RawJson::new("{not json").is_err());
    }

    #[test]
    fn fragment_mixes_raw_and_tree_values() {
        #[derive(Serialize)]
        struct Envelope {
            a: JsonFragment,
            b: JsonFragment,
        }

        let env = Envelope {
            a: JsonFragment::Raw(RawJson::new("[1,2]").unwrap()),
            b: JsonFragment::Value(serde_json::json!({"k": 3})),
        };
        assert_eq!(
            serde_json::to_string(&env).unwrap(),
            r#"{"a":[1,2],"b":{"k":3}}"#
        );
    }

    #[test]
    fn rfc2822_uses_english_names_and_explicit_offset() {
        let dt = Utc.with_ymd_and_hms(2014, 3, 2, 13, 45, 0).unwrap();
        assert_eq!(format_datetime(&dt, DatetimeFormat::Rfc2822), "Sun, 2 Mar 2014 13:45:00 +0000");
    }

    #[test]
    fn rfc3339_carries_utc_marker() {
        let dt = Utc.with_ymd_and_hms(2014, 3, 2, 13, 45, 0).unwrap();
        assert_eq!(format_datetime(&dt, DatetimeFormat::Rfc3339), "2014-03-02T13:45:00Z");
    }

    #[test]
    fn rfc2822_falls_back_for_unrepresentable_years() {
        let dt = DateTime::<Utc>::MIN_UTC;
        let out = format_datetime(&dt, DatetimeFormat::Rfc2822);
        // Out-of-range year renders as RFC 3339 instead of panicking
        assert!(out.contains('T'));
    }

    #[test]
    fn format_config_spellings() {
        assert_eq!(DatetimeFormat::from_config("rfc-2822"), Some(DatetimeFormat::Rfc2822));
        assert_eq!(DatetimeFormat::from_config("rfc-3339"), Some(DatetimeFormat::Rfc3339));
        assert_eq!(DatetimeFormat::from_config("iso"), None);
    }
}
