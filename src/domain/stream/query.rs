//! Query-string parsing and resolution into a typed [`QueryParams`].

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::stream::model::{
    Downsampler, Granularity, QueryParams, TimeDownsampler, ValueDownsampler,
};
use crate::errors::AppError;

pub const PARAM_GRANULARITY: &str = "granularity";
pub const PARAM_START: &str = "start";
pub const PARAM_END: &str = "end";
pub const PARAM_START_EXCLUSIVE: &str = "start_exclusive";
pub const PARAM_END_EXCLUSIVE: &str = "end_exclusive";
pub const PARAM_REVERSE: &str = "reverse";
pub const PARAM_VALUE_DOWNSAMPLERS: &str = "value_downsamplers";
pub const PARAM_TIME_DOWNSAMPLERS: &str = "time_downsamplers";

const REVERSE_TRUTHY: [&str; 5] = ["1", "true", "t", "yes", "y"];

/// A parsed query string, preserving key order and repeated keys (axum's
/// map-based extractor drops repeats, and pagination links must re-encode
/// the original parameters).
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pairs: Vec<(String, String)>,
}

impl RawQuery {
    pub fn parse(query: &str) -> RawQuery {
        let mut pairs = Vec::new();
        for piece in query.split('&') {
            if piece.is_empty() {
                continue;
            }
            let (key, value) = match piece.split_once('=') {
                Some((k, v)) => (k, v),
                None => (piece, ""),
            };
            pairs.push((decode_component(key), decode_component(value)));
        }
        RawQuery { pairs }
    }

    /// First value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order of appearance.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Re-encodes every pair except the listed keys, for pagination links.
    pub fn encode_without(&self, skip: &[&str]) -> String {
        let mut out = String::new();
        for (key, value) in &self.pairs {
            if skip.contains(&key.as_str()) {
                continue;
            }
            if !out.is_empty() {
                out.push('&');
            }
            out.push_str(&urlencoding::encode(key));
            out.push('=');
            out.push_str(&urlencoding::encode(value));
        }
        out
    }
}

fn decode_component(raw: &str) -> String {
    // form-urlencoded spells spaces as '+'
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|c| c.into_owned())
        .unwrap_or(raw)
}

/// Parses the detail-view query parameters into a [`QueryParams`].
///
/// `default_granularity` is the stream's own highest granularity, used when
/// the caller omits the parameter. Pure: reads the query, touches nothing
/// else.
pub fn resolve_query_params(
    raw: &RawQuery,
    default_granularity: Granularity,
) -> Result<QueryParams, AppError> {
    let granularity = match raw.get(PARAM_GRANULARITY) {
        Some(token) => Granularity::from_token(token)
            .ok_or_else(|| AppError::InvalidGranularity(token.to_string()))?,
        None => default_granularity,
    };

    let start = parse_timestamp(raw, PARAM_START)?;
    let start_exclusive = parse_timestamp(raw, PARAM_START_EXCLUSIVE)?;
    if start.is_some() && start_exclusive.is_some() {
        return Err(AppError::InvalidRange(format!(
            "Only one of '{PARAM_START}' and '{PARAM_START_EXCLUSIVE}' may be given."
        )));
    }

    let end = parse_timestamp(raw, PARAM_END)?;
    let end_exclusive = parse_timestamp(raw, PARAM_END_EXCLUSIVE)?;
    if end.is_some() && end_exclusive.is_some() {
        return Err(AppError::InvalidRange(format!(
            "Only one of '{PARAM_END}' and '{PARAM_END_EXCLUSIVE}' may be given."
        )));
    }

    // Without a lower bound all history is included
    let start = match (&start, &start_exclusive) {
        (None, None) => Some(DateTime::<Utc>::MIN_UTC),
        _ => start,
    };

    let reverse = raw
        .get(PARAM_REVERSE)
        .map(|v| REVERSE_TRUTHY.contains(&v.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    let value_downsamplers = parse_downsamplers::<ValueDownsampler>(raw, PARAM_VALUE_DOWNSAMPLERS)?;
    let time_downsamplers = parse_downsamplers::<TimeDownsampler>(raw, PARAM_TIME_DOWNSAMPLERS)?;

    Ok(QueryParams {
        granularity,
        start,
        start_exclusive,
        end,
        end_exclusive,
        reverse,
        value_downsamplers,
        time_downsamplers,
    })
}

fn parse_timestamp(raw: &RawQuery, key: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(value) = raw.get(key) else {
        return Ok(None);
    };
    let seconds: i64 = value.parse().map_err(|_| {
        AppError::BadRequest(format!(
            "Invalid {key} '{value}' provided. Please provide a UNIX timestamp."
        ))
    })?;
    match Utc.timestamp_opt(seconds, 0).single() {
        Some(dt) => Ok(Some(dt)),
        None => Err(AppError::BadRequest(format!(
            "Invalid {key} '{value}' provided. Timestamp is out of range."
        ))),
    }
}

/// Collects downsampler tokens from repeated parameters and comma lists.
/// Unknown tokens fail; an empty selection normalizes to "unspecified" so
/// the backing store picks its defaults.
fn parse_downsamplers<D: Downsampler>(
    raw: &RawQuery,
    key: &str,
) -> Result<Option<Vec<D>>, AppError> {
    let mut selected = Vec::new();
    for value in raw.get_all(key) {
        for token in value.split(',') {
            if token.is_empty() {
                continue;
            }
            let downsampler = D::from_token(token)
                .ok_or_else(|| AppError::InvalidDownsampler(token.to_string()))?;
            selected.push(downsampler);
        }
    }

    if selected.is_empty() {
        Ok(None)
    } else {
        Ok(Some(selected))
    }
}
