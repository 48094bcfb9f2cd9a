//! Core datastream types: granularities, downsamplers, streams, datapoints.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Time resolution at which datapoints are stored or aggregated.
///
/// Ordered from finest to coarsest; the derived `Ord` relies on declaration
/// order. Each granularity has a canonical name and a one-character key, and
/// query parameters accept either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "seconds")]
    Seconds,
    #[serde(rename = "10seconds")]
    Seconds10,
    #[serde(rename = "minutes")]
    Minutes,
    #[serde(rename = "10minutes")]
    Minutes10,
    #[serde(rename = "hours")]
    Hours,
    #[serde(rename = "6hours")]
    Hours6,
    #[serde(rename = "days")]
    Days,
}

impl Granularity {
    pub const ALL: [Granularity; 7] = [
        Granularity::Seconds,
        Granularity::Seconds10,
        Granularity::Minutes,
        Granularity::Minutes10,
        Granularity::Hours,
        Granularity::Hours6,
        Granularity::Days,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Granularity::Seconds => "seconds",
            Granularity::Seconds10 => "10seconds",
            Granularity::Minutes => "minutes",
            Granularity::Minutes10 => "10minutes",
            Granularity::Hours => "hours",
            Granularity::Hours6 => "6hours",
            Granularity::Days => "days",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Granularity::Seconds => "s",
            Granularity::Seconds10 => "S",
            Granularity::Minutes => "m",
            Granularity::Minutes10 => "M",
            Granularity::Hours => "h",
            Granularity::Hours6 => "H",
            Granularity::Days => "d",
        }
    }

    /// Width of one bucket at this granularity.
    pub fn duration(self) -> Duration {
        match self {
            Granularity::Seconds => Duration::seconds(1),
            Granularity::Seconds10 => Duration::seconds(10),
            Granularity::Minutes => Duration::minutes(1),
            Granularity::Minutes10 => Duration::minutes(10),
            Granularity::Hours => Duration::hours(1),
            Granularity::Hours6 => Duration::hours(6),
            Granularity::Days => Duration::days(1),
        }
    }

    /// Matches a query token against the canonical name or the key alias.
    pub fn from_token(token: &str) -> Option<Granularity> {
        Granularity::ALL
            .into_iter()
            .find(|g| token == g.name() || token == g.key())
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Name/key lookup shared by the two downsampler tables.
pub trait Downsampler: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;
    fn key(self) -> &'static str;

    /// Case-sensitive match against the full name or the key alias.
    fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| token == d.name() || token == d.key())
    }
}

/// Aggregation applied to datapoint values when reducing to a coarser
/// granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDownsampler {
    Mean,
    Sum,
    Min,
    Max,
    SumSquares,
    StdDev,
    Count,
    MostOften,
    LeastOften,
    Frequencies,
}

impl Downsampler for ValueDownsampler {
    const ALL: &'static [ValueDownsampler] = &[
        ValueDownsampler::Mean,
        ValueDownsampler::Sum,
        ValueDownsampler::Min,
        ValueDownsampler::Max,
        ValueDownsampler::SumSquares,
        ValueDownsampler::StdDev,
        ValueDownsampler::Count,
        ValueDownsampler::MostOften,
        ValueDownsampler::LeastOften,
        ValueDownsampler::Frequencies,
    ];

    fn name(self) -> &'static str {
        match self {
            ValueDownsampler::Mean => "mean",
            ValueDownsampler::Sum => "sum",
            ValueDownsampler::Min => "min",
            ValueDownsampler::Max => "max",
            ValueDownsampler::SumSquares => "sum_squares",
            ValueDownsampler::StdDev => "std_dev",
            ValueDownsampler::Count => "count",
            ValueDownsampler::MostOften => "most_often",
            ValueDownsampler::LeastOften => "least_often",
            ValueDownsampler::Frequencies => "frequencies",
        }
    }

    fn key(self) -> &'static str {
        match self {
            ValueDownsampler::Mean => "m",
            ValueDownsampler::Sum => "s",
            ValueDownsampler::Min => "l",
            ValueDownsampler::Max => "u",
            ValueDownsampler::SumSquares => "q",
            ValueDownsampler::StdDev => "d",
            ValueDownsampler::Count => "c",
            ValueDownsampler::MostOften => "o",
            ValueDownsampler::LeastOften => "r",
            ValueDownsampler::Frequencies => "f",
        }
    }
}

/// Aggregation applied to datapoint timestamps when reducing to a coarser
/// granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeDownsampler {
    Mean,
    First,
    Last,
}

impl Downsampler for TimeDownsampler {
    const ALL: &'static [TimeDownsampler] = &[
        TimeDownsampler::Mean,
        TimeDownsampler::First,
        TimeDownsampler::Last,
    ];

    fn name(self) -> &'static str {
        match self {
            TimeDownsampler::Mean => "mean",
            TimeDownsampler::First => "first",
            TimeDownsampler::Last => "last",
        }
    }

    fn key(self) -> &'static str {
        match self {
            TimeDownsampler::Mean => "m",
            TimeDownsampler::First => "a",
            TimeDownsampler::Last => "z",
        }
    }
}

/// Resolved detail-view query: the typed result of parsing the request's
/// query string. Constructed once per request and never mutated.
///
/// At most one of `start`/`start_exclusive` is set, likewise for
/// `end`/`end_exclusive`; the resolver rejects requests carrying both. When
/// no lower bound is given, `start` defaults to the minimum representable
/// instant so all history is included.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub granularity: Granularity,
    pub start: Option<DateTime<Utc>>,
    pub start_exclusive: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub end_exclusive: Option<DateTime<Utc>>,
    pub reverse: bool,
    /// `None` lets the backing store pick its defaults.
    pub value_downsamplers: Option<Vec<ValueDownsampler>>,
    pub time_downsamplers: Option<Vec<TimeDownsampler>>,
}

/// Stream summary as read from the backing store. Never mutated by this
/// layer; detail responses extend it with a datapoint window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    /// Arbitrary key/value metadata attached to the stream.
    pub tags: Value,
    pub highest_granularity: Granularity,
    pub value_downsamplers: Vec<ValueDownsampler>,
    pub time_downsamplers: Vec<TimeDownsampler>,
}

/// Timestamp of a datapoint: a plain instant at the stream's raw
/// granularity, or per-downsampler aggregates once reduced.
#[derive(Debug, Clone, PartialEq)]
pub enum DatapointTime {
    Instant(DateTime<Utc>),
    Aggregate(Vec<(TimeDownsampler, DateTime<Utc>)>),
}

/// A single observation, possibly an aggregate record when reduced to a
/// coarser granularity (the value then holds one entry per downsampler).
#[derive(Debug, Clone)]
pub struct Datapoint {
    pub t: DatapointTime,
    pub v: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularity_order_is_finest_first() {
        assert!(Granularity::Seconds < Granularity::Seconds10);
        assert!(Granularity::Minutes10 < Granularity::Days);
        assert_eq!(Granularity::ALL.first(), Some(&Granularity::Seconds));
        assert_eq!(Granularity::ALL.last(), Some(&Granularity::Days));
    }

    #[test]
    fn granularity_token_accepts_name_and_key() {
        assert_eq!(Granularity::from_token("10seconds"), Some(Granularity::Seconds10));
        assert_eq!(Granularity::from_token("S"), Some(Granularity::Seconds10));
        assert_eq!(Granularity::from_token("s"), Some(Granularity::Seconds));
        assert_eq!(Granularity::from_token("weeks"), None);
    }

    #[test]
    fn granularity_serializes_as_canonical_name() {
        let json = serde_json::to_string(&Granularity::Hours6).unwrap();
        assert_eq!(json, "\"6hours\"");
    }

    #[test]
    fn downsampler_token_match_is_case_sensitive() {
        assert_eq!(ValueDownsampler::from_token("mean"), Some(ValueDownsampler::Mean));
        assert_eq!(ValueDownsampler::from_token("u"), Some(ValueDownsampler::Max));
        assert_eq!(ValueDownsampler::from_token("Mean"), None);
        assert_eq!(TimeDownsampler::from_token("z"), Some(TimeDownsampler::Last));
        assert_eq!(TimeDownsampler::from_token("Z"), None);
    }

    #[test]
    fn value_downsampler_serializes_snake_case() {
        let json = serde_json::to_string(&ValueDownsampler::SumSquares).unwrap();
        assert_eq!(json, "\"sum_squares\"");
    }
}
