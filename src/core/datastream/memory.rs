//! In-memory datastream backend.
//!
//! Reference implementation of the backend seam: backs the demo deployment
//! and the service tests. Raw datapoints are held per stream at its highest
//! granularity; coarser reads bucket and aggregate on the fly.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::core::datastream::{Cursor, DatastreamBackend};
use crate::domain::stream::filter::{FilterOp, TagFilter};
use crate::domain::stream::model::{
    Datapoint, DatapointTime, Downsampler, Granularity, QueryParams, Stream, TimeDownsampler,
    ValueDownsampler,
};

struct StoredStream {
    meta: Stream,
    /// Raw points at the stream's highest granularity, sorted by time.
    points: Vec<(DateTime<Utc>, f64)>,
}

#[derive(Default)]
pub struct MemoryBackend {
    streams: RwLock<HashMap<String, StoredStream>>,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    /// Registers a stream with the full downsampler capability set and
    /// returns its id.
    pub fn create_stream(&self, tags: Value) -> String {
        let id = Uuid::new_v4().to_string();
        let meta = Stream {
            id: id.clone(),
            tags,
            highest_granularity: Granularity::Seconds,
            value_downsamplers: ValueDownsampler::ALL.to_vec(),
            time_downsamplers: TimeDownsampler::ALL.to_vec(),
        };
        self.streams.write().unwrap().insert(
            id.clone(),
            StoredStream {
                meta,
                points: Vec::new(),
            },
        );
        id
    }

    pub fn append(&self, id: &str, t: DateTime<Utc>, v: f64) -> Result<()> {
        let mut streams = self.streams.write().unwrap();
        let stored = streams
            .get_mut(id)
            .ok_or_else(|| anyhow!("unknown stream: {id}"))?;
        stored.points.push((t, v));
        stored.points.sort_by_key(|(t, _)| *t);
        Ok(())
    }

    /// Seeds `count` random-walk demo streams with one datapoint per second.
    pub fn seed_demo(&self, count: usize, points_per_stream: usize) {
        let mut rng = rand::thread_rng();
        let now = Utc::now();

        for n in 0..count {
            let id = self.create_stream(json!({
                "title": format!("Demo stream {n}"),
                "demo": true,
                "visualization": { "type": "line" },
            }));

            let mut streams = self.streams.write().unwrap();
            let stored = streams.get_mut(&id).expect("stream was just created");
            let mut value = rng.gen_range(0.0..100.0);
            for i in 0..points_per_stream {
                let t = now - Duration::seconds((points_per_stream - i) as i64);
                value += rng.gen_range(-1.0..1.0);
                stored.points.push((t, value));
            }
            debug!(stream = %id, points = points_per_stream, "seeded demo stream");
        }
    }
}

#[async_trait]
impl DatastreamBackend for MemoryBackend {
    async fn find_streams(&self, filters: &[TagFilter]) -> Result<Cursor<Stream>> {
        let streams = self.streams.read().unwrap();
        let mut found: Vec<Stream> = streams
            .values()
            .filter(|s| filters.iter().all(|f| matches_filter(&s.meta.tags, f)))
            .map(|s| s.meta.clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Cursor::new(found))
    }

    async fn get_tags(&self, id: &str) -> Result<Option<Stream>> {
        let streams = self.streams.read().unwrap();
        Ok(streams.get(id).map(|s| s.meta.clone()))
    }

    async fn get_data(&self, id: &str, params: &QueryParams) -> Result<Cursor<Datapoint>> {
        let streams = self.streams.read().unwrap();
        let stored = streams
            .get(id)
            .ok_or_else(|| anyhow!("unknown stream: {id}"))?;

        let selected: Vec<(DateTime<Utc>, f64)> = stored
            .points
            .iter()
            .filter(|(t, _)| within_bounds(*t, params))
            .copied()
            .collect();

        let mut datapoints = if params.granularity <= stored.meta.highest_granularity {
            selected
                .into_iter()
                .map(|(t, v)| Datapoint {
                    t: DatapointTime::Instant(t),
                    v: json!(v),
                })
                .collect()
        } else {
            downsample(&stored.meta, &selected, params)
        };

        if params.reverse {
            datapoints.reverse();
        }
        Ok(Cursor::new(datapoints))
    }
}

fn within_bounds(t: DateTime<Utc>, params: &QueryParams) -> bool {
    if let Some(start) = params.start {
        if t < start {
            return false;
        }
    }
    if let Some(start) = params.start_exclusive {
        if t <= start {
            return false;
        }
    }
    if let Some(end) = params.end {
        if t > end {
            return false;
        }
    }
    if let Some(end) = params.end_exclusive {
        if t >= end {
            return false;
        }
    }
    true
}

/// Buckets raw points at the requested granularity and reduces each bucket
/// with the selected downsamplers. A selection outside the stream's
/// capability list is skipped; capability enforcement belongs to the real
/// store.
fn downsample(
    meta: &Stream,
    points: &[(DateTime<Utc>, f64)],
    params: &QueryParams,
) -> Vec<Datapoint> {
    let value_downsamplers: Vec<ValueDownsampler> = params
        .value_downsamplers
        .clone()
        .unwrap_or_else(|| meta.value_downsamplers.clone())
        .into_iter()
        .filter(|d| meta.value_downsamplers.contains(d))
        .collect();
    let time_downsamplers: Vec<TimeDownsampler> = params
        .time_downsamplers
        .clone()
        .unwrap_or_else(|| meta.time_downsamplers.clone())
        .into_iter()
        .filter(|d| meta.time_downsamplers.contains(d))
        .collect();

    let bucket_seconds = params.granularity.duration().num_seconds();

    let mut buckets: BTreeMap<i64, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();
    for (t, v) in points {
        let bucket = t.timestamp().div_euclid(bucket_seconds) * bucket_seconds;
        buckets.entry(bucket).or_default().push((*t, *v));
    }

    buckets
        .into_iter()
        .map(|(bucket_start, members)| {
            let values: Vec<f64> = members.iter().map(|(_, v)| *v).collect();

            let mut v = serde_json::Map::new();
            for downsampler in &value_downsamplers {
                v.insert(
                    downsampler.name().to_string(),
                    aggregate_values(&values, *downsampler),
                );
            }

            let t = if time_downsamplers.is_empty() {
                // Epoch math keeps this in range
                DatapointTime::Instant(Utc.timestamp_opt(bucket_start, 0).unwrap())
            } else {
                DatapointTime::Aggregate(
                    time_downsamplers
                        .iter()
                        .map(|d| (*d, aggregate_times(&members, *d)))
                        .collect(),
                )
            };

            Datapoint {
                t,
                v: Value::Object(v),
            }
        })
        .collect()
}

fn aggregate_values(values: &[f64], downsampler: ValueDownsampler) -> Value {
    let count = values.len() as f64;
    match downsampler {
        ValueDownsampler::Mean => json!(values.iter().sum::<f64>() / count),
        ValueDownsampler::Sum => json!(values.iter().sum::<f64>()),
        ValueDownsampler::Min => json!(values.iter().copied().fold(f64::INFINITY, f64::min)),
        ValueDownsampler::Max => json!(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        ValueDownsampler::SumSquares => json!(values.iter().map(|v| v * v).sum::<f64>()),
        ValueDownsampler::StdDev => {
            let mean = values.iter().sum::<f64>() / count;
            let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;
            json!(variance.sqrt())
        }
        ValueDownsampler::Count => json!(values.len()),
        ValueDownsampler::MostOften => json!(extreme_frequency(values, true)),
        ValueDownsampler::LeastOften => json!(extreme_frequency(values, false)),
        ValueDownsampler::Frequencies => {
            let mut freq: BTreeMap<String, usize> = BTreeMap::new();
            for v in values {
                *freq.entry(v.to_string()).or_default() += 1;
            }
            json!(freq)
        }
    }
}

fn extreme_frequency(values: &[f64], most: bool) -> Option<f64> {
    let mut freq: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for v in values {
        let entry = freq.entry(v.to_string()).or_insert((0, *v));
        entry.0 += 1;
    }
    let picked = if most {
        freq.values().max_by_key(|(n, _)| *n)
    } else {
        freq.values().min_by_key(|(n, _)| *n)
    };
    picked.map(|(_, v)| *v)
}

fn aggregate_times(
    members: &[(DateTime<Utc>, f64)],
    downsampler: TimeDownsampler,
) -> DateTime<Utc> {
    match downsampler {
        TimeDownsampler::First => members.first().map(|(t, _)| *t).unwrap_or_default(),
        TimeDownsampler::Last => members.last().map(|(t, _)| *t).unwrap_or_default(),
        TimeDownsampler::Mean => {
            let sum: i64 = members.iter().map(|(t, _)| t.timestamp()).sum();
            let mean = sum / members.len().max(1) as i64;
            Utc.timestamp_opt(mean, 0).unwrap()
        }
    }
}

fn matches_filter(tags: &Value, filter: &TagFilter) -> bool {
    let Some(tag) = lookup(tags, &filter.path) else {
        return false;
    };
    let value = filter.value.as_str();

    match filter.op {
        FilterOp::Exact => matches_exact(tag, value),
        FilterOp::IExact => tag
            .as_str()
            .map(|s| s.eq_ignore_ascii_case(value))
            .unwrap_or(false),
        FilterOp::IContains => tag
            .as_str()
            .map(|s| s.to_lowercase().contains(&value.to_lowercase()))
            .unwrap_or(false),
        FilterOp::Gt => compare_numbers(tag, value).map(|o| o.is_gt()).unwrap_or(false),
        FilterOp::Gte => compare_numbers(tag, value).map(|o| o.is_ge()).unwrap_or(false),
        FilterOp::All => tag
            .as_array()
            .map(|items| {
                value
                    .split(',')
                    .all(|wanted| items.iter().any(|item| matches_exact(item, wanted)))
            })
            .unwrap_or(false),
    }
}

fn lookup<'a>(tags: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = tags;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

fn matches_exact(tag: &Value, value: &str) -> bool {
    match tag {
        Value::String(s) => s == value,
        Value::Number(n) => value.parse::<f64>().ok() == n.as_f64(),
        Value::Bool(b) => value.parse::<bool>().ok() == Some(*b),
        _ => false,
    }
}

fn compare_numbers(tag: &Value, value: &str) -> Option<std::cmp::Ordering> {
    let tag = tag.as_f64()?;
    let value: f64 = value.parse().ok()?;
    tag.partial_cmp(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stream::query::{resolve_query_params, RawQuery};

    fn resolve(query: &str) -> QueryParams {
        resolve_query_params(&RawQuery::parse(query), Granularity::Seconds).unwrap()
    }

    fn backend_with_points(n: usize) -> (MemoryBackend, String) {
        let backend = MemoryBackend::new();
        let id = backend.create_stream(json!({"title": "test"}));
        let base = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        for i in 0..n {
            backend
                .append(&id, base + Duration::seconds(i as i64), i as f64)
                .unwrap();
        }
        (backend, id)
    }

    #[tokio::test]
    async fn unknown_stream_has_no_tags() {
        let backend = MemoryBackend::new();
        assert!(backend.get_tags("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn range_bounds_are_inclusive_by_default() {
        let (backend, id) = backend_with_points(10);
        let params = resolve("start=1388534402&end=1388534404");
        let cursor = backend.get_data(&id, &params).await.unwrap();
        assert_eq!(cursor.total_count(), 3);
    }

    #[tokio::test]
    async fn exclusive_bounds_trim_the_edges() {
        let (backend, id) = backend_with_points(10);
        let params = resolve("start_exclusive=1388534402&end_exclusive=1388534404");
        let cursor = backend.get_data(&id, &params).await.unwrap();
        // Only second 1388534403 remains
        assert_eq!(cursor.total_count(), 1);
    }

    #[tokio::test]
    async fn reverse_with_exclusive_end_is_strictly_before_descending() {
        let (backend, id) = backend_with_points(10);
        let end = 1_388_534_405;
        let params = resolve(&format!("reverse=true&end_exclusive={end}"));
        let cursor = backend.get_data(&id, &params).await.unwrap();
        let window = crate::domain::stream::pagination::PageWindow {
            limit: 100,
            offset: 0,
            mode: crate::domain::stream::pagination::WindowMode::Paged,
        };
        let points = cursor.window(&window);
        assert_eq!(points.len(), 5);
        let times: Vec<i64> = points
            .iter()
            .map(|p| match p.t {
                DatapointTime::Instant(t) => t.timestamp(),
                _ => panic!("raw granularity yields instants"),
            })
            .collect();
        assert!(times.iter().all(|t| *t < end));
        assert!(times.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test]
    async fn coarser_granularity_buckets_and_aggregates() {
        let (backend, id) = backend_with_points(30);
        let params = resolve("granularity=10seconds&value_downsamplers=mean,count");
        let cursor = backend.get_data(&id, &params).await.unwrap();
        assert_eq!(cursor.total_count(), 3);

        let window = crate::domain::stream::pagination::PageWindow {
            limit: 100,
            offset: 0,
            mode: crate::domain::stream::pagination::WindowMode::Paged,
        };
        let points = cursor.window(&window);
        // First bucket holds values 0..=9
        assert_eq!(points[0].v["mean"], json!(4.5));
        assert_eq!(points[0].v["count"], json!(10));
        assert!(points[0].v.get("max").is_none());

        match &points[0].t {
            DatapointTime::Aggregate(parts) => {
                let first = parts
                    .iter()
                    .find(|(d, _)| *d == TimeDownsampler::First)
                    .map(|(_, t)| t.timestamp());
                assert_eq!(first, Some(1_388_534_400));
            }
            DatapointTime::Instant(_) => panic!("downsampled time should aggregate"),
        }
    }

    #[tokio::test]
    async fn unspecified_downsamplers_use_store_defaults() {
        let (backend, id) = backend_with_points(10);
        let params = resolve("granularity=minutes");
        let cursor = backend.get_data(&id, &params).await.unwrap();
        let window = crate::domain::stream::pagination::PageWindow {
            limit: 10,
            offset: 0,
            mode: crate::domain::stream::pagination::WindowMode::Paged,
        };
        let points = cursor.window(&window);
        assert_eq!(points.len(), 1);
        for name in ["mean", "sum", "min", "max", "std_dev", "count"] {
            assert!(points[0].v.get(name).is_some(), "missing {name}");
        }
    }

    #[tokio::test]
    async fn find_streams_applies_every_filter() {
        let backend = MemoryBackend::new();
        let a = backend.create_stream(json!({
            "title": "Highway traffic",
            "rate": 10,
            "labels": ["road", "north"],
            "visualization": {"type": "line"},
        }));
        let _b = backend.create_stream(json!({
            "title": "River level",
            "rate": 3,
            "labels": ["water"],
            "visualization": {"type": "area"},
        }));

        let cases = [
            ("tags__title=Highway traffic", 1),
            ("tags__title__iexact=highway TRAFFIC", 1),
            ("tags__title__icontains=highway", 1),
            ("tags__rate__gt=5", 1),
            ("tags__rate__gte=3", 2),
            ("tags__labels__all=road,north", 1),
            ("tags__visualization__type=line", 1),
            ("tags__title=nothing", 0),
        ];
        for (query, expected) in cases {
            let filters = TagFilter::parse_query(&RawQuery::parse(query)).unwrap();
            let found = backend.find_streams(&filters).await.unwrap();
            assert_eq!(found.total_count(), expected, "{query}");
        }

        let filters =
            TagFilter::parse_query(&RawQuery::parse("tags__visualization__type=line")).unwrap();
        let found = backend.find_streams(&filters).await.unwrap();
        let window = crate::domain::stream::pagination::PageWindow {
            limit: 10,
            offset: 0,
            mode: crate::domain::stream::pagination::WindowMode::Paged,
        };
        assert_eq!(found.window(&window)[0].id, a);
    }

    #[test]
    fn demo_seeding_populates_streams() {
        let backend = MemoryBackend::new();
        backend.seed_demo(2, 60);
        let streams = backend.streams.read().unwrap();
        assert_eq!(streams.len(), 2);
        assert!(streams.values().all(|s| s.points.len() == 60));
    }
}
