//! Stream API response envelopes.

use serde::Serialize;
use serde_json::Value;

use crate::domain::stream::model::{Granularity, Stream, TimeDownsampler, ValueDownsampler};
use crate::domain::stream::serialize::JsonFragment;

/// Pagination block of a response envelope. `next` and `previous` are always
/// serialized, null when there is no such page.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub total_count: usize,
    pub limit: usize,
    pub offset: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Stream summary as it appears in list responses: metadata only, never
/// datapoints.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummaryDto {
    pub id: String,
    pub tags: Value,
    pub highest_granularity: Granularity,
    pub value_downsamplers: Vec<ValueDownsampler>,
    pub time_downsamplers: Vec<TimeDownsampler>,
    pub resource_uri: String,
}

impl StreamSummaryDto {
    pub fn from_stream(stream: Stream, api_root: &str) -> StreamSummaryDto {
        let resource_uri = format!("{}/{}/", api_root.trim_end_matches('/'), stream.id);
        StreamSummaryDto {
            id: stream.id,
            tags: stream.tags,
            highest_granularity: stream.highest_granularity,
            value_downsamplers: stream.value_downsamplers,
            time_downsamplers: stream.time_downsamplers,
            resource_uri,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StreamListResponse {
    pub objects: Vec<StreamSummaryDto>,
    pub meta: PageMeta,
}

/// One datapoint as serialized: `t` is a formatted instant or an aggregate
/// object, `v` a value tree or a pre-serialized fragment.
#[derive(Debug, Clone, Serialize)]
pub struct DatapointDto {
    pub t: Value,
    pub v: JsonFragment,
}

/// Echo of the resolved query parameters, attached to detail responses.
#[derive(Debug, Clone, Serialize)]
pub struct QueryParamsEcho {
    pub granularity: Granularity,
    pub start: Option<String>,
    pub start_exclusive: Option<String>,
    pub end: Option<String>,
    pub end_exclusive: Option<String>,
    pub reverse: bool,
    pub value_downsamplers: Option<Vec<ValueDownsampler>>,
    pub time_downsamplers: Option<Vec<TimeDownsampler>>,
}

#[derive(Debug, Serialize)]
pub struct StreamDetailResponse {
    #[serde(flatten)]
    pub stream: StreamSummaryDto,
    pub datapoints: Vec<DatapointDto>,
    pub query_params: QueryParamsEcho,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_always_serializes_link_keys() {
        let meta = PageMeta {
            total_count: 0,
            limit: 20,
            offset: 0,
            next: None,
            previous: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["next"], Value::Null);
        assert_eq!(json["previous"], Value::Null);
    }

    #[test]
    fn summary_builds_resource_uri_under_api_root() {
        let stream = Stream {
            id: "abc".into(),
            tags: serde_json::json!({}),
            highest_granularity: Granularity::Seconds,
            value_downsamplers: vec![],
            time_downsamplers: vec![],
        };
        let dto = StreamSummaryDto::from_stream(stream, "/api/v1/stream/");
        assert_eq!(dto.resource_uri, "/api/v1/stream/abc/");
    }
}
