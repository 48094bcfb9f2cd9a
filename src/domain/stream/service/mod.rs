//! Stream resource orchestration: resolver + paginator + backend calls,
//! shaped into response envelopes. Strictly read-only.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::api::dto::stream_dto::{
    DatapointDto, QueryParamsEcho, StreamDetailResponse, StreamListResponse, StreamSummaryDto,
};
use crate::config::ApiConfig;
use crate::core::datastream::DatastreamBackend;
use crate::domain::stream::filter::TagFilter;
use crate::domain::stream::model::{Datapoint, DatapointTime, Downsampler, Granularity,
    QueryParams, TimeDownsampler, ValueDownsampler};
use crate::domain::stream::pagination::{Paginator, WindowMode, ZeroLimit};
use crate::domain::stream::query::{resolve_query_params, RawQuery};
use crate::domain::stream::serialize::{format_datetime, JsonFragment};
use crate::errors::{internal_error, AppError};

/// Root under which stream resources are addressed.
pub const API_ROOT: &str = "/api/v1/stream/";

pub struct StreamService {
    backend: Arc<dyn DatastreamBackend>,
    config: ApiConfig,
}

impl StreamService {
    pub fn new(backend: Arc<dyn DatastreamBackend>, config: ApiConfig) -> StreamService {
        StreamService { backend, config }
    }

    fn list_paginator(&self) -> Paginator {
        Paginator {
            default_limit: self.config.list_limit,
            max_limit: self.config.max_limit,
            zero_limit: ZeroLimit::AllObjects,
        }
    }

    fn detail_paginator(&self) -> Paginator {
        Paginator {
            default_limit: self.config.detail_limit,
            max_limit: self.config.max_limit,
            zero_limit: ZeroLimit::NoObjects,
        }
    }

    /// List streams matching the request's tag filters, without datapoints.
    pub async fn list_streams(
        &self,
        path: &str,
        raw: &RawQuery,
    ) -> Result<StreamListResponse, AppError> {
        let filters = TagFilter::parse_query(raw)?;
        let paginator = self.list_paginator();
        let window = paginator.window(raw)?;

        let mut cursor = self
            .backend
            .find_streams(&filters)
            .await
            .map_err(internal_error)?;
        if window.mode == WindowMode::Paged {
            cursor.batch_size(window.limit);
        }

        let total_count = cursor.total_count();
        debug!(filters = filters.len(), total_count, "listing streams");

        let objects = cursor
            .window(&window)
            .into_iter()
            .map(|stream| StreamSummaryDto::from_stream(stream, API_ROOT))
            .collect();

        Ok(StreamListResponse {
            objects,
            meta: paginator.meta(&window, total_count, path, raw),
        })
    }

    /// One stream with a paginated window over its datapoints.
    pub async fn stream_detail(
        &self,
        id: &str,
        path: &str,
        raw: &RawQuery,
    ) -> Result<StreamDetailResponse, AppError> {
        let stream = self
            .backend
            .get_tags(id)
            .await
            .map_err(internal_error)?
            .ok_or_else(|| AppError::NotFound(format!("Unknown stream: '{id}'")))?;

        // The stream's own highest granularity is the default resolution
        let params = resolve_query_params(raw, stream.highest_granularity)?;

        let paginator = self.detail_paginator();
        let window = paginator.window(raw)?;

        let mut cursor = self
            .backend
            .get_data(id, &params)
            .await
            .map_err(internal_error)?;
        if window.mode == WindowMode::Paged {
            cursor.batch_size(window.limit);
        }

        let total_count = cursor.total_count();
        debug!(stream = id, total_count, granularity = %params.granularity, "fetched datapoints");

        let datapoints = cursor
            .window(&window)
            .into_iter()
            .map(|point| self.datapoint_dto(point))
            .collect();

        Ok(StreamDetailResponse {
            stream: StreamSummaryDto::from_stream(stream, API_ROOT),
            datapoints,
            query_params: self.echo(&params),
            meta: paginator.meta(&window, total_count, path, raw),
        })
    }

    /// Static description of the resource: fields, allowed methods,
    /// recognized granularities, downsamplers and filter operators.
    pub fn schema(&self) -> Value {
        json!({
            "allowed_list_http_methods": ["get"],
            "allowed_detail_http_methods": ["get"],
            "default_format": "application/json",
            "default_limit": self.config.list_limit,
            "default_detail_limit": self.config.detail_limit,
            "max_limit": self.config.max_limit,
            "fields": {
                "id": {
                    "type": "string",
                    "nullable": false,
                    "readonly": true,
                    "unique": true,
                    "help_text": "The stream id."
                },
                "tags": {
                    "type": "dict",
                    "nullable": true,
                    "readonly": false,
                    "help_text": "Arbitrary key/value metadata attached to the stream."
                },
                "highest_granularity": {
                    "type": "string",
                    "nullable": false,
                    "readonly": true,
                    "help_text": "The finest granularity the stream stores."
                },
                "value_downsamplers": {
                    "type": "list",
                    "nullable": false,
                    "readonly": true,
                    "help_text": "Value aggregations available on this stream."
                },
                "time_downsamplers": {
                    "type": "list",
                    "nullable": false,
                    "readonly": true,
                    "help_text": "Timestamp aggregations available on this stream."
                },
                "datapoints": {
                    "type": "datapoints",
                    "nullable": true,
                    "readonly": true,
                    "only_detail": true,
                    "help_text": "A list of datapoints."
                },
                "resource_uri": {
                    "type": "string",
                    "nullable": false,
                    "readonly": true,
                    "help_text": "The resource URI of the stream."
                }
            },
            "filtering": {
                "tags": ["exact", "iexact", "icontains", "gt", "gte", "all"]
            },
            "granularities": Granularity::ALL.iter().map(|g| g.name()).collect::<Vec<_>>(),
            "value_downsamplers": ValueDownsampler::ALL.iter().map(|d| d.name()).collect::<Vec<_>>(),
            "time_downsamplers": TimeDownsampler::ALL.iter().map(|d| d.name()).collect::<Vec<_>>(),
        })
    }

    fn datapoint_dto(&self, point: Datapoint) -> DatapointDto {
        let format = self.config.datetime_format;
        let t = match point.t {
            DatapointTime::Instant(t) => Value::String(format_datetime(&t, format)),
            DatapointTime::Aggregate(parts) => Value::Object(
                parts
                    .into_iter()
                    .map(|(d, t)| (d.name().to_string(), json!(format_datetime(&t, format))))
                    .collect(),
            ),
        };
        DatapointDto {
            t,
            v: JsonFragment::Value(point.v),
        }
    }

    fn echo(&self, params: &QueryParams) -> QueryParamsEcho {
        let format = self.config.datetime_format;
        let fmt = |t: &chrono::DateTime<chrono::Utc>| format_datetime(t, format);
        QueryParamsEcho {
            granularity: params.granularity,
            start: params.start.as_ref().map(fmt),
            start_exclusive: params.start_exclusive.as_ref().map(fmt),
            end: params.end.as_ref().map(fmt),
            end_exclusive: params.end_exclusive.as_ref().map(fmt),
            reverse: params.reverse,
            value_downsamplers: params.value_downsamplers.clone(),
            time_downsamplers: params.time_downsamplers.clone(),
        }
    }
}
