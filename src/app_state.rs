use std::sync::Arc;

use crate::config::ApiConfig;
use crate::core::datastream::DatastreamBackend;
use crate::domain::stream::service::StreamService;

#[derive(Clone)]
pub struct AppState {
    pub stream_service: Arc<StreamService>,
}

/// Wires the service layer around an injected backend handle. The handle is
/// built once at process start; request handlers never reach for a global.
pub fn build_app_state(backend: Arc<dyn DatastreamBackend>, config: ApiConfig) -> AppState {
    AppState {
        stream_service: Arc::new(StreamService::new(backend, config)),
    }
}
