//! Shared test fixture for API integration tests.
//!
//! Builds the full router over a temporary directory, with the sync engine
//! wired to the core mocks so no external tools are needed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use archivist_core::testing::{MockCatalog, MockFetcher, MockTagStore};
use archivist_core::{
    Channel, ChannelRegistry, ChannelSyncer, Config, EventBus, EventSink, LibraryPaths,
    Settings, SettingsStore, SyncOptions, SyncScheduler, TagStore,
};
use archivist_server::state::AppState;

pub use archivist_core::testing::fixtures;

pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    pub catalog: Arc<MockCatalog>,
    pub fetcher: Arc<MockFetcher>,
    pub events: EventBus,
    pub temp_dir: TempDir,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_channels(Vec::new()).await
    }

    pub async fn with_channels(channels: Vec<Channel>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.paths.config_dir = temp_dir.path().join("config");
        config.paths.video_dir = temp_dir.path().join("video");
        config.paths.audio_dir = temp_dir.path().join("audio");
        config.server.dashboard_dir = temp_dir.path().join("static");
        config.server.port = 0; // Not used for in-process testing

        let registry = Arc::new(ChannelRegistry::with_channels(
            config.paths.config_dir.join("channel_list.json"),
            LibraryPaths::from(&config.paths),
            channels,
        ));
        let settings = Arc::new(SettingsStore::with_settings(
            config.paths.config_dir.join("settings_config.json"),
            Settings::default(),
        ));

        let catalog = Arc::new(MockCatalog::new());
        let fetcher = Arc::new(MockFetcher::new());
        let tags: Arc<dyn TagStore> = Arc::new(MockTagStore::new());
        let events = EventBus::default();
        let sink: Arc<dyn EventSink> = Arc::new(events.clone());

        let syncer = Arc::new(ChannelSyncer::new(
            Arc::clone(&registry),
            Arc::clone(&settings),
            catalog.clone(),
            fetcher.clone(),
            tags,
            Arc::clone(&sink),
            SyncOptions::default(),
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&settings),
            syncer,
            Vec::new(),
            sink,
            1,
        ));

        let state = Arc::new(AppState::new(
            config,
            registry,
            settings,
            scheduler,
            events.clone(),
        ));
        let router = archivist_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            catalog,
            fetcher,
            events,
            temp_dir,
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.temp_dir.path().join("config")
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    pub async fn put_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("PUT")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
