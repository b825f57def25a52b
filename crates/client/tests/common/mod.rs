use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use koma_client::poller::PollConfig;
use koma_client::KomaApi;
use koma_core::types::Viewport;

/// One scripted answer of `GET /status/{id}`.
#[derive(Debug, Clone)]
pub enum StatusStep {
    /// Redirect to `/progress/{id}`, which serves this signal.
    Progress(i64),
    /// Terminal HTML body.
    Html(String),
    /// Terminal JSON body with status `200`.
    Json(Value),
    /// Terminal failure.
    Fail(u16, Value),
}

/// Shared state of the mock backend, inspected by the tests.
#[derive(Default)]
pub struct MockState {
    pub status_script: Mutex<VecDeque<StatusStep>>,
    pub progress_value: Mutex<i64>,
    pub status_polls: AtomicUsize,
    pub last_status_query: Mutex<Option<String>>,
    pub submissions: Mutex<Vec<Value>>,
    pub reject_submission: Mutex<Option<(u16, Value)>>,
    pub results: Mutex<Vec<Value>>,
    pub result_listings: AtomicUsize,
    pub fail_listing: Mutex<bool>,
    pub last_authorization: Mutex<Option<String>>,
    pub logout_status: Mutex<u16>,
    pub volume: Mutex<Option<Vec<u8>>>,
}

impl MockState {
    pub fn script(&self, steps: impl IntoIterator<Item = StatusStep>) {
        self.status_script.lock().unwrap().extend(steps);
    }

    pub fn polls(&self) -> usize {
        self.status_polls.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.result_listings.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub state: Arc<MockState>,
    pub base_url: String,
}

impl MockBackend {
    /// Serve the mock on an ephemeral local port.
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            logout_status: Mutex::new(200),
            ..MockState::default()
        });

        let app = Router::new()
            .route("/simulate", post(submit_simulation))
            .route("/recon/{id}", post(submit_reconstruction))
            .route("/status/{id}", get(status))
            .route("/progress/{id}", get(progress))
            .route("/plot_sequence", post(plot_sequence))
            .route("/plot_phantom", post(plot_phantom))
            .route("/public/{*path}", get(volume))
            .route("/api/results", get(list_results))
            .route("/api/results/{id}", delete(delete_result))
            .route("/api/results/{id}/download", get(download_result))
            .route("/logout", get(logout))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            base_url: format!("http://{addr}"),
        }
    }

    pub fn api(&self) -> KomaApi {
        KomaApi::new(&self.base_url)
            .unwrap()
            .with_token(Some("test-token".into()))
    }
}

pub fn fast_polling() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(5),
        viewport: Viewport {
            width: 640,
            height: 480,
        },
    }
}

/// A 2x2x2 uint8 NIfTI-1 volume, uncompressed, little-endian.
pub fn tiny_nifti() -> Vec<u8> {
    let mut bytes = vec![0u8; 352];
    bytes[0..4].copy_from_slice(&348i32.to_le_bytes());
    for (i, dim) in [3i16, 2, 2, 2, 1, 1, 1, 1].iter().enumerate() {
        bytes[40 + 2 * i..42 + 2 * i].copy_from_slice(&dim.to_le_bytes());
    }
    bytes[70..72].copy_from_slice(&2i16.to_le_bytes());
    bytes[72..74].copy_from_slice(&8i16.to_le_bytes());
    for i in 0..4 {
        bytes[76 + 4 * i..80 + 4 * i].copy_from_slice(&1.0f32.to_le_bytes());
    }
    bytes[108..112].copy_from_slice(&352.0f32.to_le_bytes());
    bytes[344..348].copy_from_slice(b"n+1\0");
    bytes.extend_from_slice(&[0, 10, 20, 30, 40, 50, 60, 70]);
    bytes
}

// ---- handlers ----

fn record_auth(state: &MockState, headers: &axum::http::HeaderMap) {
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_authorization.lock().unwrap() = auth;
}

fn reply(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

async fn submit_simulation(
    State(state): State<Arc<MockState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record_auth(&state, &headers);
    state.submissions.lock().unwrap().push(body);
    if let Some((status, body)) = state.reject_submission.lock().unwrap().take() {
        return reply(status, body);
    }
    (StatusCode::ACCEPTED, [(LOCATION, "/status/42")]).into_response()
}

async fn submit_reconstruction(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Response {
    state.submissions.lock().unwrap().push(json!({ "recon": id }));
    (StatusCode::ACCEPTED, [(LOCATION, format!("/status/{id}"))]).into_response()
}

async fn status(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    state.status_polls.fetch_add(1, Ordering::SeqCst);
    *state.last_status_query.lock().unwrap() = query;

    let step = state.status_script.lock().unwrap().pop_front();
    match step {
        Some(StatusStep::Progress(value)) => {
            *state.progress_value.lock().unwrap() = value;
            (StatusCode::SEE_OTHER, [(LOCATION, format!("/progress/{id}"))]).into_response()
        }
        Some(StatusStep::Html(html)) => Html(html).into_response(),
        Some(StatusStep::Json(body)) => Json(body).into_response(),
        Some(StatusStep::Fail(status, body)) => reply(status, body),
        None => reply(404, json!({ "error": "no such job" })),
    }
}

async fn progress(State(state): State<Arc<MockState>>) -> Json<i64> {
    Json(*state.progress_value.lock().unwrap())
}

async fn plot_sequence(Json(body): Json<Value>) -> Response {
    if body.get("sequence").is_some_and(Value::is_null) {
        return reply(500, json!({ "msg": "sequence is empty" }));
    }
    Json(json!({
        "seq_html": format!("<seq w={}>", body["width"]),
        "kspace_html": "<kspace>",
    }))
    .into_response()
}

async fn plot_phantom(Json(body): Json<Value>) -> Response {
    Html(format!(
        "<phantom {} {}>",
        body["phantom"].as_str().unwrap_or_default(),
        body["map"].as_str().unwrap_or_default()
    ))
    .into_response()
}

async fn volume(State(state): State<Arc<MockState>>) -> Response {
    match state.volume.lock().unwrap().clone() {
        Some(bytes) => Bytes::from(bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_results(State(state): State<Arc<MockState>>) -> Response {
    state.result_listings.fetch_add(1, Ordering::SeqCst);
    if *state.fail_listing.lock().unwrap() {
        return reply(500, json!({ "msg": "database down" }));
    }
    Json(Value::Array(state.results.lock().unwrap().clone())).into_response()
}

async fn delete_result(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    let mut results = state.results.lock().unwrap();
    let before = results.len();
    results.retain(|r| r["id"].as_i64() != Some(id));
    if results.len() == before {
        return reply(404, json!({ "error": "Result not found" }));
    }
    Json(json!({ "ok": true })).into_response()
}

async fn download_result(Path(id): Path<i64>) -> Response {
    Bytes::from(format!("archive-{id}")).into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> StatusCode {
    StatusCode::from_u16(*state.logout_status.lock().unwrap()).unwrap_or(StatusCode::OK)
}
