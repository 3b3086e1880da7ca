//! A stand-in for the LED controller firmware. It answers the same HTTP
//! endpoints as the real device, serves a firmware metadata file, and records
//! every request so tests can check what a client sent.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{Color, DeviceInfo, FirmwareInfo, PatternStep, SetPatternRequest, UpdateRequest};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// A request the device received
#[derive(Clone, Debug, PartialEq)]
pub enum Received {
    Status,
    Color(Color),
    Pattern(Vec<PatternStep>),
    Info,
    Update(String),
    FirmwareCheck {
        cache_buster: Option<String>,
        no_cache: bool,
    },
}

/// How `/info` should answer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InfoReply {
    #[default]
    Version,
    ServerError,
    /// A body without a version in it
    Garbage,
}

struct DeviceState {
    version: String,
    color: Color,
    pattern: Vec<PatternStep>,
    latest: FirmwareInfo,
    info_reply: InfoReply,
    received: Vec<Received>,
}

#[derive(Clone)]
pub struct MockDevice {
    state: Arc<RwLock<DeviceState>>,
}

impl MockDevice {
    /// A device running `version`, with `latest` as the newest published
    /// firmware.
    pub fn new(version: impl Into<String>, latest: FirmwareInfo) -> Self {
        Self {
            state: Arc::new(RwLock::new(DeviceState {
                version: version.into(),
                color: Color::OFF,
                pattern: Vec::new(),
                latest,
                info_reply: InfoReply::default(),
                received: Vec::new(),
            })),
        }
    }

    pub async fn set_info_reply(&self, reply: InfoReply) {
        self.state.write().await.info_reply = reply;
    }

    pub async fn received(&self) -> Vec<Received> {
        self.state.read().await.received.clone()
    }

    pub async fn color(&self) -> Color {
        self.state.read().await.color
    }

    pub async fn pattern(&self) -> Vec<PatternStep> {
        self.state.read().await.pattern.clone()
    }

    pub async fn version(&self) -> String {
        self.state.read().await.version.clone()
    }

    async fn record(&self, received: Received) {
        self.state.write().await.received.push(received);
    }
}

pub fn router(device: MockDevice) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/setcolor", get(set_color))
        .route("/setpattern", post(set_pattern))
        .route("/info", get(device_info))
        .route("/update", post(update))
        .route("/firmware/version.json", get(latest_firmware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(device)
}

/// Serve `device` on `addr` in the background and return where it listens.
/// Bind to port 0 to get a free port.
pub async fn spawn(addr: SocketAddr, device: MockDevice) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(device)).await {
            warn!("Mock device stopped: {}", e);
        }
    });

    Ok(local)
}

async fn status(State(device): State<MockDevice>) -> &'static str {
    device.record(Received::Status).await;
    "OK"
}

#[derive(Deserialize)]
struct ColorQuery {
    r: u8,
    g: u8,
    b: u8,
}

async fn set_color(State(device): State<MockDevice>, Query(query): Query<ColorQuery>) -> StatusCode {
    let color = Color::new(query.r, query.g, query.b);
    info!("Colour set to {:?}", color);

    device.state.write().await.color = color;
    device.record(Received::Color(color)).await;
    StatusCode::OK
}

async fn set_pattern(
    State(device): State<MockDevice>,
    Json(request): Json<SetPatternRequest>,
) -> StatusCode {
    info!("Pattern with {} steps received", request.steps.len());

    device.state.write().await.pattern = request.steps.clone();
    device.record(Received::Pattern(request.steps)).await;
    StatusCode::OK
}

async fn device_info(State(device): State<MockDevice>) -> Response {
    device.record(Received::Info).await;

    let state = device.state.read().await;
    match state.info_reply {
        InfoReply::Version => Json(DeviceInfo {
            version: state.version.clone(),
        })
        .into_response(),
        InfoReply::ServerError => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        InfoReply::Garbage => Json(serde_json::json!({ "build": 42 })).into_response(),
    }
}

async fn update(State(device): State<MockDevice>, Json(request): Json<UpdateRequest>) -> StatusCode {
    info!("Update requested from {}", request.url);
    device.record(Received::Update(request.url.clone())).await;

    // Pretend the flash worked; a real device would reboot here
    let mut state = device.state.write().await;
    if request.url == state.latest.url {
        state.version = state.latest.version.clone();
        info!("Now running {}", state.version);
    } else {
        warn!("Unknown firmware image {}", request.url);
    }

    StatusCode::OK
}

async fn latest_firmware(
    State(device): State<MockDevice>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let no_cache = headers
        .get(header::CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("no-cache"))
        .unwrap_or(false);
    debug!("Firmware check, cache buster {:?}", query.get("t"));

    device
        .record(Received::FirmwareCheck {
            cache_buster: query.get("t").cloned(),
            no_cache,
        })
        .await;

    Json(device.state.read().await.latest.clone()).into_response()
}
