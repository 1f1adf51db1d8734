//! HTTP endpoints for pastebin.
//!
//! A thin JSON surface over [`PasteService`]. Handlers translate form input
//! and map [`ErrorKind`] onto status codes; all validation lives below.

use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use pastestore::{ErrorKind, Fetched, PasteService, ServiceError, SweepState};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

/// Smallest request body cap, whatever the configured paste size.
pub const MIN_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Room for the `ttl` field and form keys on top of the encoded content.
const FORM_OVERHEAD: usize = 64 * 1024;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub service: PasteService,
    /// Sweeper lifecycle, reported by `/health` when present.
    pub sweeper: Option<watch::Receiver<SweepState>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: PasteService) -> Self {
        Self {
            service,
            sweeper: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_sweeper(mut self, state: watch::Receiver<SweepState>) -> Self {
        self.sweeper = Some(state);
        self
    }
}

/// Request body cap for a given `max_paste_size`.
///
/// Percent-encoding can triple every content byte, so a maximal paste must
/// still reach paste-size validation and get a 400 rather than a 413.
pub fn body_limit(max_paste_size: usize) -> usize {
    max_paste_size
        .saturating_mul(3)
        .saturating_add(FORM_OVERHEAD)
        .max(MIN_BODY_BYTES)
}

pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.service.config().max_paste_size);
    Router::new()
        .route("/", get(serve_root).post(create_paste))
        .route("/health", get(health))
        .route("/api/ttl-options", get(ttl_options))
        .route("/raw/{checksum}", get(raw_paste))
        .route("/delete/{checksum}", post(delete_paste))
        .route("/{checksum}", get(view_paste))
        .layer(DefaultBodyLimit::max(limit))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// A service failure rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Malformed | ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Expired => StatusCode::GONE,
        ErrorKind::Rejected => StatusCode::BAD_REQUEST,
        ErrorKind::Corruption | ErrorKind::Backend => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        let message = match kind {
            ErrorKind::Malformed | ErrorKind::NotFound => "Paste not found".to_string(),
            ErrorKind::Expired => "Paste has expired".to_string(),
            ErrorKind::Rejected => self.0.to_string(),
            ErrorKind::Corruption | ErrorKind::Backend => {
                error!(error = %self.0, "request failed");
                "Internal Server Error".to_string()
            }
            ErrorKind::Cancelled => {
                error!(error = %self.0, "request abandoned");
                "Service Unavailable".to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Serve root discovery endpoint
async fn serve_root(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.service.config();
    let body = serde_json::json!({
        "name": "pastebin",
        "version": env!("CARGO_PKG_VERSION"),
        "max_paste_size": config.max_paste_size,
        "links": {
            "create": "/",
            "ttl_options": "/api/ttl-options",
            "health": "/health",
        }
    });
    ([(header::CACHE_CONTROL, "no-cache")], Json(body))
}

fn sweep_state_name(state: SweepState) -> &'static str {
    match state {
        SweepState::Sweeping => "sweeping",
        SweepState::Idle => "idle",
        SweepState::Stopped => "stopped",
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sweeper = state
        .sweeper
        .as_ref()
        .map(|rx| sweep_state_name(*rx.borrow()));

    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "sweeper": sweeper,
    }))
}

#[derive(Debug, Serialize)]
struct TtlOptionView {
    label: &'static str,
    value: String,
    seconds: u64,
    is_default: bool,
}

async fn ttl_options(State(state): State<AppState>) -> Json<Vec<TtlOptionView>> {
    let options = state
        .service
        .ttl_options()
        .into_iter()
        .map(|option| TtlOptionView {
            label: option.label,
            value: option.value(),
            seconds: option.duration.as_secs(),
            is_default: option.is_default,
        })
        .collect();
    Json(options)
}

#[derive(Debug, Deserialize)]
struct CreateForm {
    #[serde(default)]
    content: String,
    #[serde(default)]
    ttl: Option<String>,
}

async fn create_paste(
    State(state): State<AppState>,
    Form(form): Form<CreateForm>,
) -> Result<Redirect, ApiError> {
    let ttl = state.service.resolve_ttl(form.ttl.as_deref());
    let checksum = state.service.store(&form.content, ttl).await?;
    Ok(Redirect::to(&format!("/{checksum}")))
}

#[derive(Debug, Serialize)]
struct PasteView {
    checksum: String,
    content: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    size: i64,
    raw_url: String,
}

impl From<Fetched> for PasteView {
    fn from(paste: Fetched) -> Self {
        let content = paste.text().into_owned();
        let checksum = paste.checksum.into_inner();
        Self {
            raw_url: format!("/raw/{checksum}"),
            checksum,
            content,
            created_at: paste.created_at,
            expires_at: paste.expires_at,
            size: paste.size,
        }
    }
}

async fn view_paste(
    State(state): State<AppState>,
    Path(checksum): Path<String>,
) -> Result<Response, ApiError> {
    let paste = state.service.fetch_live(&checksum).await?;
    debug!(checksum = %paste.checksum, "serving paste");
    Ok((
        [(header::CACHE_CONTROL, "no-cache")],
        Json(PasteView::from(paste)),
    )
        .into_response())
}

/// Serves the stored bytes unchanged, so the body always hashes to the URL.
async fn raw_paste(
    State(state): State<AppState>,
    Path(checksum): Path<String>,
) -> Result<Response, ApiError> {
    let paste = state.service.fetch_live(&checksum).await?;
    Ok((
        [
            (header::CONTENT_TYPE, TEXT_PLAIN),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        paste.content,
    )
        .into_response())
}

async fn delete_paste(
    State(state): State<AppState>,
    Path(checksum): Path<String>,
) -> Result<Redirect, ApiError> {
    state.service.remove(&checksum).await?;
    Ok(Redirect::to("/"))
}
