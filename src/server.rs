//! HTTP side of the dashboard.
//!
//! - `/data/{file}`: the static JSON fragments written by the partitioner.
//! - `/api/periods`, `/api/dashboard`: the same data pre-aggregated.
//! - anything else: front-end assets from `static_dir`.

use crate::aggregate::{view_or_empty, AggregateOptions};
use crate::error::FetchError;
use crate::periods::PeriodIndex;
use crate::source::{DirSource, PartitionSource};
use crate::types::{DashboardView, PartitionKey};
use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    data_dir: PathBuf,
    static_dir: PathBuf,
    source: Arc<DirSource>,
    options: Arc<AggregateOptions>,
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    year: i32,
    month: u32,
}

#[derive(Serialize)]
struct PeriodsPayload {
    ok: bool,
    years: Vec<PeriodYear>,
}

#[derive(Serialize)]
struct PeriodYear {
    year: i32,
    months: Vec<u32>,
}

#[derive(Serialize)]
struct DashboardPayload<'a> {
    ok: bool,
    #[serde(flatten)]
    view: &'a DashboardView,
}

pub fn router(data_dir: PathBuf, static_dir: PathBuf, options: AggregateOptions) -> Router {
    let state = AppState {
        source: Arc::new(DirSource::new(data_dir.clone())),
        data_dir,
        static_dir,
        options: Arc::new(options),
    };

    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/periods", get(api_periods))
        .route("/api/dashboard", get(api_dashboard))
        .route("/data/:file", get(data_file))
        .fallback(get(static_fallback))
        .with_state(state)
}

pub async fn run_server(
    host: &str,
    port: u16,
    data_dir: PathBuf,
    static_dir: PathBuf,
    options: AggregateOptions,
) -> Result<()> {
    let bind = format!("{}:{}", host, port)
        .parse::<SocketAddr>()
        .map_err(|err| anyhow!("invalid bind address: {err}"))?;

    info!(data = %data_dir.display(), assets = %static_dir.display(), "serving");
    let app = router(data_dir, static_dir, options);

    let listener = tokio::net::TcpListener::bind(bind).await.map_err(|error| {
        if error.kind() == ErrorKind::AddrInUse {
            anyhow!("failed to bind {bind}: address already in use. rerun with `serve --port <free-port>`")
        } else {
            anyhow!("failed to bind {bind}: {error}")
        }
    })?;
    println!("dashboard running at http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

fn json_response<T: Serialize>(payload: T, status: StatusCode) -> Response {
    let mut response = Json(payload).into_response();
    *response.status_mut() = status;
    response
}

async fn api_health(State(state): State<AppState>) -> Response {
    let has_metadata = fs::metadata(state.data_dir.join(crate::partition::METADATA_FILE))
        .await
        .is_ok();
    json_response(
        json!({
            "ok": true,
            "data_dir": state.data_dir.display().to_string(),
            "metadata": has_metadata,
        }),
        StatusCode::OK,
    )
}

async fn api_periods(State(state): State<AppState>) -> Response {
    match state.source.fetch_metadata().await {
        Ok(entries) => {
            let index = PeriodIndex::new(entries);
            let years = index
                .years()
                .into_iter()
                .map(|year| PeriodYear {
                    year,
                    months: index.months(year),
                })
                .collect();
            json_response(PeriodsPayload { ok: true, years }, StatusCode::OK)
        }
        Err(error) => {
            warn!(%error, "metadata unavailable");
            json_response(
                json!({"ok": false, "error": error.to_string()}),
                fetch_status(&error),
            )
        }
    }
}

/// Aggregated view of one partition. A missing or unreadable partition
/// still answers with the empty view so clients can clear their display.
async fn api_dashboard(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Response {
    let key = PartitionKey::new(query.year, query.month);
    let fetched = state.source.fetch_partition(key).await;
    let status = fetched.as_ref().err().map_or(StatusCode::OK, fetch_status);
    let view = view_or_empty(key, fetched, &state.options);
    json_response(
        DashboardPayload {
            ok: status.is_success(),
            view: &view,
        },
        status,
    )
}

fn fetch_status(error: &FetchError) -> StatusCode {
    if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Fragment names are `metadata.json` or `{year}_{month}.json`; anything
/// else is refused before touching the filesystem.
fn is_fragment_name(file: &str) -> bool {
    let Some(stem) = file.strip_suffix(".json") else {
        return false;
    };
    if stem == "metadata" {
        return true;
    }
    match stem.split_once('_') {
        Some((y, m)) => {
            !y.is_empty()
                && !m.is_empty()
                && y.chars().all(|c| c.is_ascii_digit())
                && m.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn not_found() -> Response {
    json_response(json!({"ok": false, "error": "not found"}), StatusCode::NOT_FOUND)
}

fn file_response(bytes: Vec<u8>, content_type: &str) -> Response {
    let mut response = Response::new(Body::from(bytes));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response
}

async fn data_file(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    if !is_fragment_name(&file) {
        return not_found();
    }
    match fs::read(state.data_dir.join(&file)).await {
        Ok(bytes) => file_response(bytes, "application/json"),
        Err(error) if error.kind() == ErrorKind::NotFound => not_found(),
        Err(error) => json_response(
            json!({"ok": false, "error": format!("failed to read file: {error}")}),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    }
}

/// Front-end assets; `/` is `index.html`. Paths stepping out of
/// `static_dir` are refused.
async fn static_fallback(State(state): State<AppState>, uri: Uri) -> Response {
    let requested = uri.path().trim_start_matches('/');
    if requested.split('/').any(|part| part == "..") {
        return json_response(json!({"ok": false, "error": "forbidden"}), StatusCode::FORBIDDEN);
    }
    let path = if requested.is_empty() {
        state.static_dir.join("index.html")
    } else {
        state.static_dir.join(requested)
    };
    match fs::read(&path).await {
        Ok(bytes) => file_response(bytes, mime_guess::from_path(&path).first_or_octet_stream().essence_str()),
        Err(_) => not_found(),
    }
}
