//! Web chat UI served with hyper
//!
//! Routes:
//! - `GET /` chat page
//! - `POST /api/ask` `{"question": "..."}` → answer JSON
//! - `GET /images/<file>` extracted images (plain file names only)
//! - `GET /health` assistant and index status
//! - `GET /metrics` Prometheus text format

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::index::StoreStats;
use crate::metrics;
use crate::rag::{group_images_by_document, Answer, Assistant};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8501";
const MAX_BODY_BYTES: usize = 16 * 1024;
const CHAT_PAGE: &str = include_str!("../../assets/chat.html");

pub struct ServeConfig {
    pub addr: SocketAddr,
    pub images_dir: PathBuf,
}

impl ServeConfig {
    pub fn new(addr: SocketAddr, config: &Config) -> Self {
        Self {
            addr,
            images_dir: config.index.images_dir.clone(),
        }
    }
}

struct AppState {
    assistant: Assistant,
    images_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct ImageGroup {
    document: String,
    urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    #[serde(flatten)]
    answer: Answer,
    image_groups: Vec<ImageGroup>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    llm: String,
    reranker: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<StoreStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => response(status, "application/json", Bytes::from(body)),
        Err(e) => response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain; charset=utf-8",
            Bytes::from(e.to_string()),
        ),
    }
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

/// Accept only a bare file name: no separators, no `..`, no hidden files.
fn safe_image_name(name: &str) -> Option<&str> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return None;
    }
    let is_plain = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
    is_plain.then_some(name)
}

fn image_content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("jp2") => "image/jp2",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

fn image_groups(answer: &Answer) -> Vec<ImageGroup> {
    group_images_by_document(&answer.images)
        .into_iter()
        .map(|(document, files)| ImageGroup {
            document,
            urls: files
                .iter()
                .filter_map(|f| f.file_name().and_then(|n| n.to_str()))
                .map(|name| format!("/images/{}", name))
                .collect(),
        })
        .collect()
}

async fn ask(state: &AppState, body: &[u8]) -> Response<Full<Bytes>> {
    let request: AskRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &format!("invalid request: {}", e)),
    };
    let question = request.question.trim();
    if question.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "question must not be empty");
    }

    let answer = state.assistant.ask(question).await;
    let image_groups = image_groups(&answer);
    json_response(
        StatusCode::OK,
        &AskResponse {
            answer,
            image_groups,
        },
    )
}

async fn image(state: &AppState, name: &str) -> Response<Full<Bytes>> {
    let Some(name) = safe_image_name(name) else {
        return json_error(StatusCode::BAD_REQUEST, "invalid image name");
    };
    match tokio::fs::read(state.images_dir.join(name)).await {
        Ok(data) => response(StatusCode::OK, image_content_type(name), Bytes::from(data)),
        Err(_) => json_error(StatusCode::NOT_FOUND, "image not found"),
    }
}

async fn health(state: &AppState) -> Response<Full<Bytes>> {
    let (status, index, error) = match state.assistant.index_stats().await {
        Ok(stats) => ("ok", Some(stats), None),
        Err(e) => ("degraded", None, Some(format!("{:#}", e))),
    };
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status,
            llm: state.assistant.llm_description(),
            reranker: state.assistant.reranker_name(),
            index,
            error,
        },
    )
}

async fn handle(state: &AppState, method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>> {
    debug!(%method, path, "Request");
    match (method, path) {
        (&Method::GET, "/") | (&Method::GET, "/index.html") => response(
            StatusCode::OK,
            "text/html; charset=utf-8",
            Bytes::from_static(CHAT_PAGE.as_bytes()),
        ),
        (&Method::POST, "/api/ask") => ask(state, &body).await,
        (&Method::GET, "/health") => health(state).await,
        (&Method::GET, "/metrics") => metrics::metrics_response()
            .await
            .unwrap_or_else(|never| match never {}),
        (&Method::GET, p) if p.starts_with("/images/") => image(state, &p["/images/".len()..]).await,
        (_, "/") | (_, "/api/ask") | (_, "/health") | (_, "/metrics") => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn dispatch(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let body = if method == Method::POST {
        match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Rejected request body: {}", e);
                return json_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
            }
        }
    } else {
        Bytes::new()
    };

    handle(&state, &method, &path, body).await
}

/// Serve the chat UI until Ctrl+C.
pub async fn run(config: &Config, serve: ServeConfig) -> Result<()> {
    let assistant = Assistant::from_config(config).await?;
    let state = Arc::new(AppState {
        assistant,
        images_dir: serve.images_dir,
    });

    let listener = TcpListener::bind(serve.addr).await?;
    info!(addr = %serve.addr, "Web chat started");
    println!("🌐 Migration assistant at http://{}", serve.addr);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down web chat");
                return Ok(());
            }
        };

        let state = Arc::clone(&state);
        let service = service_fn(move |req| {
            let state = Arc::clone(&state);
            async move { Ok::<_, Infallible>(dispatch(state, req).await) }
        });
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Connection error: {}", err);
            }
        });
    }
}
