use anyhow::{bail, Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use hashdex::persist::IndexPaths;
use hashdex::{DocId, IndexReader, PostingsList, QueryMode, Searcher};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub mode: QueryMode,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: QueryMode,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub name: String,
    pub length: u32,
    pub positions: Vec<u32>,
}

#[derive(Serialize)]
pub struct PostingsResponse {
    pub token: String,
    pub postings: PostingsList,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_id: DocId,
    pub name: String,
    pub length: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<IndexReader>,
}

type ApiError = (StatusCode, String);

fn internal(e: hashdex::Error) -> ApiError {
    tracing::error!(error = %e, "index read failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Socket address for `--host` and `--port`. Hosts are IP literals, so IPv6
/// works without brackets.
pub fn listen_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .with_context(|| format!("invalid host {host:?}"))?;
    Ok(SocketAddr::new(ip, port))
}

pub fn build_app(index_dir: impl AsRef<std::path::Path>) -> Result<Router> {
    let paths = IndexPaths::new(index_dir.as_ref());
    if !paths.is_finalized() {
        bail!("no finalized index in {}", paths.root.display());
    }
    let reader = IndexReader::open(&paths, hashdex::config::DEFAULT_CACHE_CAPACITY)
        .with_context(|| format!("opening index {}", paths.root.display()))?;
    let app_state = AppState { reader: Arc::new(reader) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/postings/:token", get(postings_handler))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn postings_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PostingsResponse>, ApiError> {
    match state.reader.get_postings(&token).map_err(internal)? {
        Some(list) => Ok(Json(PostingsResponse { token, postings: list.as_ref().clone() })),
        None => Err((StatusCode::NOT_FOUND, format!("token {token:?} not indexed"))),
    }
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let hits = Searcher::new(&state.reader).search(&params.q, params.mode).map_err(internal)?;

    let k = params.k.clamp(1, 100);
    let results = hits
        .iter()
        .take(k)
        .map(|entry| {
            let doc = state.reader.doc(entry.doc_id);
            SearchHit {
                doc_id: entry.doc_id,
                name: doc.map(|d| d.name.clone()).unwrap_or_default(),
                length: doc.map(|d| d.length).unwrap_or_default(),
                positions: entry.positions.clone(),
            }
        })
        .collect();

    Ok(Json(SearchResponse {
        query: params.q,
        mode: params.mode,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: hits.len(),
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<DocResponse>, ApiError> {
    match state.reader.doc(doc_id) {
        Some(meta) => Ok(Json(DocResponse { doc_id, name: meta.name.clone(), length: meta.length })),
        None => Err((StatusCode::NOT_FOUND, "not found".into())),
    }
}
