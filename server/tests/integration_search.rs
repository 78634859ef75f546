use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use hashdex::{Index, IndexConfig, PersistentIndex};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path) {
    let docs = [
        ("doc0.txt", "rust is great for systems programming"),
        ("doc1.txt", "learning rust systems"),
        ("doc2.txt", "systems rust"),
    ];
    let mut index = PersistentIndex::open(IndexConfig::new(dir).with_threshold(2)).unwrap();
    for (doc_id, (name, text)) in docs.iter().enumerate() {
        let tokens = hashdex::tokenizer::tokenize(text);
        for (token, pos) in &tokens {
            index.insert(token, doc_id as u32, *pos).unwrap();
        }
        index.record_document(doc_id as u32, name, tokens.len() as u32);
    }
    index.cleanup().unwrap();
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

fn app(dir: &std::path::Path) -> Router {
    server::build_app(dir).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let (status, body) = call(app(dir.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn postings_route_serves_stored_lists() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/postings/rust").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let postings = json["postings"].as_array().unwrap();
    assert_eq!(postings.len(), 3);
    assert_eq!(postings[0]["doc_id"], 0);
    assert_eq!(postings[0]["positions"], serde_json::json!([0]));
    assert_eq!(postings[2]["positions"], serde_json::json!([1]));

    let (status, _) = call(app(dir.path()), "/postings/haskell").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_supports_both_modes() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/search?q=rust%20systems").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 3);
    assert_eq!(json["results"][1]["name"], "doc1.txt");

    let (status, body) = call(app(dir.path()), "/search?q=rust%20systems&mode=phrase&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let ids: Vec<u64> = json["results"].as_array().unwrap().iter().map(|h| h["doc_id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1]);
}

#[tokio::test]
async fn doc_route_reports_metadata() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/doc/2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["name"], "doc2.txt");
    assert_eq!(json["length"], 2);

    let (status, _) = call(app(dir.path()), "/doc/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn missing_index_fails_to_start() {
    let dir = tempdir().unwrap();
    assert!(server::build_app(dir.path()).is_err());
}

#[test]
fn listen_addr_accepts_ipv4_and_ipv6_hosts() {
    assert_eq!(server::listen_addr("0.0.0.0", 8080).unwrap().to_string(), "0.0.0.0:8080");
    assert_eq!(server::listen_addr("::1", 3000).unwrap().to_string(), "[::1]:3000");
    assert_eq!(server::listen_addr("[::1]", 3000).unwrap().to_string(), "[::1]:3000");
    assert!(server::listen_addr("not a host", 80).is_err());
}
