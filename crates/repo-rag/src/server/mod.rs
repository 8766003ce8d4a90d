//! HTTP server for the RAG agent

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new RAG server
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create from prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Start the server and run until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state.clone());

        tracing::info!("Starting RAG server on http://{}", addr);
        tracing::info!("API info: http://{}/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(drain_on(ctrl_c(), self.state.clone()))
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        self.state.store().flush().await?;
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let server = &state.config().server;
    let max_upload_size = server.max_upload_size;
    let enable_cors = server.enable_cors;

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes(max_upload_size))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Wait for `signal`, then report not ready while in-flight requests drain
async fn drain_on(signal: impl Future<Output = ()>, state: AppState) {
    signal.await;
    tracing::info!("Shutdown signal received");
    state.set_ready(false);
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if state.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;
    use crate::index::VectorStore;
    use crate::providers::{EmbeddingProvider, LlmProvider};
    use crate::testing::{FailingEmbedder, LetterEmbedder, ScriptedLlm};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        dir: tempfile::TempDir,
        state: AppState,
    }

    fn test_app(github_base: Option<String>, llm: Option<Arc<dyn LlmProvider>>) -> TestApp {
        test_app_with(github_base, llm, Arc::new(LetterEmbedder))
    }

    fn test_app_with(
        github_base: Option<String>,
        llm: Option<Arc<dyn LlmProvider>>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.data.data_dir = dir.path().to_path_buf();
        if let Some(base) = github_base {
            config.github = GitHubConfig {
                api_base: base.clone(),
                raw_base: format!("{}/raw", base),
                token: None,
                timeout_secs: 5,
            };
        }

        let store = VectorStore::open(config.data.index_dir()).unwrap();
        let state = AppState::from_parts(config, Arc::new(store), embedder, llm).unwrap();
        TestApp { dir, state }
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let app = test_app(None, None);

        let (status, body) = send(&app.state, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "GS RAG Agent is running!");

        let response = build_router(app.state.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        app.state.set_ready(false);
        let response = build_router(app.state.clone())
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_sync_without_ingest_is_rejected() {
        let app = test_app(None, None);
        let (status, body) = send(&app.state, Request::post("/sync").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "not_ingested");
    }

    #[tokio::test]
    async fn test_query_without_llm_is_unavailable() {
        let app = test_app(None, None);
        let (status, body) = send(&app.state, post_json("/query", json!({"query": "hi"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["type"], "llm_error");
    }

    #[tokio::test]
    async fn test_upload_then_query() {
        let llm = Arc::new(ScriptedLlm::new(" Events drive workflows. "));
        let app = test_app(None, Some(llm.clone() as Arc<dyn LlmProvider>));

        let boundary = "repo-rag-boundary";
        let multipart = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.md\"\r\nContent-Type: text/markdown\r\n\r\nGodspeed events drive workflows\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::post("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(multipart))
            .unwrap();

        let (status, body) = send(&app.state, request).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["message"], "File 'notes.md' saved and ingested successfully.");
        assert!(app.dir.path().join("uploads").join("notes.md").exists());

        let (status, body) = send(&app.state, post_json("/query", json!({"query": "events", "top_k": 3}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Events drive workflows.");
        let source = body["sources"][0].as_str().unwrap();
        assert!(source.ends_with("notes.md"));

        let (status, body) = send(&app.state, Request::get("/documents").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
    }

    fn upload_request(file_name: &str, body: &str) -> Request<Body> {
        let boundary = "repo-rag-boundary";
        let multipart = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{body}\r\n--{b}--\r\n",
            b = boundary,
            name = file_name,
            body = body
        );
        Request::post("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(multipart))
            .unwrap()
    }

    #[tokio::test]
    async fn test_reupload_replaces_file_and_updates_document() {
        let app = test_app(None, None);
        let saved = app.dir.path().join("uploads").join("guide.txt");
        let doc_id = saved.display().to_string();

        let (status, _) = send(&app.state, upload_request("guide.txt", "install the cli")).await;
        assert_eq!(status, StatusCode::OK);
        let first = app.state.store().get_document(&doc_id).unwrap();

        let (status, body) = send(&app.state, upload_request("guide.txt", "configure the events")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(std::fs::read_to_string(&saved).unwrap(), "configure the events");

        let second = app.state.store().get_document(&doc_id).unwrap();
        assert_eq!(second.content, "configure the events");
        assert_ne!(second.content_hash, first.content_hash);
        assert_eq!(app.state.store().len(), 1);
        assert!(!app.state.store().is_dirty());
    }

    #[tokio::test]
    async fn test_upload_with_embedding_outage_is_unavailable() {
        let app = test_app_with(None, None, Arc::new(FailingEmbedder));

        let (status, body) = send(&app.state, upload_request("notes.md", "some notes")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["type"], "embedding_error");
    }

    #[tokio::test]
    async fn test_delete_document() {
        let app = test_app(None, None);
        app.state
            .store()
            .upsert("docs/a.md", "alpha words", &LetterEmbedder, &crate::ingestion::WordChunker::default())
            .await
            .unwrap();

        let delete = || Request::delete("/documents/docs/a.md").body(Body::empty()).unwrap();
        let (status, body) = send(&app.state, delete()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Document 'docs/a.md' deleted");
        assert!(app.state.store().is_empty());
        assert!(VectorStore::open(app.dir.path().join("index")).unwrap().is_empty());

        let (status, body) = send(&app.state, delete()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "not_found");
    }

    #[tokio::test]
    async fn test_shutdown_marks_not_ready() {
        let app = test_app(None, None);
        drain_on(async {}, app.state.clone()).await;

        assert!(!app.state.is_ready());
        let response = build_router(app.state.clone())
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_extension() {
        let app = test_app(None, None);
        let boundary = "b";
        let multipart = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"tool.exe\"\r\n\r\nMZ\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::post("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(multipart))
            .unwrap();

        let (status, body) = send(&app.state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "unsupported_type");
    }

    #[tokio::test]
    async fn test_token_endpoint() {
        let app = test_app(None, None);
        let (status, body) = send(&app.state, post_json("/token", json!({"Github_token": "ghp_abc"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "GitHub token saved");

        let (status, _) = send(&app.state, post_json("/token", json!({"Github_token": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_then_sync() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/acme/docs/commits/main");
                then.status(200).json_body(json!({"sha": "c1"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/acme/docs/git/trees/main");
                then.status(200).json_body(json!({
                    "tree": [{"path": "README.md", "type": "blob"}]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/raw/acme/docs/main/README.md");
                then.status(200).body("Welcome to the docs");
            })
            .await;

        let app = test_app(Some(server.base_url()), None);

        let (status, body) = send(
            &app.state,
            post_json("/ingest", json!({"repo_url": "https://github.com/acme/docs"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["message"], "Repo ingested successfully");
        assert_eq!(body["added"], 1);
        assert!(app.dir.path().join("repo_url.json").exists());

        let (status, body) = send(&app.state, Request::post("/sync").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Synced successfully");
        assert_eq!(body["up_to_date"], true);

        let (status, body) = send(
            &app.state,
            Request::get("/documents/README.md").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["doc_id"], "README.md");
    }
}
