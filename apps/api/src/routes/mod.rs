pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::profile::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/resume/generate-profile",
            post(handlers::handle_generate_profile),
        )
        .route("/api/v1/resume/to-text", post(handlers::handle_resume_to_text))
        .route(
            "/api/v1/profiles/:key/html-url",
            get(handlers::handle_get_html_url),
        )
        .route(
            "/api/v1/profiles/:key",
            delete(handlers::handle_delete_profile),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::PipelineSettings;
    use crate::extraction::PdfTextExtractor;
    use crate::llm_client::LlmClient;
    use crate::pipeline::ProfilePipeline;
    use crate::rendering::NodeSiteRenderer;
    use crate::storage::{ArtifactStore, MemoryArtifactStore};
    use crate::structuring::LlmContentStructurer;

    const BOUNDARY: &str = "profile-test-boundary";

    /// Router over an in-memory store. None of these tests reach the language
    /// model or the renderer.
    fn app() -> (Router, Arc<MemoryArtifactStore>) {
        let store = Arc::new(MemoryArtifactStore::new("", "https://cdn.test"));
        let llm = LlmClient::new("test-key".to_string()).unwrap();
        let settings = PipelineSettings::default();
        let pipeline = ProfilePipeline::new(
            store.clone(),
            Arc::new(PdfTextExtractor::new(store.clone())),
            Arc::new(LlmContentStructurer::new(llm.clone())),
            Arc::new(NodeSiteRenderer::new(
                "node",
                "build-standalone.js",
                ".",
                Duration::from_secs(5),
            )),
            settings.clone(),
        );
        let state = AppState {
            pipeline,
            store: store.clone(),
            llm,
            settings,
        };
        (build_router(state), store)
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, content_type, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"cv.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_generate_profile_requires_key_field() {
        let (app, store) = app();
        let request = multipart(
            "/api/v1/resume/generate-profile",
            &[Part::File("file", "application/pdf", b"%PDF")],
        );

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_profile_requires_file_field() {
        let (app, _) = app();
        let request = multipart("/api/v1/resume/generate-profile", &[Part::Text("key", "demo1")]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_profile_rejects_bad_key_before_storage() {
        let (app, store) = app();
        let request = multipart(
            "/api/v1/resume/generate-profile",
            &[
                Part::Text("key", "../etc"),
                Part::File("file", "application/pdf", b"%PDF"),
            ],
        );

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_profile_rejects_non_pdf() {
        let (app, store) = app();
        let request = multipart(
            "/api/v1/resume/generate-profile",
            &[
                Part::Text("key", "demo1"),
                Part::File("file", "text/plain", b"plain resume"),
            ],
        );

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_to_text_rejects_non_pdf() {
        let (app, _) = app();
        let request = multipart(
            "/api/v1/resume/to-text",
            &[Part::File("file", "image/png", b"\x89PNG")],
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_html_url_for_missing_profile_is_not_found() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get("/api/v1/profiles/demo1/html-url")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "STORAGE_ERROR");
        assert_eq!(body["error"]["message"], "The requested artifact does not exist");
    }

    #[tokio::test]
    async fn test_html_url_presigns_existing_profile() {
        let (app, store) = app();
        store
            .put("demo1/demo1.html", Bytes::from_static(b"<html/>"), "text/html")
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::get("/api/v1/profiles/demo1/html-url")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["html_path"], "demo1/demo1.html");
        assert_eq!(body["html_url"], "memory://demo1/demo1.html?expires_in=3600");
        assert_eq!(body["html_url_expires_in"], 3600);
    }

    #[tokio::test]
    async fn test_delete_removes_every_artifact() {
        let (app, store) = app();
        for path in ["demo1/demo1.pdf", "demo1/config/zh.yaml", "demo1/demo1.html"] {
            store
                .put(path, Bytes::from_static(b"x"), "application/octet-stream")
                .await
                .unwrap();
        }
        store
            .put("other/other.pdf", Bytes::from_static(b"x"), "application/pdf")
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::delete("/api/v1/profiles/demo1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.len(), 1);
        assert!(store.object("other/other.pdf").is_some());
    }
}
