use axum::{Router, routing::get};

use crate::api::handlers::{error, fallback, health, landing, proxy};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(landing::index))
        .route("/favicon.ico", get(landing::favicon))
        .route("/actuator/health", get(health::health))
        .route("/fallback/client1", get(fallback::client1_fallback))
        .route("/fallback/client2", get(fallback::client2_fallback))
        .route("/fallback/{service}", get(fallback::service_fallback))
        .route("/error", get(error::error_page))
        .fallback(proxy::proxy)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use axum::{
        body::{Body, Bytes, HttpBody, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::gateway::{
        AccessLogFilter, AuthorizedClient, FallbackRouter, JsonErrorRenderer, Pipeline,
        TokenRelayConfig, TokenRelayFilter,
        testing::{RecordingLog, StubForwarder, StubIssuer},
    };
    use crate::middleware;

    struct Harness {
        router: Router,
        forwarder: Arc<StubForwarder>,
        log: Arc<RecordingLog>,
    }

    fn harness(forwarder: StubForwarder, issuer: StubIssuer) -> Harness {
        harness_with_static(forwarder, issuer, PathBuf::from("no-such-static-dir"))
    }

    fn harness_with_static(
        forwarder: StubForwarder,
        issuer: StubIssuer,
        static_dir: PathBuf,
    ) -> Harness {
        let forwarder = Arc::new(forwarder);
        let log = Arc::new(RecordingLog::default());
        let renderer = Arc::new(JsonErrorRenderer::new(Some(30)));

        let pipeline = Pipeline::builder(forwarder.clone(), renderer.clone(), log.clone())
            .access_log(AccessLogFilter::new(log.clone()))
            .filter(TokenRelayFilter::new(
                TokenRelayConfig::default(),
                Arc::new(issuer),
            ))
            .build();

        let state = AppState::new(
            Arc::new(pipeline),
            FallbackRouter::new(Some(30)),
            renderer,
            header::HeaderName::from_static("x-authenticated-user"),
            1024,
            static_dir,
        );

        let router = middleware::principal::apply(routes(), state.clone()).with_state(state);
        let router = middleware::http::apply(router);

        Harness {
            router,
            forwarder,
            log,
        }
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_up_without_login() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = h
            .router
            .oneshot(Request::get("/actuator/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["status"], "UP");
        assert_eq!(h.forwarder.calls(), 0);
    }

    #[tokio::test]
    async fn anonymous_request_is_redirected_to_login() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = h
            .router
            .oneshot(Request::get("/orders/5").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/oauth2/authorization/azure"
        );
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(h.forwarder.calls(), 0);

        let exits = h.log.exits();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].0.status, Some(303));
    }

    #[tokio::test]
    async fn authenticated_request_carries_bearer_downstream() {
        let client = AuthorizedClient::new("azure", "alice", "t-123");
        let h = harness(StubForwarder::ok(), StubIssuer::with_client(client));

        let res = h
            .router
            .oneshot(
                Request::get("/orders/5?x=1")
                    .header("x-authenticated-user", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"downstream");

        let headers = h.forwarder.last_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer t-123");
        // trusted header never leaks downstream
        assert!(!headers.contains_key("x-authenticated-user"));

        let entries = h.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "x=1");
    }

    #[tokio::test]
    async fn fallback_endpoint_returns_degraded_body() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = h
            .router
            .oneshot(Request::get("/fallback/inventory").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "30");

        let body = json_body(res).await;
        assert_eq!(body["error"], "Service Temporarily Unavailable");
        assert_eq!(body["service"], "inventory");
        assert_eq!(body["status"], "fallback");
        assert_eq!(
            body["message"],
            "inventory service is currently experiencing issues. Please try again later."
        );
    }

    #[tokio::test]
    async fn named_fallback_uses_display_name() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = h
            .router
            .oneshot(Request::get("/fallback/client2").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(res).await;
        assert_eq!(body["service"], "client2");
        assert_eq!(
            body["message"],
            "Client2 service is currently experiencing issues. Please try again later."
        );
    }

    #[tokio::test]
    async fn error_page_renders_generic_failure() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = h
            .router
            .oneshot(Request::get("/error").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(res).await;
        assert_eq!(body["status"], 500);
        assert_eq!(body["path"], "/error");
        assert_eq!(body["error"], "Internal Server Error");
    }

    async fn send(router: Router, request: Request<Body>) -> axum::response::Response {
        router.oneshot(request).await.unwrap()
    }

    fn assert_json_error(res: &axum::response::Response, status: StatusCode) {
        assert_eq!(res.status(), status);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_the_pipeline() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        // streamed, nothing declared
        let res = send(
            h.router.clone(),
            Request::post("/orders")
                .header("x-authenticated-user", "alice")
                .body(Body::from(vec![b'a'; 4096]))
                .unwrap(),
        )
        .await;
        assert_json_error(&res, StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(res).await;
        assert_eq!(body["status"], 413);
        assert_eq!(body["path"], "/orders");

        // declared up front
        let res = send(
            h.router,
            Request::post("/orders")
                .header("x-authenticated-user", "alice")
                .header(header::CONTENT_LENGTH, "4096")
                .body(Body::from(vec![b'a'; 4096]))
                .unwrap(),
        )
        .await;
        assert_json_error(&res, StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(res).await;
        assert_eq!(body["error"], "Payload Too Large");
        assert_eq!(body["path"], "/orders");

        assert_eq!(h.forwarder.calls(), 0);
        assert!(h.log.entries().is_empty());
    }

    /// Yields one chunk, then fails like a client that hung up.
    struct BrokenBody {
        sent: bool,
    }

    impl HttpBody for BrokenBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<http_body::Frame<Bytes>, io::Error>>> {
            if self.sent {
                return Poll::Ready(Some(Err(io::Error::from(io::ErrorKind::ConnectionReset))));
            }
            self.sent = true;
            Poll::Ready(Some(Ok(http_body::Frame::data(Bytes::from_static(b"part")))))
        }
    }

    #[tokio::test]
    async fn interrupted_body_is_a_bad_request_not_too_large() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = send(
            h.router,
            Request::post("/orders")
                .header("x-authenticated-user", "alice")
                .body(Body::new(BrokenBody { sent: false }))
                .unwrap(),
        )
        .await;

        assert_json_error(&res, StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["message"], "The request body could not be read.");
        assert_eq!(h.forwarder.calls(), 0);
    }

    #[tokio::test]
    async fn dot_segments_are_resolved_before_the_gate() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        for path in ["/actuator/../orders/5", "/actuator/%2e%2e/orders/5"] {
            let res = send(
                h.router.clone(),
                Request::get(path).body(Body::empty()).unwrap(),
            )
            .await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER, "{path}");
        }
        assert_eq!(h.forwarder.calls(), 0);

        let entries = h.log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.uri == "/orders/5"));
    }

    #[tokio::test]
    async fn landing_page_falls_back_to_builtin_html() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = send(h.router, Request::get("/").body(Body::empty()).unwrap()).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(
            res.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/actuator/health"));
        assert_eq!(h.forwarder.calls(), 0);
    }

    #[tokio::test]
    async fn landing_page_and_favicon_come_from_static_dir() {
        let dir = std::env::temp_dir().join(format!("gateway-static-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>custom</h1>").unwrap();
        std::fs::write(dir.join("favicon.ico"), [0u8, 0, 1, 0]).unwrap();

        let h = harness_with_static(StubForwarder::ok(), StubIssuer::empty(), dir.clone());

        let res = send(h.router.clone(), Request::get("/").body(Body::empty()).unwrap()).await;
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>custom</h1>");

        let res = send(h.router, Request::get("/favicon.ico").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/x-icon");
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], &[0u8, 0, 1, 0]);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn missing_favicon_is_not_found() {
        let h = harness(StubForwarder::ok(), StubIssuer::empty());

        let res = send(h.router, Request::get("/favicon.ico").body(Body::empty()).unwrap()).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(h.forwarder.calls(), 0);
    }
}
