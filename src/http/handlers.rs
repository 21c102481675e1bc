//! HTTP handlers

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::extract_credentials;
use crate::error::{AuthError, RelayError};
use crate::http::server::AppState;
use crate::relay::{RelayStatus, Subscription};

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::AlreadyActive => {
                (StatusCode::CONFLICT, "Stream already active").into_response()
            }
            RelayError::NoActiveStream | RelayError::StreamEnded => {
                (StatusCode::SERVICE_UNAVAILABLE, "No active stream").into_response()
            }
        }
    }
}

fn unauthorized(realm: &str, message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{realm}\""))],
        message,
    )
        .into_response()
}

/// Query parameters accepted on the ingest path
#[derive(Debug, serde::Deserialize)]
pub struct SourceParams {
    pub password: Option<String>,
}

/// Publisher ingest: `POST /stream` or `PUT /stream`
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Option<Query<SourceParams>>,
    body: Body,
) -> Response {
    let slot = match state.relay.try_admit_publisher() {
        Ok(slot) => slot,
        Err(e) => {
            tracing::warn!("Publisher rejected: a stream is already active");
            return e.into_response();
        }
    };

    let password = params.as_ref().and_then(|Query(p)| p.password.as_deref());
    let credentials = match extract_credentials(&headers, password) {
        Ok(credentials) => credentials,
        Err(_) => {
            tracing::warn!("Publisher rejected: no credentials");
            return unauthorized(&state.realm, "Unauthorized - no credentials");
        }
    };

    if let Err(e) = state.authenticator.authenticate(&credentials).await {
        match &e {
            AuthError::Rejected(_) => {
                tracing::warn!(account = %credentials.name, "Authentication failed: {}", e)
            }
            _ => tracing::error!(account = %credentials.name, "Authentication failed: {}", e),
        }
        return unauthorized(&state.realm, "Unauthorized");
    }

    let mut session = slot.begin(&credentials.name);
    tracing::info!(
        session = session.handle().number(),
        publisher = %session.publisher(),
        "Publisher connected"
    );

    let mut frames = body.into_data_stream();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(data) => session.push(data),
            Err(e) => {
                tracing::info!(publisher = %session.publisher(), "Publisher read ended: {}", e);
                break;
            }
        }
    }
    drop(session);

    (StatusCode::OK, "Stream ended").into_response()
}

/// Logs a listener that leaves before its session produced data
struct PendingListener {
    session: u64,
    waiting: bool,
}

impl Drop for PendingListener {
    fn drop(&mut self) {
        if self.waiting {
            tracing::info!(session = self.session, "Listener left before stream started");
        }
    }
}

/// Listener egress: `GET /listen`
pub async fn listen(State(state): State<Arc<AppState>>) -> Response {
    let session = state.relay.session().current();
    let mut pending = PendingListener {
        session: session.number(),
        waiting: true,
    };

    let admitted = match state.relay.wait_for_stream(&session).await {
        Ok(()) => state.relay.subscribe(session),
        Err(e) => Err(e),
    };
    pending.waiting = false;

    let (subscription, catchup) = match admitted {
        Ok(admitted) => admitted,
        Err(e) => {
            tracing::info!(session = pending.session, "Listener rejected: {}", e);
            return e.into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(listener_stream(subscription, catchup)),
    )
        .into_response()
}

/// Catch-up data first, then live chunks until the session ends
fn listener_stream(
    subscription: Subscription,
    catchup: Bytes,
) -> impl stream::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let first = (!catchup.is_empty()).then_some(catchup);

    stream::unfold((subscription, first), |(mut subscription, first)| async move {
        let chunk = match first {
            Some(chunk) => chunk,
            None => subscription.next_chunk().await?,
        };
        Some((Ok::<_, Infallible>(chunk), (subscription, None)))
    })
}

/// Relay status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<RelayStatus>> {
    Json(ApiResponse::ok(state.relay.status()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Authenticator, Credentials};
    use crate::config::{RelayConfig, ServerConfig};
    use crate::http::WebServer;
    use crate::relay::Relay;
    use async_trait::async_trait;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Accepts a single fixed account
    struct StaticAuthenticator;

    #[async_trait]
    impl Authenticator for StaticAuthenticator {
        async fn authenticate(&self, credentials: &Credentials) -> Result<(), AuthError> {
            if credentials.name == "dj" && credentials.secret == "hunter2" {
                Ok(())
            } else {
                Err(AuthError::Rejected(Some("bad passphrase".into())))
            }
        }
    }

    fn server() -> (WebServer, Arc<Relay>) {
        let relay = Arc::new(Relay::new(RelayConfig::default()));
        let config = ServerConfig {
            realm: "Studio".into(),
            ..ServerConfig::default()
        };
        let server = WebServer::new(config, relay.clone(), Arc::new(StaticAuthenticator));
        (server, relay)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_conflict_when_active() {
        let (server, relay) = server();
        let _held = relay.try_admit_publisher().unwrap();

        let response = server
            .router()
            .oneshot(
                Request::post("/stream")
                    .header("x-source-password", "dj:hunter2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(relay.session().is_active());
    }

    #[tokio::test]
    async fn test_ingest_without_credentials() {
        let (server, relay) = server();

        let response = server
            .router()
            .oneshot(Request::put("/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Studio\""
        );
        assert!(!relay.session().is_active());
    }

    #[tokio::test]
    async fn test_ingest_rejected_credentials() {
        let (server, relay) = server();

        let response = server
            .router()
            .oneshot(
                Request::post("/stream?password=dj:wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        let text = body_text(response).await;
        assert!(!text.contains("bad passphrase"));
        assert!(!relay.session().is_active());
        assert_eq!(relay.session().info().number, 1);
    }

    #[tokio::test]
    async fn test_ingest_publishes_body() {
        let (server, relay) = server();

        let response = server
            .router()
            .oneshot(
                Request::post("/stream")
                    .header("x-source-password", "dj:hunter2")
                    .body(Body::from(vec![7u8; 3000]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let status = relay.status();
        assert_eq!(status.bytes_published, 3000);
        assert_eq!(status.chunks_published, 3);
        // Session ended with the body, so history is gone
        assert!(!status.active);
        assert_eq!(status.history_bytes, 0);
    }

    #[tokio::test]
    async fn test_listen_rejected_when_publisher_ends_without_data() {
        let (server, relay) = server();
        let router = server.router();

        let listener = tokio::spawn(async move {
            router
                .oneshot(Request::get("/listen").body(Body::empty()).unwrap())
                .await
                .unwrap()
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let session = relay.try_admit_publisher().unwrap().begin("dj");
        drop(session);

        let response = tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_idle_listener_rejected_when_next_publisher_begins() {
        let (server, relay) = server();

        let mut first = relay.try_admit_publisher().unwrap().begin("first");
        first.push(Bytes::from_static(b"earlier show"));
        drop(first);

        let router = server.router();
        let listener = tokio::spawn(async move {
            router
                .oneshot(Request::get("/listen").body(Body::empty()).unwrap())
                .await
                .unwrap()
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut second = relay.try_admit_publisher().unwrap().begin("second");
        second.push(Bytes::from_static(b"new show"));

        let response = tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(relay.status().subscribers, 0);
    }

    #[tokio::test]
    async fn test_waiting_listener_disconnect_leaves_nothing_registered() {
        let (server, relay) = server();

        let router = server.router();
        let waiting = tokio::spawn(async move {
            router
                .oneshot(Request::get("/listen").body(Body::empty()).unwrap())
                .await
                .unwrap()
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());
        assert_eq!(relay.status().subscribers, 0);

        let mut session = relay.try_admit_publisher().unwrap().begin("dj");
        session.push(Bytes::from_static(b"still works"));

        let response = server
            .router()
            .oneshot(Request::get("/listen").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(relay.status().subscribers, 1);

        drop(session);
        assert_eq!(body_text(response).await, "still works");
        assert_eq!(relay.status().subscribers, 0);
    }

    #[tokio::test]
    async fn test_listen_receives_catchup_then_live() {
        let (server, relay) = server();
        let mut session = relay.try_admit_publisher().unwrap().begin("dj");
        session.push(Bytes::from_static(b"hello "));

        let response = server
            .router()
            .oneshot(Request::get("/listen").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        session.push(Bytes::from_static(b"world"));
        drop(session);

        assert_eq!(body_text(response).await, "hello world");
    }

    #[tokio::test]
    async fn test_status_envelope() {
        let (server, _relay) = server();

        let response = server
            .router()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["active"], false);
        assert_eq!(json["data"]["history_capacity"], 128 * 1024);
        assert_eq!(json["data"]["history_total_bytes"], 0);
        assert!(json["data"].get("publisher").is_none());
    }
}
