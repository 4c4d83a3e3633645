#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use relay_api::auth::jwt::{generate_access_token, JwtConfig};
use relay_api::config::{DispatchConfig, ServerConfig};
use relay_api::router::build_app_router;
use relay_api::state::AppState;
use relay_channel::{ChannelAdapter, ChannelSendError, OutboundRequest, SendReceipt};
use relay_core::retry::RetryPolicy;
use relay_core::roles::Role;
use relay_core::types::{DbId, TenantId};
use relay_core::webhook::{compute_signature, SIGNATURE_HEADER};
use relay_db::MemoryDeliveryStore;
use relay_storage::{LocalObjectStore, MediaStagingService};
use tokio::sync::Semaphore;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

// ---------------------------------------------------------------------------
// Scripted channel
// ---------------------------------------------------------------------------

/// Channel fake. Phones answer with their scripted outcomes in order and
/// succeed once the script runs out. With a gate, every send waits for a
/// permit released by the test.
#[derive(Default)]
pub struct ScriptedChannel {
    scripts: Mutex<HashMap<String, VecDeque<ChannelSendError>>>,
    requests: Mutex<Vec<OutboundRequest>>,
    attempts: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose sends block until [`release`](Self::release) is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Queue failures for the next sends to `phone`.
    pub fn script(&self, phone: &str, failures: Vec<ChannelSendError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(phone.to_string())
            .or_default()
            .extend(failures);
    }

    /// Let `n` gated sends proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Requests that reached the provider call, in order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Send attempts including retries.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedChannel {
    async fn send(&self, request: &OutboundRequest) -> Result<SendReceipt, ChannelSendError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.phone)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(err) => Err(err),
            None => Ok(SendReceipt {
                provider_message_id: format!("wamid.{attempt}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with a known webhook secret and a dispatch
/// budget fast enough that tests never wait on rate limiting or backoff.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        webhook_secret: WEBHOOK_SECRET.to_string(),
        jwt: JwtConfig {
            secret: "test-jwt-secret".to_string(),
            access_token_expiry_mins: 60,
        },
        dispatch: DispatchConfig {
            concurrency: 2,
            rate_per_sec: 1000.0,
            burst: 1000,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
            ..DispatchConfig::default()
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryDeliveryStore>,
    pub channel: Arc<ScriptedChannel>,
    pub media_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_channel(ScriptedChannel::new())
    }

    /// Build the full application router (same middleware stack as
    /// production) over an in-memory store and a local media directory.
    pub fn with_channel(channel: ScriptedChannel) -> Self {
        let config = test_config();
        let store = Arc::new(MemoryDeliveryStore::new());
        let channel = Arc::new(channel);
        let media_dir = tempfile::tempdir().unwrap();
        let staging = Arc::new(MediaStagingService::new(Arc::new(LocalObjectStore::new(
            media_dir.path(),
            "http://localhost:3000/media",
        ))));

        let state = AppState::new(store.clone(), channel.clone(), staging, config.clone());
        let router = build_app_router(state.clone(), &config);

        Self {
            router,
            state,
            store,
            channel,
            media_dir,
        }
    }

    /// Bearer token for a user of `tenant_id` holding `role`.
    pub fn token(&self, tenant_id: TenantId, role: Role) -> String {
        generate_access_token(1, tenant_id, role, &self.state.config.jwt).unwrap()
    }

    /// Wait until the campaign's dispatch has finished, if one is running.
    pub async fn wait_for_dispatch(&self, tenant_id: TenantId, campaign_id: DbId) {
        if let Some(handle) = self.state.dispatcher.registry().get(tenant_id, campaign_id) {
            tokio::time::timeout(Duration::from_secs(5), handle.finished())
                .await
                .expect("dispatch did not finish");
        }
    }

    /// Number of files written under the media directory.
    pub fn stored_media_files(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| {
                            let path = e.path();
                            if path.is_dir() {
                                count(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(self.media_dir.path())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json(
    app: &TestApp,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

/// POST a signed webhook body.
pub async fn post_webhook(app: &TestApp, body: serde_json::Value) -> Response<Body> {
    let bytes = body.to_string();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/channel")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, compute_signature(WEBHOOK_SECRET, bytes.as_bytes()))
        .body(Body::from(bytes))
        .unwrap();
    send(app, request).await
}

/// Build a multipart body with a single `file` part and an optional caption.
pub fn multipart_body(
    filename: &str,
    content_type: &str,
    bytes: &[u8],
    caption: Option<&str>,
) -> (String, Vec<u8>) {
    let boundary = "relay-test-boundary";
    let mut body = Vec::new();
    if let Some(caption) = caption {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\n{caption}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub async fn post_multipart(
    app: &TestApp,
    uri: &str,
    token: &str,
    content_type: String,
    body: Vec<u8>,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit a campaign over HTTP and return its id.
pub async fn submit_campaign(app: &TestApp, tenant_id: TenantId, phones: &[&str]) -> DbId {
    let token = app.token(tenant_id, Role::Operator);
    let response = post_json(
        app,
        "/api/v1/campaigns",
        Some(&token),
        serde_json::json!({
            "name": "Preventa Torre Norte",
            "template_name": "launch_v2",
            "recipients": phones,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["campaign"]["id"]
        .as_i64()
        .unwrap()
}
