//! End-to-end tests for the HTTP surface: login, gate and protected routes

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::AUTHORIZATION;
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use webblog_core::auth::{
    AuthConfig, CredentialHasher, LoginService, PrincipalResolver, TokenCodec,
};
use webblog_core::{LoginIdentifier, Principal, Result, SubjectId, Timestamp};
use webblog_engine::{PrincipalStore, StorageEngine};
use webblog_server::{handle_request, AppState, AuthGate, WebblogServer};

const SECRET: &str = "http-api-test-secret-0123456789abcdef";

struct Harness {
    state: AppState,
    codec: Arc<TokenCodec>,
    _engine: StorageEngine,
    _temp: tempfile::TempDir,
}

/// Delays every lookup, standing in for a slow credential store
struct SlowResolver {
    inner: PrincipalStore,
    delay: Duration,
}

impl PrincipalResolver for SlowResolver {
    fn resolve_by_login_identifier(&self, identifier: &str) -> Result<Option<Principal>> {
        std::thread::sleep(self.delay);
        self.inner.resolve_by_login_identifier(identifier)
    }
}

fn harness() -> Harness {
    harness_with(|store| Arc::new(store) as Arc<dyn PrincipalResolver>)
}

fn harness_with(wrap: impl FnOnce(PrincipalStore) -> Arc<dyn PrincipalResolver>) -> Harness {
    let (engine, temp) = StorageEngine::temp().unwrap();
    let store = engine.principals().unwrap();
    let hasher = CredentialHasher::fast();

    store
        .register(&Principal::new(
            SubjectId::new("bob").unwrap(),
            vec![LoginIdentifier::new("bob@example.com").unwrap()],
            hasher.hash("hunter22").unwrap(),
        ))
        .unwrap();

    let resolver = wrap(store);
    let codec = Arc::new(TokenCodec::new(&AuthConfig::new(SECRET, 60_000).unwrap()));
    let login = LoginService::with_hasher(resolver.clone(), codec.clone(), &hasher).unwrap();
    let login = Arc::new(login);
    let gate = Arc::new(AuthGate::new(codec.clone(), resolver));

    Harness {
        state: AppState::new(gate, login),
        codec,
        _engine: engine,
        _temp: temp,
    }
}

fn request(
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    body: &str,
) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

async fn call(h: &Harness, req: Request<Full<Bytes>>) -> (StatusCode, Value) {
    let response = handle_request(req, h.state.clone()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn login(h: &Harness, login: &str, password: &str) -> (StatusCode, Value) {
    let body = json!({ "login": login, "password": password }).to_string();
    call(h, request(Method::POST, "/api/auth/login", None, &body)).await
}

#[tokio::test]
async fn test_login_with_mail_returns_token() {
    let h = harness();
    let (status, json) = login(&h, "bob@example.com", "hunter22").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["token_type"], "Bearer");
    assert_eq!(json["data"]["expires_in"], 60_000);
    assert_eq!(json["data"]["username"], "bob");
    assert_eq!(json["data"]["mail"], "bob@example.com");

    let token = json["data"]["access_token"].as_str().unwrap();
    assert!(h.codec.validate(token));
    assert_eq!(h.codec.subject_of(token).unwrap().as_str(), "bob");
}

#[tokio::test]
async fn test_login_failures_are_identical() {
    let h = harness();
    let (wrong_status, wrong_secret) = login(&h, "bob", "not-the-password").await;
    let (unknown_status, unknown_user) = login(&h, "mallory", "hunter22").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_secret, unknown_user);
    assert_eq!(wrong_secret, json!({"success": false, "message": "Invalid credentials"}));
}

#[tokio::test]
async fn test_login_validation() {
    let h = harness();

    let (status, json) = login(&h, "ab", "123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json["message"].as_str().unwrap();
    assert!(message.starts_with("Validation failed: "));
    assert!(message.contains("login:"));
    assert!(message.contains("password:"));

    let (status, _) = call(&h, request(Method::POST, "/api/auth/login", None, "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let h = harness();
    let (status, json) = call(&h, request(Method::GET, "/api/auth/me", None, "")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json, json!({"success": false, "message": "Unauthorized access"}));
}

#[tokio::test]
async fn test_me_with_issued_token() {
    let h = harness();
    let (_, json) = login(&h, "bob", "hunter22").await;
    let token = json["data"]["access_token"].as_str().unwrap();

    let (status, json) = call(
        &h,
        request(Method::GET, "/api/auth/me", Some(&format!("Bearer {}", token)), ""),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], "bob");
    assert_eq!(json["data"]["mail"], "bob@example.com");
    assert!(json["data"]["created_at"].is_string());
}

#[tokio::test]
async fn test_me_with_expired_token() {
    let h = harness();
    let subject = SubjectId::new("bob").unwrap();
    let token = h.codec.issue(&subject, Timestamp::from_millis(1_000)).unwrap();

    let (status, _) = call(
        &h,
        request(Method::GET, "/api/auth/me", Some(&format!("Bearer {}", token)), ""),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_routes_ignore_bad_credentials() {
    let h = harness();

    let health = request(Method::GET, "/api/health", Some("Bearer garbage"), "");
    let (status, json) = call(&h, health).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "UP");

    // A stale header must not block logging in again
    let (status, _) = call(
        &h,
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(AUTHORIZATION, "Bearer garbage")
            .body(Full::new(Bytes::from(
                json!({"login": "bob", "password": "hunter22"}).to_string(),
            )))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route() {
    let h = harness();
    let (status, json) = call(&h, request(Method::GET, "/api/nothing", None, "")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_health_over_tcp() {
    let h = harness();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server = WebblogServer::new(h.state.clone());
    let serving = tokio::spawn(server.serve_listener(listener, async {
        let _ = shutdown_rx.await;
    }));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK"));
    assert!(raw.contains("application/json"));
    assert!(raw.contains("\"status\":\"UP\""));

    shutdown_tx.send(()).unwrap();
    serving.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_lookups_do_not_stall_other_requests() {
    let h = harness_with(|store| {
        Arc::new(SlowResolver {
            inner: store,
            delay: Duration::from_millis(800),
        }) as Arc<dyn PrincipalResolver>
    });
    let subject = SubjectId::new("bob").unwrap();
    let authorization = format!("Bearer {}", h.codec.issue(&subject, Timestamp::now()).unwrap());

    // More in-flight lookups than worker threads
    let in_flight: Vec<_> = (0..6)
        .map(|_| {
            let state = h.state.clone();
            let req = request(Method::GET, "/api/auth/me", Some(&authorization), "");
            tokio::spawn(async move { handle_request(req, state).await.unwrap().status() })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    let state = h.state.clone();
    let health = request(Method::GET, "/api/health", None, "");
    let status = tokio::spawn(async move { handle_request(health, state).await.unwrap().status() })
        .await
        .unwrap();
    let waited = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert!(waited < Duration::from_millis(300), "health check waited {:?}", waited);

    for task in in_flight {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }
}
