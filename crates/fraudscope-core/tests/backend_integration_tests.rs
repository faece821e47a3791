//! Integration tests against an in-process mock backend.
//!
//! Exercises the real HTTP client: bearer injection, refresh-and-retry on
//! 401, refresh failure, and cache invalidation after mutations.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fraudscope_core::auth::{MemoryStorage, TokenPair};
use fraudscope_core::models::CreateTransactionRequest;
use fraudscope_core::queries::transactions;
use fraudscope_core::{ApiError, AppContext};
use serde_json::{json, Value};

// == Mock Backend ==

const REFRESH_TOKEN: &str = "refresh-1";

struct Backend {
    access_token: Mutex<String>,
    refresh_ok: AtomicBool,
    refresh_delay_ms: AtomicU64,
    refresh_calls: AtomicUsize,
    list_calls: AtomicUsize,
    seen_bearers: Mutex<Vec<String>>,
    transactions: Mutex<Vec<Value>>,
}

type Shared = Arc<Backend>;

impl Backend {
    fn new() -> Shared {
        Arc::new(Backend {
            access_token: Mutex::new("access-0".to_string()),
            refresh_ok: AtomicBool::new(true),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            seen_bearers: Mutex::new(Vec::new()),
            transactions: Mutex::new(Vec::new()),
        })
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let token = bearer(headers);
        if let Some(token) = &token {
            self.seen_bearers.lock().unwrap().push(token.clone());
        }
        token.as_deref() == Some(self.access_token.lock().unwrap().as_str())
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "message": "Token has expired"})),
    )
        .into_response()
}

fn user() -> Value {
    json!({
        "id": 1, "email": "ana@example.com", "username": "ana",
        "first_name": "Ana", "last_name": "Diallo", "is_active": true,
        "created_at": "2025-01-01T00:00:00", "last_login": null
    })
}

async fn login(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["password"] != "secret" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "Invalid credentials"})),
        )
            .into_response();
    }
    let access = backend.access_token.lock().unwrap().clone();
    Json(json!({
        "success": true,
        "message": "Login successful",
        "data": {"access_token": access, "refresh_token": REFRESH_TOKEN, "user": user()}
    }))
    .into_response()
}

async fn refresh(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let n = backend.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let delay = backend.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if !backend.refresh_ok.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "message": "Refresh store unavailable"})),
        )
            .into_response();
    }
    if bearer(&headers).as_deref() != Some(REFRESH_TOKEN) {
        return unauthorized();
    }
    let access = format!("access-{}", n);
    *backend.access_token.lock().unwrap() = access.clone();
    Json(json!({"success": true, "data": {"access_token": access}})).into_response()
}

async fn me(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"success": true, "data": user()})).into_response()
}

async fn list_transactions(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    backend.list_calls.fetch_add(1, Ordering::SeqCst);
    let data = backend.transactions.lock().unwrap().clone();
    let total = data.len();
    Json(json!({
        "success": true,
        "data": data,
        "count": total,
        "pagination": {
            "page": 1, "pages": 1, "per_page": 20, "total": total,
            "has_next": false, "has_prev": false
        }
    }))
    .into_response()
}

async fn create_transaction(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let mut transactions = backend.transactions.lock().unwrap();
    let id = transactions.len() as i64 + 1;
    if let Value::Object(map) = &mut body {
        map.insert("id".into(), json!(id));
        map.insert("user_id".into(), json!(1));
        map.insert("potential_fraud".into(), json!(0));
        map.insert("prediction".into(), Value::Null);
        map.insert("prediction_proba".into(), Value::Null);
        map.insert("created_at".into(), json!("2025-01-01T00:00:00"));
        map.insert("updated_at".into(), json!("2025-01-01T00:00:00"));
    }
    transactions.push(body.clone());
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Transaction created", "data": body})),
    )
        .into_response()
}

async fn stats(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let count = backend.transactions.lock().unwrap().len();
    Json(json!({
        "success": true,
        "stats": {
            "total_transactions": count, "total_amount": 0.0, "average_amount": 0.0,
            "max_amount": 0.0, "fraudulent": 0, "legitimate": count, "fraud_rate": 0.0
        }
    }))
    .into_response()
}

async fn always_rejected(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    backend.authorized(&headers);
    unauthorized()
}

async fn missing(Path(id): Path<i64>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "message": format!("Transaction {} not found", id)})),
    )
        .into_response()
}

async fn spawn_backend(backend: Shared) -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/stats", get(stats))
        .route("/transactions/:id", get(missing))
        .route("/predict/status", get(always_rejected))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn setup() -> (Shared, AppContext) {
    let backend = Backend::new();
    let base_url = spawn_backend(backend.clone()).await;
    let ctx = AppContext::with_storage(
        &base_url,
        Duration::from_secs(5),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();
    (backend, ctx)
}

/// Simulate an access token the backend no longer accepts.
fn expire_access_token(ctx: &AppContext) {
    ctx.tokens().set_tokens(&TokenPair::new("expired", REFRESH_TOKEN));
}

fn features(amount: f64) -> CreateTransactionRequest {
    serde_json::from_value(json!({
        "gender": 1, "age": 34, "house_type_id": 2, "contact_avaliability_id": 1,
        "home_country": 12, "account_no": 552233, "card_expiry_date": 1226,
        "cif": 9001, "transaction_amount": amount, "transaction_country": 12,
        "transaction_currency_code": 978, "large_purchase": 0, "product_id": 4
    }))
    .unwrap()
}

// == Login ==

#[tokio::test]
async fn test_login_stores_session_and_sends_bearer() {
    let (backend, ctx) = setup().await;

    let response = ctx.auth().login("ana@example.com", "secret").await.unwrap();
    assert!(response.success);
    assert!(ctx.auth().is_authenticated());
    assert_eq!(ctx.tokens().access_token().as_deref(), Some("access-0"));
    assert_eq!(ctx.auth().current_user().unwrap().username, "ana");

    let profile = ctx.profile().get().await.unwrap();
    assert_eq!(profile.data.email, "ana@example.com");
    assert_eq!(
        backend.seen_bearers.lock().unwrap().as_slice(),
        &["access-0".to_string()]
    );
}

#[tokio::test]
async fn test_login_failure_surfaces_backend_message() {
    let (_backend, ctx) = setup().await;

    let err = ctx.auth().login("ana@example.com", "wrong").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.user_message("Login failed"), "Invalid credentials");
    assert!(!ctx.auth().is_authenticated());
}

// == Refresh Interceptor ==

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let (backend, ctx) = setup().await;
    expire_access_token(&ctx);

    let profile = ctx.profile().get().await.unwrap();
    assert_eq!(profile.data.username, "ana");
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.tokens().access_token().as_deref(), Some("access-1"));
    assert_eq!(ctx.tokens().refresh_token().as_deref(), Some(REFRESH_TOKEN));
    assert_eq!(
        backend.seen_bearers.lock().unwrap().as_slice(),
        &["expired".to_string(), "access-1".to_string()]
    );
}

#[tokio::test]
async fn test_second_rejection_is_not_refreshed_again() {
    let (backend, ctx) = setup().await;
    expire_access_token(&ctx);

    let err = ctx.predictions().status().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.seen_bearers.lock().unwrap().len(), 2);
    // The refresh itself succeeded, so the session is kept.
    assert!(ctx.tokens().tokens().is_some());
}

#[tokio::test]
async fn test_failed_refresh_clears_session_and_cache() {
    let (backend, ctx) = setup().await;
    backend.refresh_ok.store(false, Ordering::SeqCst);
    ctx.tokens().set_tokens(&TokenPair::new("expired", REFRESH_TOKEN));
    ctx.cache()
        .set_query_data(&transactions::keys::stats(), &json!({"cached": true}))
        .unwrap();

    // The caller sees why the refresh failed, not the original 401.
    let err = ctx.profile().get().await.unwrap_err();
    assert!(
        matches!(err, ApiError::ServerError { status: 500, .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.user_message("Session expired"), "Refresh store unavailable");
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(ctx.tokens().tokens().is_none());
    assert!(ctx.tokens().access_token().is_none());
    assert!(ctx.cache().is_empty());
}

#[tokio::test]
async fn test_no_refresh_without_refresh_token() {
    let (backend, ctx) = setup().await;

    let err = ctx.profile().get().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rejections_share_one_refresh() {
    let (backend, ctx) = setup().await;
    backend.refresh_delay_ms.store(100, Ordering::SeqCst);
    expire_access_token(&ctx);

    let api = ctx.api().clone();
    let requests = (0..5).map(|_| {
        let api = api.clone();
        async move {
            api.send_json::<Value>(fraudscope_core::api::ApiRequest::get("/auth/me"))
                .await
        }
    });
    let results = futures::future::join_all(requests).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}

// == Errors ==

#[tokio::test]
async fn test_not_found_is_propagated_with_message() {
    let (_backend, ctx) = setup().await;
    ctx.auth().login("ana@example.com", "secret").await.unwrap();

    let err = ctx.transactions().detail(99).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.user_message("Error"), "Transaction 99 not found");
}

// == Cache Invalidation ==

#[tokio::test]
async fn test_create_transaction_invalidates_list_and_stats() {
    let (backend, ctx) = setup().await;
    ctx.auth().login("ana@example.com", "secret").await.unwrap();
    let txs = ctx.transactions();

    assert_eq!(txs.list(None).await.unwrap().count, 0);
    assert_eq!(txs.stats().await.unwrap().stats.total_transactions, 0);
    // Fresh: served from cache.
    txs.list(None).await.unwrap();
    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);

    let created = txs.create(&features(42.5)).await.unwrap();
    assert_eq!(created.data.id, 1);
    assert!(ctx.cache().is_stale(&transactions::keys::lists()));
    assert!(ctx.cache().is_stale(&transactions::keys::stats()));

    let page = txs.list(None).await.unwrap();
    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].features.transaction_amount, 42.5);
    assert_eq!(txs.stats().await.unwrap().stats.total_transactions, 1);
}

#[tokio::test]
async fn test_invalid_transaction_never_reaches_backend() {
    let (backend, ctx) = setup().await;
    ctx.auth().login("ana@example.com", "secret").await.unwrap();

    let err = ctx.transactions().create(&features(-1.0)).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert!(backend.transactions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_clears_previous_users_cache() {
    let (_backend, ctx) = setup().await;
    ctx.cache()
        .set_query_data(&transactions::keys::my_stats(), &json!({"stale": true}))
        .unwrap();

    ctx.auth().login("ana@example.com", "secret").await.unwrap();
    assert!(ctx.cache().is_empty());
}
