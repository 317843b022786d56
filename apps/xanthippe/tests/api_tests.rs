//! Integration tests for the Xanthippe intake API.
//!
//! Uses axum-test to drive the router without binding a socket.

// Tests are serialized on a mutex because they modify env vars.
#![allow(clippy::await_holding_lock)]

use axum::http::{HeaderValue, header};
use axum_test::TestServer;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use xanthippe::api::{
    API_KEY_ENV, AppState, ForgetRequest, ForgetResponse, HealthResponse, INTAKE_KEY_ENV,
    INTAKE_RATE_LIMIT_ENV, StatusResponse, create_router,
};
use xanthippe_core::{ButtonSequence, ButtonTable, CoverageStore};

/// Mutex to serialize tests since they modify env vars.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

const MAX_BODY: usize = 64;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Holds the env mutex and the store directory; restores the env on drop.
struct TestGuard {
    _dir: TempDir,
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
        unsafe {
            std::env::remove_var(API_KEY_ENV);
            std::env::remove_var(INTAKE_KEY_ENV);
            std::env::remove_var(INTAKE_RATE_LIMIT_ENV);
        }
    }
}

/// A server over a fresh store, with the given env settings applied.
fn create_test_server(
    env: &[(&str, &str)],
) -> (TestServer, Arc<CoverageStore>, TestGuard) {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe {
        std::env::remove_var(API_KEY_ENV);
        std::env::remove_var(INTAKE_KEY_ENV);
        std::env::remove_var(INTAKE_RATE_LIMIT_ENV);
        for (key, value) in env {
            std::env::set_var(key, value);
        }
    }

    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(CoverageStore::open(dir.path().join("xanthippe.db")).expect("open"));
    let buttons = Arc::new(ButtonTable::reference().expect("table"));
    let state = AppState::new(Arc::clone(&store), buttons, MAX_BODY);
    let server = TestServer::new(create_router(state)).expect("server");
    (
        server,
        store,
        TestGuard {
            _dir: dir,
            _guard: guard,
        },
    )
}

fn seq(s: &str) -> ButtonSequence {
    ButtonSequence::new(s).expect("sequence")
}

// =============================================================================
// HEALTH AND STATUS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _, _guard) = create_test_server(&[]);

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_empty_store() {
    let (server, _, _guard) = create_test_server(&[]);

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert!(status.success);
    let stats = status.stats.expect("stats");
    assert_eq!(stats.total, 0);
    assert_eq!(stats.pending, 0);
}

// =============================================================================
// INTAKE ENDPOINT
// =============================================================================

#[tokio::test]
async fn test_intake_requests_every_prefix() {
    let (server, store, _guard) = create_test_server(&[]);

    let response = server.post("/").text("TCbi,jj").await;

    response.assert_status_ok();
    assert!(response.text().is_empty());
    let keys: Vec<String> = store
        .records()
        .expect("records")
        .into_iter()
        .filter(|r| r.requested && !r.is_covered())
        .map(|r| r.buttons.as_str().to_string())
        .collect();
    assert_eq!(keys, ["T", "TC", "TCb", "TCbi", "j", "jj"]);

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.stats.expect("stats").pending, 6);
}

#[tokio::test]
async fn test_intake_keeps_existing_screens() {
    let (server, store, _guard) = create_test_server(&[]);
    let frame = xanthippe_core::sim::degree_frame("2").expect("frame");
    store
        .record(&seq("T"), frame, xanthippe_core::UpsertMode::FillGap)
        .expect("record");

    server.post("/").text("TC").await.assert_status_ok();

    let record = store.get(&seq("T")).expect("get").expect("row");
    assert_eq!(record.screen, Some(frame));
    assert!(record.requested);
}

#[tokio::test]
async fn test_intake_ignores_invalid_symbols() {
    let (server, store, _guard) = create_test_server(&[]);

    // '3' is the reset button, 'Z' is unbound, ' ' is not a symbol
    for body in ["T3", "TZ", "T C", "TC\n"] {
        let response = server.post("/").text(body).await;
        response.assert_status_ok();
        assert!(response.text().is_empty());
    }

    assert_eq!(store.stats().expect("stats").total, 0);
}

#[tokio::test]
async fn test_intake_ignores_oversized_payload() {
    let (server, store, _guard) = create_test_server(&[]);

    let response = server
        .post("/")
        .bytes(bytes::Bytes::from(vec![b'T'; MAX_BODY + 1]))
        .await;

    response.assert_status_ok();
    assert!(response.text().is_empty());
    assert_eq!(store.stats().expect("stats").total, 0);
}

#[tokio::test]
async fn test_intake_ignores_non_utf8_payload() {
    let (server, store, _guard) = create_test_server(&[]);

    let response = server
        .post("/")
        .bytes(bytes::Bytes::from_static(&[0xff, 0xfe, b'T']))
        .await;

    response.assert_status_ok();
    assert_eq!(store.stats().expect("stats").total, 0);
}

#[tokio::test]
async fn test_intake_empty_payload_is_noop() {
    let (server, store, _guard) = create_test_server(&[]);

    server.post("/").text(",,").await.assert_status_ok();

    assert_eq!(store.stats().expect("stats").total, 0);
}

// =============================================================================
// FORGET ENDPOINT
// =============================================================================

fn forget_body(prefix: &str, dry_run: bool) -> ForgetRequest {
    ForgetRequest {
        prefix: prefix.to_string(),
        dry_run,
    }
}

#[tokio::test]
async fn test_forget_counts_then_clears() {
    let (server, store, _guard) = create_test_server(&[]);
    let frame = xanthippe_core::sim::degree_frame("2").expect("frame");
    for key in ["T", "TC", "j"] {
        store
            .record(&seq(key), frame, xanthippe_core::UpsertMode::FillGap)
            .expect("record");
    }

    let counted: ForgetResponse = server
        .post("/forget")
        .json(&forget_body("T", true))
        .await
        .json();
    assert!(counted.success);
    assert_eq!(counted.affected, Some(2));
    assert!(store.is_covered(&seq("T")).expect("covered"));

    let cleared: ForgetResponse = server
        .post("/forget")
        .json(&forget_body("T", false))
        .await
        .json();
    assert_eq!(cleared.affected, Some(2));
    assert!(!store.is_covered(&seq("TC")).expect("covered"));
    assert!(store.is_covered(&seq("j")).expect("covered"));
}

#[tokio::test]
async fn test_forget_rejects_bad_prefix() {
    let (server, _, _guard) = create_test_server(&[]);

    for prefix in ["", "T3", "T C"] {
        let response = server.post("/forget").json(&forget_body(prefix, false)).await;
        assert_eq!(response.status_code().as_u16(), 400);
        let body: ForgetResponse = response.json();
        assert!(!body.success);
        assert!(body.error.is_some());
    }
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn test_maintenance_key_guards_status_and_forget() {
    let (server, _, _guard) = create_test_server(&[(API_KEY_ENV, "ops-key")]);

    let missing = server.get("/status").await;
    assert_eq!(missing.status_code().as_u16(), 401);

    let wrong = server
        .post("/forget")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer ops-kez"),
        )
        .json(&forget_body("T", true))
        .await;
    assert_eq!(wrong.status_code().as_u16(), 401);

    server
        .get("/status")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer ops-key"),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_maintenance_key_leaves_intake_open() {
    let (server, store, _guard) = create_test_server(&[(API_KEY_ENV, "ops-key")]);

    server.post("/").text("T").await.assert_status_ok();

    assert!(store.get(&seq("T")).expect("get").is_some());
}

#[tokio::test]
async fn test_intake_key_guards_intake_only() {
    let (server, store, _guard) = create_test_server(&[(INTAKE_KEY_ENV, "page-key")]);

    let missing = server.post("/").text("T").await;
    assert_eq!(missing.status_code().as_u16(), 401);
    assert_eq!(store.stats().expect("stats").total, 0);

    server
        .post("/")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer page-key"),
        )
        .text("T")
        .await
        .assert_status_ok();
    assert!(store.get(&seq("T")).expect("get").is_some());

    server.get("/status").await.assert_status_ok();
}

#[tokio::test]
async fn test_auth_health_always_open() {
    let (server, _, _guard) =
        create_test_server(&[(API_KEY_ENV, "ops-key"), (INTAKE_KEY_ENV, "page-key")]);

    server.get("/health").await.assert_status_ok();
}

// =============================================================================
// RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_intake_rate_limit_rejects_burst() {
    let (server, store, _guard) = create_test_server(&[(INTAKE_RATE_LIMIT_ENV, "1")]);

    server.post("/").text("T").await.assert_status_ok();
    let limited = server.post("/").text("j").await;

    assert_eq!(limited.status_code().as_u16(), 429);
    assert!(store.get(&seq("j")).expect("get").is_none());
}

#[tokio::test]
async fn test_intake_rate_limit_spares_other_routes() {
    let (server, _, _guard) = create_test_server(&[(INTAKE_RATE_LIMIT_ENV, "1")]);

    for _ in 0..5 {
        server.get("/status").await.assert_status_ok();
        server.get("/health").await.assert_status_ok();
    }
}

#[tokio::test]
async fn test_intake_rate_limit_zero_disables() {
    let (server, _, _guard) = create_test_server(&[(INTAKE_RATE_LIMIT_ENV, "0")]);

    for _ in 0..5 {
        server.post("/").text("T").await.assert_status_ok();
    }
}
