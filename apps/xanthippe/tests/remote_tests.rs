//! Maintenance commands against a store held by a running server.
//!
//! The first handle owns the database file the way `explore --serve` does;
//! the commands then have to go through its intake server.

use std::sync::Arc;
use tempfile::TempDir;
use xanthippe::api::{self, AppState};
use xanthippe::cli::{RemoteStore, StoreAccess, cmd_forget, cmd_request, cmd_status};
use xanthippe::config::AppConfig;
use xanthippe_core::{
    ButtonSequence, ButtonTable, CoverageStore, UpsertMode, XanthippeError, sim::degree_frame,
};

fn seq(s: &str) -> ButtonSequence {
    ButtonSequence::new(s).expect("sequence")
}

/// A store held open by a live server on an ephemeral port.
struct LiveStore {
    _dir: TempDir,
    db: std::path::PathBuf,
    url: String,
    store: Arc<CoverageStore>,
    shutdown: tokio::sync::oneshot::Sender<()>,
    server: tokio::task::JoinHandle<Result<(), XanthippeError>>,
}

async fn live_store() -> LiveStore {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("xanthippe.db");
    let store = Arc::new(CoverageStore::open(&db).expect("open"));
    let buttons = Arc::new(ButtonTable::reference().expect("table"));

    let listener = api::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let state = AppState::new(Arc::clone(&store), buttons, 10_000);
    let server = tokio::spawn(api::serve(listener, state, async move {
        let _ = shutdown_rx.await;
    }));

    LiveStore {
        _dir: dir,
        db,
        url,
        store,
        shutdown,
        server,
    }
}

impl LiveStore {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.server.await.expect("join").expect("server");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn second_process_cannot_open_the_file() {
    let live = live_store().await;

    assert!(matches!(
        CoverageStore::open(&live.db),
        Err(XanthippeError::StoreBusy(_))
    ));
    let result = cmd_status(&live.db, None, true).await;
    assert!(matches!(result, Err(XanthippeError::StoreBusy(_))));

    live.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_go_through_the_running_server() {
    let live = live_store().await;
    let config = AppConfig::default();
    let frame = degree_frame("2").expect("frame");
    for key in ["T", "TC"] {
        live.store
            .record(&seq(key), frame, UpsertMode::FillGap)
            .expect("record");
    }
    let remote = Some(live.url.as_str());

    cmd_request(&live.db, remote, &config, "jj", true)
        .await
        .expect("request");
    let record = live.store.get(&seq("j")).expect("get").expect("row");
    assert!(record.requested);

    cmd_forget(&live.db, remote, &config, &["2".to_string()], true)
        .await
        .expect("forget");
    assert!(!live.store.is_covered(&seq("T")).expect("covered"));
    assert!(!live.store.is_covered(&seq("TC")).expect("covered"));

    cmd_status(&live.db, remote, true).await.expect("status");

    live.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_access_reports_the_live_counts() {
    let live = live_store().await;
    let frame = degree_frame("2").expect("frame");
    live.store
        .record(&seq("T"), frame, UpsertMode::FillGap)
        .expect("record");
    live.store.request_prefixes(&[seq("jj")]).expect("request");

    let access = StoreAccess::open(&live.db, Some(live.url.as_str())).expect("access");
    assert!(matches!(access, StoreAccess::Remote(_)));

    let stats = access.stats().await.expect("stats");
    assert_eq!(stats, live.store.stats().expect("stats"));
    assert_eq!(access.count_prefix(&seq("j")).await.expect("count"), 2);

    let remote = RemoteStore::new(&live.url);
    let rejected = remote.forget(&ButtonSequence::empty(), false).await;
    assert!(rejected.is_err());
    assert!(live.store.is_covered(&seq("T")).expect("covered"));

    live.stop().await;
}
