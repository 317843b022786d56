//! # CLI Command Implementations
//!
//! The calculator behind `explore` and `interactive` is the simulated
//! device running the reference script; the store is the redb file named
//! by `--database`. `forget`, `request` and `status` go through the intake
//! server given by `--remote` when another process holds that file.

use super::remote::RemoteStore;
use crate::api::{self, AppState};
use crate::config::AppConfig;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use xanthippe_core::{
    ButtonSequence, ButtonTable, Calculator, Clock, CoverageRecord, CoverageStats, CoverageStore,
    DisplayModel, Explorer, Frame, LogDisplay, SimulatedDevice, SystemClock, TemporalLog,
    XanthippeError, render,
};

/// Calculator wired to the simulated device.
pub type SimCalculator = Calculator<SimulatedDevice, SimulatedDevice, LogDisplay>;

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Open (or create) the coverage store.
pub fn open_store(db_path: &Path) -> Result<Arc<CoverageStore>, XanthippeError> {
    let store = CoverageStore::open(db_path)?;
    tracing::debug!(path = %db_path.display(), "coverage store opened");
    Ok(Arc::new(store))
}

/// A calculator on a freshly powered simulated device.
pub fn sim_calculator(
    config: &AppConfig,
    buttons: Arc<ButtonTable>,
) -> Result<SimCalculator, XanthippeError> {
    let timing = &config.timing;
    let log = Arc::new(TemporalLog::new(
        timing.refresh_period_ns(),
        timing.showing_budget(),
    ));
    let device = SimulatedDevice::reference(timing, buttons.reset(), Arc::clone(&log))?;
    Ok(Calculator::new(
        device.clone(),
        device,
        LogDisplay::default(),
        log,
        buttons,
    ))
}

// =============================================================================
// STORE ACCESS
// =============================================================================

/// Where the maintenance commands read and write.
#[derive(Debug)]
pub enum StoreAccess {
    /// This process owns the database file.
    Local(Arc<CoverageStore>),
    /// Another process owns it; go through its intake server.
    Remote(RemoteStore),
}

impl StoreAccess {
    /// Open the store, or fall back to `remote` if the file is locked.
    pub fn open(db_path: &Path, remote: Option<&str>) -> Result<Self, XanthippeError> {
        match open_store(db_path) {
            Ok(store) => Ok(Self::Local(store)),
            Err(XanthippeError::StoreBusy(path)) => match remote {
                Some(url) => {
                    tracing::info!(%path, url, "store is held by another process, using its server");
                    Ok(Self::Remote(RemoteStore::new(url)))
                }
                None => {
                    tracing::warn!(
                        "{} is held by another process; pass --remote with its intake server URL",
                        path
                    );
                    Err(XanthippeError::StoreBusy(path))
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Coverage counts.
    pub async fn stats(&self) -> Result<CoverageStats, XanthippeError> {
        match self {
            Self::Local(store) => store.stats(),
            Self::Remote(remote) => remote.stats().await,
        }
    }

    /// Rows under `prefix`.
    pub async fn count_prefix(&self, prefix: &ButtonSequence) -> Result<usize, XanthippeError> {
        match self {
            Self::Local(store) => store.count_prefix(prefix),
            Self::Remote(remote) => remote.forget(prefix, true).await,
        }
    }

    /// Clear the rows under `prefix`.
    pub async fn forget(&self, prefix: &ButtonSequence) -> Result<usize, XanthippeError> {
        match self {
            Self::Local(store) => store.forget(prefix),
            Self::Remote(remote) => remote.forget(prefix, false).await,
        }
    }

    /// Request every prefix of `sequences`. The changed-row count is only
    /// known for a local store.
    pub async fn request_prefixes(
        &self,
        sequences: &[ButtonSequence],
    ) -> Result<Option<usize>, XanthippeError> {
        match self {
            Self::Local(store) => store.request_prefixes(sequences).map(Some),
            Self::Remote(remote) => remote.request_sequences(sequences).await.map(|()| None),
        }
    }

    /// What the store is, for messages.
    pub fn describe(&self, db_path: &Path) -> String {
        match self {
            Self::Local(_) => db_path.to_string_lossy().into_owned(),
            Self::Remote(remote) => remote.base_url().to_string(),
        }
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Trimmed mantissa of a stored screen, or the decode fault.
fn screen_text(frame: &Frame) -> String {
    match DisplayModel::decode(frame) {
        Ok(model) => model.mantissa_text(),
        Err(e) => format!("<{}>", e),
    }
}

// =============================================================================
// EXPLORE COMMAND
// =============================================================================

/// Run the exploration loop, optionally serving the intake endpoint
/// against the same store.
///
/// Ctrl-C raises the stop flag; the loop finishes its current target, then
/// the server is shut down.
pub async fn cmd_explore(
    db_path: &Path,
    config: AppConfig,
    count: Option<usize>,
    serve: Option<String>,
    json_mode: bool,
) -> Result<(), XanthippeError> {
    let store = open_store(db_path)?;
    let buttons = Arc::new(config.button_table()?);
    let stop = Arc::new(AtomicBool::new(false));
    let listener = match &serve {
        Some(addr) => Some(api::bind(addr).await?),
        None => None,
    };

    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Stop requested, finishing the current target");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = listener.map(|listener| {
        let state = AppState::new(
            Arc::clone(&store),
            Arc::clone(&buttons),
            config.intake.max_body_bytes,
        );
        tokio::spawn(api::serve(listener, state, async move {
            let _ = shutdown_rx.await;
        }))
    });

    let loop_store = Arc::clone(&store);
    let outcome = tokio::task::spawn_blocking(move || {
        let calculator = sim_calculator(&config, buttons)?;
        let mut explorer = Explorer::new(calculator, loop_store, &config.explore)?;
        tracing::info!(strategies = ?explorer.active_strategies(), "exploration started");
        let clock = SystemClock::new();
        let summary = explorer.run_with(&stop, count, |pause| clock.sleep(pause))?;
        tracing::info!(elapsed_ms = clock.now().as_nanos() / 1_000_000, "exploration ended");
        Ok::<_, XanthippeError>(summary)
    })
    .await
    .map_err(|e| XanthippeError::IoError(format!("Explore task failed: {}", e)))?;

    let _ = shutdown_tx.send(());
    if let Some(server) = server {
        server
            .await
            .map_err(|e| XanthippeError::IoError(format!("Server task failed: {}", e)))??;
    }
    let summary = outcome?;

    if json_mode {
        let value = serde_json::to_value(&summary)
            .map_err(|e| XanthippeError::SerializationError(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    println!("Exploration finished ({:?})", summary.reason);
    println!("  Explored: {}", summary.explored);
    println!("  Aborted:  {}", summary.aborted);
    println!("  Idle:     {}", summary.idle);
    println!("  Inserted: {}", summary.inserted);
    println!("  Filled:   {}", summary.filled);
    Ok(())
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the intake server until Ctrl-C.
pub async fn cmd_serve(
    db_path: &Path,
    config: &AppConfig,
    host: &str,
    port: u16,
) -> Result<(), XanthippeError> {
    let store = open_store(db_path)?;
    let buttons = Arc::new(config.button_table()?);

    println!("Xanthippe Intake Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Database: {:?}", db_path);
    println!();
    println!("Endpoints:");
    println!("  POST /       - Request sequences (comma-separated)");
    println!("  GET  /status - Coverage counts");
    println!("  POST /forget - Count or clear rows under a prefix");
    println!("  GET  /health - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(store, buttons, config.intake.max_body_bytes);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

// =============================================================================
// FORGET COMMAND
// =============================================================================

/// Clear every screen under the prefix spelled by `names`, after
/// confirmation.
pub async fn cmd_forget(
    db_path: &Path,
    remote: Option<&str>,
    config: &AppConfig,
    names: &[String],
    yes: bool,
) -> Result<(), XanthippeError> {
    let buttons = config.button_table()?;
    let prefix = buttons.encode(names.iter().map(String::as_str))?;
    buttons.check(&prefix)?;
    let store = StoreAccess::open(db_path, remote)?;

    let affected = store.count_prefix(&prefix).await?;
    if !yes {
        print!(
            "This will affect {} entries. Are you sure? Type y to continue > ",
            affected
        );
        std::io::stdout()
            .flush()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        if answer.trim() != "y" {
            println!("Nothing forgotten.");
            return Ok(());
        }
    }

    let cleared = store.forget(&prefix).await?;
    println!(
        "Forgot {} screens under {} ({}) in {}.",
        cleared,
        prefix,
        buttons.describe(&prefix),
        store.describe(db_path)
    );
    Ok(())
}

// =============================================================================
// REQUEST COMMAND
// =============================================================================

/// Mark sequences and their prefixes as requested.
pub async fn cmd_request(
    db_path: &Path,
    remote: Option<&str>,
    config: &AppConfig,
    sequences: &str,
    json_mode: bool,
) -> Result<(), XanthippeError> {
    let buttons = config.button_table()?;
    let parsed = api::parse_intake(sequences, &buttons)?;
    let store = StoreAccess::open(db_path, remote)?;
    let changed = store.request_prefixes(&parsed).await?;

    if json_mode {
        print_json(&serde_json::json!({
            "store": store.describe(db_path),
            "sequences": parsed.len(),
            "changed": changed,
        }));
        return Ok(());
    }
    match changed {
        Some(changed) => {
            println!("Requested {} sequences, {} rows changed.", parsed.len(), changed)
        }
        None => println!(
            "Requested {} sequences through {}.",
            parsed.len(),
            store.describe(db_path)
        ),
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show coverage counts.
pub async fn cmd_status(
    db_path: &Path,
    remote: Option<&str>,
    json_mode: bool,
) -> Result<(), XanthippeError> {
    let store = StoreAccess::open(db_path, remote)?;
    let stats = store.stats().await?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": store.describe(db_path),
            "total": stats.total,
            "covered": stats.covered,
            "requested": stats.requested,
            "pending": stats.pending,
        }));
        return Ok(());
    }

    println!("Xanthippe Coverage Status");
    println!("=========================");
    println!("Database:  {}", store.describe(db_path));
    println!();
    println!("Records:   {}", stats.total);
    println!("Covered:   {}", stats.covered);
    println!("Requested: {}", stats.requested);
    println!("Pending:   {}", stats.pending);
    Ok(())
}

// =============================================================================
// DUMP COMMAND
// =============================================================================

fn record_json(record: &CoverageRecord) -> serde_json::Value {
    serde_json::json!({
        "buttons": record.buttons.as_str(),
        "screen": record.screen.as_ref().map(Frame::to_string),
        "display": record.screen.as_ref().map(screen_text),
        "requested": record.requested,
    })
}

/// Print every record in key order.
pub fn cmd_dump(db_path: &Path, json_mode: bool) -> Result<(), XanthippeError> {
    let store = open_store(db_path)?;
    let records = store.records()?;

    if json_mode {
        let rows: Vec<serde_json::Value> = records.iter().map(record_json).collect();
        print_json(&serde_json::Value::Array(rows));
        return Ok(());
    }

    for record in &records {
        let flag = if record.requested { '*' } else { ' ' };
        match &record.screen {
            Some(frame) => println!(
                "{} {:<24} {}  {}",
                flag,
                record.buttons,
                frame,
                screen_text(frame)
            ),
            None => println!("{} {:<24} -", flag, record.buttons),
        }
    }
    Ok(())
}

// =============================================================================
// DECODE COMMAND
// =============================================================================

/// Decode and render one frame given in hex.
pub fn cmd_decode(hex: &str, json_mode: bool) -> Result<(), XanthippeError> {
    let frame = Frame::from_hex(hex)?;
    let model = DisplayModel::decode(&frame)?;

    if json_mode {
        print_json(&serde_json::json!({
            "frame": frame.to_string(),
            "annunciators": model.annunciator_row().trim_end(),
            "digits": model.digit_row(),
            "mantissa": model.mantissa_text(),
        }));
        return Ok(());
    }

    println!("{}", model);
    Ok(())
}

// =============================================================================
// INTERACTIVE COMMAND
// =============================================================================

fn echo_frame(name: &str, frame: &Frame) {
    println!("{}: {}", name, frame);
    match render(frame) {
        Ok(text) => println!("{}", text),
        Err(e) => println!("  <{}>", e),
    }
}

/// Read button names from stdin and echo the frame after each press.
///
/// An empty line ends the session. Unknown names and dark displays are
/// reported and skipped.
pub fn cmd_interactive(config: &AppConfig) -> Result<(), XanthippeError> {
    let buttons = Arc::new(config.button_table()?);
    let mut calculator = sim_calculator(config, buttons)?;

    println!("Enter button names separated by spaces; an empty line quits.");
    let frame = calculator.reset()?;
    echo_frame("reset", &frame);

    for line in std::io::stdin().lock().lines() {
        let line = line.map_err(|e| XanthippeError::IoError(e.to_string()))?;
        let names: Vec<&str> = line.split_whitespace().collect();
        if names.is_empty() {
            break;
        }
        for name in names {
            match calculator.press_name(name) {
                Ok(frame) => echo_frame(name, &frame),
                Err(e @ XanthippeError::UnknownButton(_)) => println!("{}", e),
                Err(e) if e.is_recoverable() => println!("{}: {}", name, e),
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
