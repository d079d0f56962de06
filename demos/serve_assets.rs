//! Serving an `app://` site and `img://` assets.
//!
//! Demonstrates:
//! - Registering scheme handlers on a TaskPool
//! - A host that forwards deliveries through a Dispatcher thread
//! - Streaming a response with receive + finish
//! - Stopping a slow task and seeing its deliveries suppressed
//!
//! Usage:
//!   cargo run --example serve_assets
//!   cargo run --example serve_assets -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use scheme_task_pool::{
    Dispatcher, Reply, ResponseMeta, Result, SchemeHost, Task, TaskId, TaskPool,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const INDEX_HTML: &str = "<html><body><img src=\"img://assets/logo.png\"></body></html>";

const LOGO_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

// ============================================================================
// Host
// ============================================================================

/// Prints deliveries in order from a dispatcher thread.
struct PrintingHost {
    dispatcher: Dispatcher,
}

impl PrintingHost {
    fn emit(&self, line: String) {
        if let Err(e) = self.dispatcher.dispatch(move || println!("    {line}")) {
            eprintln!("    dropped delivery: {e}");
        }
    }
}

impl SchemeHost for PrintingHost {
    fn deliver_response_headers(&self, id: TaskId, response: &ResponseMeta) {
        let headers: Vec<String> = response
            .headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect();
        self.emit(format!("[{id}] {} {} {headers:?}", response.version, response.status));
    }

    fn deliver_data(&self, id: TaskId, data: &[u8]) {
        self.emit(format!("[{id}] {} bytes", data.len()));
    }

    fn deliver_finished(&self, id: TaskId) {
        self.emit(format!("[{id}] finished"));
    }

    fn deliver_failed(&self, id: TaskId, reason: &str) {
        self.emit(format!("[{id}] failed: {reason}"));
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn serve_app(task: &Task) -> Result<()> {
    match task.request().path() {
        "/" | "/index.html" => task.finish_with(INDEX_HTML, "text/html"),
        "/stream" => {
            task.receive(Reply::data("chunk-1;").with_content_type("text/plain"))?;
            task.receive_data("chunk-2;")?;
            task.finish(Reply::data("done"))
        }
        "/slow" => {
            for _ in 0..50 {
                if task.is_cancelled() {
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(20));
            }
            task.finish_with("slow", "text/plain")
        }
        other => task.fail(format!("no route for {other}")),
    }
}

fn serve_img(task: &Task) -> Result<()> {
    if task.request().path() != "/logo.png" {
        return task.finish(Reply::new().with_status(404));
    }
    task.finish_with(LOGO_PNG, "image/png")
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run() {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    println!("=== Serve Assets ===\n");

    let host = Arc::new(PrintingHost {
        dispatcher: Dispatcher::start("webview-dispatch")?,
    });

    let pool = TaskPool::builder()
        .handler("app", serve_app)
        .handler("img", serve_img)
        .max_workers(2)
        .build(Arc::clone(&host))?;

    println!("[1] Schemes: {:?}\n", pool.schemes());

    // ========================================================================
    // Page Load
    // ========================================================================

    println!("[2] Loading page and assets...");

    let origin = [("Origin", "app://main")];
    pool.start_url(TaskId::new(1), "app://main/index.html", origin)?;
    pool.start_url(TaskId::new(2), "img://assets/logo.png", origin)?;
    pool.start_url(TaskId::new(3), "app://main/stream", origin)?;
    pool.start_url(TaskId::new(4), "app://main/missing", origin)?;

    pool.wait_idle(Duration::from_secs(5));
    println!("    stats: {:?}\n", pool.stats());

    // ========================================================================
    // Cancellation
    // ========================================================================

    println!("[3] Starting a slow request and stopping it...");

    let slow = TaskId::new(5);
    pool.start_url(slow, "app://main/slow", origin)?;
    thread::sleep(Duration::from_millis(50));
    pool.task_stop(slow);
    println!("    stopped: {}", pool.is_stopped(slow));

    pool.wait_idle(Duration::from_secs(5));
    println!("    registered after handler returned: {}\n", pool.is_registered(slow));

    // ========================================================================
    // Shutdown
    // ========================================================================

    pool.shutdown(true);
    host.dispatcher.stop(true);

    println!("=== Done ===");
    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "scheme_task_pool=debug"
    } else {
        "scheme_task_pool=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
