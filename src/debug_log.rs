//! Opt-in debug logging for diagnosing fetch and aggregation runs.
//!
//! Enable by setting environment variable: CHATWRAPPED_DEBUG_LOG=1
//! Logs are written to /tmp/chatwrapped-debug.log

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static START_TIME: OnceLock<Instant> = OnceLock::new();
static LOG_FILE: OnceLock<std::sync::Mutex<std::fs::File>> = OnceLock::new();

/// Initialize debug logging. Call once at startup.
pub fn init() {
    if std::env::var("CHATWRAPPED_DEBUG_LOG").is_ok() {
        START_TIME.get_or_init(Instant::now);
        let opened = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open("/tmp/chatwrapped-debug.log");
        match opened {
            Ok(file) => {
                LOG_FILE.get_or_init(|| std::sync::Mutex::new(file));
                ENABLED.store(true, Ordering::SeqCst);
                log("DEBUG", "init", "Debug logging initialized");
            }
            Err(e) => eprintln!("Could not open debug log file: {e}"),
        }
    }
}

#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Log a debug message with elapsed time since startup.
pub fn log(category: &str, action: &str, detail: &str) {
    if !is_enabled() {
        return;
    }

    let elapsed = START_TIME
        .get()
        .map(|s| s.elapsed().as_millis())
        .unwrap_or(0);

    let msg = format!("[{elapsed:>8}ms] [{category}] {action} - {detail}\n");

    if let Some(file_mutex) = LOG_FILE.get()
        && let Ok(mut file) = file_mutex.lock()
    {
        let _ = file.write_all(msg.as_bytes());
        let _ = file.flush();
    }
}
