// tests/common/mod.rs
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use pathwatch::{EventKinds, NotificationSink, ProcessActivation, WatchObserver, WatcherId};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Records every dispatched event for assertions.
#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<(PathBuf, EventKinds)>>,
}

impl CollectingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn as_observer(self: &Arc<Self>) -> Arc<dyn WatchObserver> {
        self.clone()
    }

    pub fn events(&self) -> Vec<(PathBuf, EventKinds)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Poll until `pred` holds for the collected events, or time out.
    pub fn wait_for(
        &self,
        timeout: Duration,
        pred: impl Fn(&[(PathBuf, EventKinds)]) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.events()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl WatchObserver for CollectingObserver {
    fn changed(&self, _watcher: WatcherId, path: &Path, kinds: EventKinds) {
        self.events.lock().unwrap().push((path.to_path_buf(), kinds));
    }
}

/// Captures notifications published while `always_notify` is set.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<(String, PathBuf)> {
        self.published.lock().unwrap().clone()
    }

    pub fn wait_for(
        &self,
        timeout: Duration,
        pred: impl Fn(&[(String, PathBuf)]) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.published()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, name: &str, path: &Path) {
        self.published
            .lock()
            .unwrap()
            .push((name.to_string(), path.to_path_buf()));
    }
}

/// Foreground/background switch driven by the test.
pub struct ToggleActivation {
    active: AtomicBool,
}

impl ToggleActivation {
    pub fn new(active: bool) -> Arc<Self> {
        Arc::new(ToggleActivation {
            active: AtomicBool::new(active),
        })
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl ProcessActivation for ToggleActivation {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
