//! Throwaway shell "servers" for lifecycle tests.
//!
//! Every script gets a unique file name. Liveness detection matches command
//! lines against the entry point, so tests running in parallel must never
//! share one.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Prints a line, then idles until signalled.
pub const LONG_LIVED: &str = "echo \"server ready on $PORT\"\nwhile :; do sleep 0.1; done\n";

/// Ignores SIGTERM; only SIGKILL gets rid of it.
pub const IGNORES_TERM: &str = "trap '' TERM\necho stubborn\nwhile :; do sleep 0.1; done\n";

/// Dies immediately with a diagnostic on stderr.
pub const EARLY_EXIT: &str = "echo \"Error: listen EADDRINUSE :::$PORT\" >&2\nexit 3\n";

/// Runs briefly, then exits cleanly on its own.
pub const SHORT_LIVED: &str = "echo working\nsleep 1\nexit 0\n";

/// A temp directory holding uniquely named scripts.
pub struct ScriptDir {
    dir: TempDir,
}

impl ScriptDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create script dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `body` to a fresh script and return its file name (the entry).
    pub fn script(&self, tag: &str, body: &str) -> String {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("portvisor-{tag}-{}-{id}.sh", std::process::id());
        fs::write(self.dir.path().join(&name), body).expect("write script");
        name
    }
}

impl Default for ScriptDir {
    fn default() -> Self {
        Self::new()
    }
}
