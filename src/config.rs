//! Session configuration and protocol constants.

use std::ffi::OsString;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handshake watchdog: how long a variant has to answer `readyok`.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 2500;

/// Extra time granted to a search on top of its movetime budget.
pub const SEARCH_TIMEOUT_MS: u64 = 30_000;

/// Movetime used when a search request names neither depth nor movetime.
pub const DEFAULT_MOVE_TIME_MS: u64 = 500;

pub const MIN_SKILL_LEVEL: u8 = 0;
pub const MAX_SKILL_LEVEL: u8 = 20;
pub const DEFAULT_SKILL_LEVEL: u8 = MAX_SKILL_LEVEL;

pub const MIN_HASH_MB: u32 = 16;
pub const MAX_HASH_MB: u32 = 4096;

pub const MIN_THREADS: usize = 1;
pub const MAX_THREADS: usize = 8;

/// Parallelism detected once per process, clamped to the thread range.
static DETECTED_THREADS: Lazy<usize> = Lazy::new(|| {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_THREADS)
        .clamp(MIN_THREADS, MAX_THREADS)
});

/// Thread count handed to the primary variant when none is configured.
#[must_use]
pub fn detected_threads() -> usize {
    *DETECTED_THREADS
}

/// Program and arguments used to start one worker variant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        WorkerCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Tunables for an [`EngineSession`](crate::engine::EngineSession).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// Time each variant gets to complete the handshake
    pub handshake_timeout: Duration,
    /// Grace period added to a search's own budget (None = wait forever)
    pub search_timeout: Option<Duration>,
    /// Thread count for the primary variant (None = detected parallelism)
    pub threads: Option<usize>,
    /// Movetime used when a request names neither depth nor movetime
    pub default_move_time_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
            search_timeout: Some(Duration::from_millis(SEARCH_TIMEOUT_MS)),
            threads: None,
            default_move_time_ms: DEFAULT_MOVE_TIME_MS,
        }
    }
}

impl SessionConfig {
    /// Thread count sent to the primary (multi-threaded) variant.
    #[must_use]
    pub fn primary_threads(&self) -> usize {
        self.threads
            .map_or_else(detected_threads, |n| n.clamp(MIN_THREADS, MAX_THREADS))
    }
}
