//! Public handle to a supervised engine worker.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::config::{SessionConfig, WorkerCommand};
use crate::error::EngineError;
use crate::uci::{check_position, BestMove, SearchOptions};

use super::controller::{Controller, Readiness, Request, Shared};
use super::worker::{ProcessLauncher, ThreadingMode, WorkerLauncher};

/// One logical engine session: owns at most one worker at a time, negotiates
/// the threaded/single-threaded variant, and answers best-move requests.
///
/// Constructing a session spawns its controller task, so it must happen
/// inside a Tokio runtime. Dropping the session stops the controller and
/// kills the worker.
///
/// # Example
///
/// ```rust,no_run
/// use uci_session::{EngineSession, SearchOptions, SessionConfig, WorkerCommand};
///
/// # async fn demo() -> Result<(), uci_session::EngineError> {
/// let session = EngineSession::with_process(
///     WorkerCommand::new("stockfish"),
///     WorkerCommand::new("stockfish"),
///     SessionConfig::default(),
/// );
/// session.initialize().await?;
/// let reply = session.best_move("startpos", SearchOptions::move_time(500)).await?;
/// println!("{}", reply.best_move);
/// session.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct EngineSession {
    requests: mpsc::UnboundedSender<Request>,
    shared: Arc<Mutex<Shared>>,
    default_move_time_ms: u64,
}

impl EngineSession {
    /// Create a session that starts workers through `launcher`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new<L>(launcher: L, config: SessionConfig) -> Self
    where
        L: WorkerLauncher + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (requests, receiver) = mpsc::unbounded_channel();
        let default_move_time_ms = config.default_move_time_ms;
        let controller = Controller::new(Arc::new(launcher), config, Arc::clone(&shared), receiver);
        tokio::spawn(controller.run());

        EngineSession {
            requests,
            shared,
            default_move_time_ms,
        }
    }

    /// Create a session whose variants are child processes.
    pub fn with_process(primary: WorkerCommand, fallback: WorkerCommand, config: SessionConfig) -> Self {
        Self::new(ProcessLauncher::new(primary, fallback), config)
    }

    /// Bring a worker to readiness.
    ///
    /// Resolves immediately when already ready. Concurrent calls share one
    /// attempt, and so one launch. Fails with [`EngineError::Unavailable`]
    /// only when both variants failed.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let (reply, outcome) = oneshot::channel();
        self.submit(Request::Initialize(reply))?;
        outcome.await.unwrap_or_else(|_| Err(controller_gone()))
    }

    /// Search `position` and return the worker's best move.
    ///
    /// `position` is a FEN, or a `startpos ...` / `fen ...` argument.
    /// Initializes the session first when needed. A second search while one
    /// is outstanding fails with [`EngineError::Busy`]; an empty position fails
    /// with [`EngineError::InvalidPosition`] without starting a worker.
    pub async fn best_move(&self, position: &str, options: SearchOptions) -> Result<BestMove, EngineError> {
        check_position(position)?;
        self.initialize().await?;

        let (reply, outcome) = oneshot::channel();
        self.submit(Request::Search {
            position: position.to_string(),
            limit: options.limit(self.default_move_time_ms),
            reply,
        })?;
        outcome.await.unwrap_or_else(|_| Err(controller_gone()))
    }

    /// Set the playing strength, clamped to 0..=20.
    ///
    /// Sent right away when ready, otherwise at the next handshake.
    pub fn set_skill_level(&self, level: i64) {
        let stored = self.shared.lock().options.set_skill_level(level);
        debug!("skill level set to {stored}");
        let _ = self.submit(Request::SyncOptions);
    }

    /// Set the transposition table size in MB, clamped to 16..=4096.
    ///
    /// Like the skill level, the value is re-sent after every restart.
    pub fn set_hash_size_mb(&self, mb: i64) {
        let stored = self.shared.lock().options.set_hash_mb(mb);
        debug!("hash size set to {stored}MB");
        let _ = self.submit(Request::SyncOptions);
    }

    /// Send `setoption name <name> value <value>` verbatim.
    ///
    /// Nothing is validated or remembered: the option is lost on restart, and
    /// the call is a no-op while no worker is running.
    pub fn set_option_unchecked(&self, name: &str, value: &str) {
        let _ = self.submit(Request::RawOption {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    /// Stop the worker and fail any pending request.
    ///
    /// Safe to call in any state and more than once. Option values survive;
    /// a later call re-initializes from the primary variant.
    pub async fn dispose(&self) {
        let (done, finished) = oneshot::channel();
        if self.submit(Request::Dispose(done)).is_ok() {
            let _ = finished.await;
        }
    }

    /// Whether the single-threaded fallback variant is the current worker.
    #[must_use]
    pub fn using_fallback(&self) -> bool {
        self.shared.lock().mode == Some(ThreadingMode::Single)
    }

    /// Current lifecycle state of the worker.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.shared.lock().readiness
    }

    /// Variant of the current worker, if one is running.
    #[must_use]
    pub fn threading_mode(&self) -> Option<ThreadingMode> {
        self.shared.lock().mode
    }

    /// Stored skill level, already clamped.
    #[must_use]
    pub fn skill_level(&self) -> u8 {
        self.shared.lock().options.skill_level
    }

    /// Stored hash size in MB, if one was ever set.
    #[must_use]
    pub fn hash_size_mb(&self) -> Option<u32> {
        self.shared.lock().options.hash_mb
    }

    fn submit(&self, request: Request) -> Result<(), EngineError> {
        self.requests.send(request).map_err(|_| controller_gone())
    }
}

fn controller_gone() -> EngineError {
    EngineError::unavailable("session controller stopped")
}
