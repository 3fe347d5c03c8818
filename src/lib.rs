pub mod config;
pub mod engine;
pub mod error;
pub mod sync;
pub mod timer;
pub mod uci;

pub use config::{SessionConfig, WorkerCommand};
pub use engine::{EngineSession, ProcessLauncher, Readiness, ThreadingMode, WorkerChannel, WorkerLauncher};
pub use error::EngineError;
pub use uci::{BestMove, SearchLimit, SearchOptions};
