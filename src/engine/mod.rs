//! Engine supervision: one session, one worker at a time.
//!
//! [`EngineSession`] is the caller-facing handle. The controller task behind
//! it launches workers through a [`WorkerLauncher`], runs the handshake with
//! fallback, and pairs each search with the `bestmove` that ends it.

mod controller;
mod session;
mod worker;

pub use controller::Readiness;
pub use session::EngineSession;
pub use worker::{ProcessLauncher, ThreadingMode, WorkerChannel, WorkerLauncher};
