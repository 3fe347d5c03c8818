//! Session controller: the single state machine behind an engine session.
//!
//! The controller runs as one task. Caller requests, worker output, and the
//! two watchdogs are its only inputs, and each is handled to completion
//! before the next is looked at, so none of the session state needs locking
//! beyond the small snapshot shared with the handle.

use std::sync::Arc;

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::config::SessionConfig;
use crate::error::EngineError;
use crate::sync::{resolve, Reply, Waiters};
use crate::timer::{sleep_until_deadline, Watchdog};
use crate::uci::options::AppliedOptions;
use crate::uci::{BestMove, EngineMessage, EngineOptions, SearchLimit, UciCommand};

use super::worker::{TaggedEvent, ThreadingMode, Worker, WorkerEvent, WorkerLauncher};

/// Lifecycle of the session's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Readiness {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
}

/// State visible to the handle without a round trip through the controller.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub readiness: Readiness,
    pub mode: Option<ThreadingMode>,
    pub options: EngineOptions,
}

/// Requests sent from the handle.
pub(crate) enum Request {
    Initialize(Reply<()>),
    Search {
        position: String,
        limit: SearchLimit,
        reply: Reply<BestMove>,
    },
    /// Stored option values changed
    SyncOptions,
    RawOption {
        name: String,
        value: String,
    },
    Dispose(oneshot::Sender<()>),
}

struct PendingSearch {
    position: String,
    limit: SearchLimit,
    reply: Reply<BestMove>,
    dispatched: bool,
}

pub(crate) struct Controller {
    launcher: Arc<dyn WorkerLauncher>,
    config: SessionConfig,
    shared: Arc<Mutex<Shared>>,
    requests: mpsc::UnboundedReceiver<Request>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events: mpsc::UnboundedReceiver<TaggedEvent>,
    readiness: Readiness,
    worker: Option<Worker>,
    applied: AppliedOptions,
    generation: u64,
    init_waiters: Waiters<()>,
    search: Option<PendingSearch>,
    handshake_watchdog: Watchdog,
    search_watchdog: Watchdog,
}

impl Controller {
    pub fn new(
        launcher: Arc<dyn WorkerLauncher>,
        config: SessionConfig,
        shared: Arc<Mutex<Shared>>,
        requests: mpsc::UnboundedReceiver<Request>,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        Controller {
            launcher,
            config,
            shared,
            requests,
            events_tx,
            events,
            readiness: Readiness::Uninitialized,
            worker: None,
            applied: AppliedOptions::default(),
            generation: 0,
            init_waiters: Waiters::new(),
            search: None,
            handshake_watchdog: Watchdog::new(),
            search_watchdog: Watchdog::new(),
        }
    }

    /// Run until every handle is gone.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.on_request(request).await,
                    None => break,
                },
                Some(tagged) = self.events.recv() => self.on_event(tagged).await,
                () = sleep_until_deadline(self.handshake_watchdog.deadline()) => {
                    self.on_handshake_timeout().await;
                }
                () = sleep_until_deadline(self.search_watchdog.deadline()) => {
                    self.on_search_timeout().await;
                }
            }
        }

        debug!("session handle dropped, stopping controller");
        self.reset(EngineError::unavailable("session dropped")).await;
    }

    async fn on_request(&mut self, request: Request) {
        match request {
            Request::Initialize(reply) => match self.readiness {
                Readiness::Ready => resolve(reply, Ok(())),
                Readiness::Initializing => self.init_waiters.push(reply),
                Readiness::Uninitialized => {
                    self.init_waiters.push(reply);
                    self.start(ThreadingMode::Multi).await;
                }
            },
            Request::Search {
                position,
                limit,
                reply,
            } => self.on_search_request(position, limit, reply).await,
            Request::SyncOptions => {
                if self.readiness == Readiness::Ready {
                    self.sync_options().await;
                }
            }
            Request::RawOption { name, value } => {
                if self.worker.is_none() {
                    debug!("no worker, dropping option '{name}'");
                    return;
                }
                let command = UciCommand::SetOption { name, value };
                if let Err(reason) = self.send(&command).await {
                    self.on_channel_failure(reason).await;
                }
            }
            Request::Dispose(done) => {
                info!("disposing engine session");
                self.reset(EngineError::unavailable("session disposed")).await;
                let _ = done.send(());
            }
        }
    }

    async fn on_search_request(&mut self, position: String, limit: SearchLimit, reply: Reply<BestMove>) {
        if self.search.is_some() {
            resolve(reply, Err(EngineError::Busy { operation: "search" }));
            return;
        }
        if self.readiness == Readiness::Uninitialized {
            resolve(reply, Err(EngineError::unavailable("no worker is running")));
            return;
        }

        self.search = Some(PendingSearch {
            position,
            limit,
            reply,
            dispatched: false,
        });
        if self.readiness == Readiness::Ready {
            self.dispatch_search().await;
        } else {
            debug!("search deferred until the worker is ready");
        }
    }

    /// Launch `mode`, stepping down to the fallback variant on launch or
    /// handshake-write failure.
    async fn start(&mut self, mut mode: ThreadingMode) {
        loop {
            match self.try_start(mode).await {
                Ok(()) => return,
                Err(reason) => match mode.fallback() {
                    Some(next) => {
                        warn!("{mode} worker failed to start ({reason}), falling back to {next}");
                        mode = next;
                    }
                    None => {
                        self.fail_initialization(reason).await;
                        return;
                    }
                },
            }
        }
    }

    async fn try_start(&mut self, mode: ThreadingMode) -> Result<(), String> {
        self.teardown().await;

        let channel = self
            .launcher
            .launch(mode)
            .map_err(|err| format!("launch failed: {err}"))?;

        self.generation += 1;
        let worker = Worker::start(channel, self.generation, mode, self.events_tx.clone());
        debug!("launched {mode} worker (generation {})", self.generation);
        self.worker = Some(worker);
        self.set_readiness(Readiness::Initializing);
        self.handshake_watchdog.arm(self.config.handshake_timeout);

        let threads = match mode {
            ThreadingMode::Multi => self.config.primary_threads(),
            ThreadingMode::Single => 1,
        };
        let options = self.shared.lock().options;
        for command in options.handshake_commands(threads, &mut self.applied) {
            self.send(&command).await?;
        }
        Ok(())
    }

    async fn on_event(&mut self, tagged: TaggedEvent) {
        let current = self.worker.as_ref().map(|worker| worker.generation);
        if current != Some(tagged.generation) {
            trace!("dropping event from stale worker generation {}", tagged.generation);
            return;
        }

        match tagged.event {
            WorkerEvent::Line(line) => self.on_line(&line).await,
            WorkerEvent::Closed(reason) => self.on_channel_failure(reason).await,
        }
    }

    async fn on_line(&mut self, line: &str) {
        trace!("<< {line}");
        match (self.readiness, EngineMessage::parse(line)) {
            (Readiness::Initializing, EngineMessage::UciOk) => {
                if let Err(reason) = self.send(&UciCommand::IsReady).await {
                    self.on_channel_failure(reason).await;
                }
            }
            (Readiness::Initializing, EngineMessage::ReadyOk) => self.on_ready().await,
            (Readiness::Initializing, EngineMessage::Id { field: "name", value }) => {
                info!("worker identifies as {value}");
            }
            (Readiness::Ready, EngineMessage::BestMove(raw)) => self.finish_search(raw),
            (_, EngineMessage::BestMove(raw)) => {
                debug!("ignoring '{raw}' received while not ready");
            }
            _ => {}
        }
    }

    async fn on_ready(&mut self) {
        self.handshake_watchdog.disarm();
        self.set_readiness(Readiness::Ready);
        if let Some(worker) = &self.worker {
            info!("engine ready ({} variant)", worker.mode);
        }

        // Values changed while the handshake was in flight.
        self.sync_options().await;
        if self.readiness != Readiness::Ready {
            return;
        }

        self.init_waiters.resolve_all(&Ok(()));
        self.dispatch_search().await;
    }

    async fn on_handshake_timeout(&mut self) {
        self.handshake_watchdog.disarm();
        if self.readiness != Readiness::Initializing {
            return;
        }
        let after_ms = self.handshake_watchdog.armed_for().as_millis();
        self.on_handshake_failure(format!("no readyok within {after_ms}ms")).await;
    }

    async fn on_search_timeout(&mut self) {
        self.search_watchdog.disarm();
        let Some(search) = self.search.take() else {
            return;
        };
        let after_ms = u64::try_from(self.search_watchdog.armed_for().as_millis()).unwrap_or(u64::MAX);
        warn!("search timed out after {after_ms}ms, restarting worker on next request");
        resolve(search.reply, Err(EngineError::SearchTimeout { after_ms }));
        self.reset(EngineError::unavailable("worker stalled during search")).await;
    }

    /// The worker channel broke (closed output or failed write).
    async fn on_channel_failure(&mut self, reason: String) {
        match self.readiness {
            Readiness::Initializing => self.on_handshake_failure(reason).await,
            Readiness::Ready => {
                warn!("lost engine worker: {reason}");
                self.reset(EngineError::unavailable(reason)).await;
            }
            Readiness::Uninitialized => {}
        }
    }

    /// Handshake did not complete: try the fallback variant once, then give up.
    async fn on_handshake_failure(&mut self, reason: String) {
        let mode = self
            .worker
            .as_ref()
            .map_or(ThreadingMode::Single, |worker| worker.mode);
        match mode.fallback() {
            Some(next) => {
                warn!("{mode} worker did not come up ({reason}), falling back to {next}");
                self.start(next).await;
            }
            None => self.fail_initialization(reason).await,
        }
    }

    async fn fail_initialization(&mut self, reason: String) {
        warn!("engine initialization failed: {reason}");
        self.reset(EngineError::unavailable(reason)).await;
    }

    async fn dispatch_search(&mut self) {
        let Some(search) = self.search.as_mut() else {
            return;
        };
        if search.dispatched {
            return;
        }
        search.dispatched = true;

        let commands = [
            UciCommand::position(&search.position),
            UciCommand::Go(search.limit),
        ];
        if let Some(grace) = self.config.search_timeout {
            self.search_watchdog.arm(search.limit.budget() + grace);
        }

        for command in &commands {
            if let Err(reason) = self.send(command).await {
                self.on_channel_failure(reason).await;
                return;
            }
        }
    }

    fn finish_search(&mut self, raw: &str) {
        let Some(search) = self.search.take() else {
            debug!("ignoring unsolicited '{raw}'");
            return;
        };
        self.search_watchdog.disarm();
        let result = BestMove::parse(raw);
        if let Err(err) = &result {
            warn!("{err}");
        }
        resolve(search.reply, result);
    }

    async fn sync_options(&mut self) {
        let options = self.shared.lock().options;
        for command in options.resync_commands(&mut self.applied) {
            if let Err(reason) = self.send(&command).await {
                self.on_channel_failure(reason).await;
                return;
            }
        }
    }

    async fn send(&mut self, command: &UciCommand) -> Result<(), String> {
        let Some(worker) = self.worker.as_mut() else {
            return Err("no worker is running".to_string());
        };
        worker
            .send(command)
            .await
            .map_err(|err| format!("writing '{command}' failed: {err}"))
    }

    /// Drop the worker and fail everything that was waiting on it.
    async fn reset(&mut self, error: EngineError) {
        self.teardown().await;
        self.set_readiness(Readiness::Uninitialized);
        self.init_waiters.resolve_all(&Err(error.clone()));
        if let Some(search) = self.search.take() {
            resolve(search.reply, Err(error));
        }
    }

    async fn teardown(&mut self) {
        self.handshake_watchdog.disarm();
        self.search_watchdog.disarm();
        self.applied = AppliedOptions::default();
        if let Some(worker) = self.worker.take() {
            debug!("tearing down {} worker (generation {})", worker.mode, worker.generation);
            worker.shutdown().await;
        }
        self.shared.lock().mode = None;
    }

    fn set_readiness(&mut self, readiness: Readiness) {
        self.readiness = readiness;
        let mut shared = self.shared.lock();
        shared.readiness = readiness;
        shared.mode = self.worker.as_ref().map(|worker| worker.mode);
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use tokio::io::DuplexStream;

    use super::*;
    use crate::engine::worker::WorkerChannel;

    /// Hands out in-memory channels whose worker side never answers.
    #[derive(Default)]
    struct ParkedLauncher {
        parked: Mutex<Vec<DuplexStream>>,
    }

    impl WorkerLauncher for ParkedLauncher {
        fn launch(&self, _mode: ThreadingMode) -> io::Result<WorkerChannel> {
            let (session_side, worker_side) = tokio::io::duplex(64 * 1024);
            self.parked.lock().push(worker_side);
            let (read, write) = tokio::io::split(session_side);
            Ok(WorkerChannel::from_streams(write, read))
        }
    }

    fn controller() -> Controller {
        let (_requests, receiver) = mpsc::unbounded_channel();
        Controller::new(
            Arc::new(ParkedLauncher::default()),
            SessionConfig::default(),
            Arc::new(Mutex::new(Shared::default())),
            receiver,
        )
    }

    fn line(generation: u64, text: &str) -> TaggedEvent {
        TaggedEvent {
            generation,
            event: WorkerEvent::Line(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let mut controller = controller();
        controller.start(ThreadingMode::Multi).await;
        let stale = controller.generation;
        controller.start(ThreadingMode::Single).await;
        let current = controller.generation;
        assert_eq!(current, stale + 1);

        controller.on_event(line(stale, "uciok")).await;
        controller.on_event(line(stale, "readyok")).await;
        controller
            .on_event(TaggedEvent {
                generation: stale,
                event: WorkerEvent::Closed("old worker exited".to_string()),
            })
            .await;
        assert_eq!(controller.readiness, Readiness::Initializing);
        assert_eq!(controller.shared.lock().mode, Some(ThreadingMode::Single));

        controller.on_event(line(current, "uciok")).await;
        controller.on_event(line(current, "readyok")).await;
        assert_eq!(controller.readiness, Readiness::Ready);
        assert_eq!(controller.shared.lock().readiness, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_bestmove_while_initializing_keeps_search_deferred() {
        let mut controller = controller();
        controller.start(ThreadingMode::Multi).await;
        let generation = controller.generation;

        let (reply, mut outcome) = oneshot::channel();
        controller
            .on_search_request("startpos".to_string(), SearchLimit::Depth(2), reply)
            .await;
        controller.on_event(line(generation, "bestmove a2a3")).await;

        assert!(outcome.try_recv().is_err());
        assert!(controller.search.as_ref().is_some_and(|search| !search.dispatched));

        controller.on_event(line(generation, "uciok")).await;
        controller.on_event(line(generation, "readyok")).await;
        assert!(controller.search.as_ref().is_some_and(|search| search.dispatched));

        controller.on_event(line(generation, "bestmove e2e4")).await;
        let result = outcome.try_recv().expect("search should be resolved");
        assert_eq!(result.map(|reply| reply.best_move), Ok("e2e4".to_string()));
        assert!(controller.search.is_none());
    }
}
