//! In-process scripted UCI worker for driving `EngineSession` in tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use uci_session::uci::{parse_uci_command, UciCommand};
use uci_session::{ThreadingMode, WorkerChannel, WorkerLauncher};

/// How one launched worker behaves.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Completes the handshake, answers each `go` with the next scripted reply
    Responsive { replies: Vec<String> },
    /// Reads everything, never answers
    Silent,
    /// Launch itself fails
    FailLaunch,
    /// Closes its output right after launch
    CloseImmediately,
    /// Completes the handshake, then closes when asked to search
    CloseOnGo,
    /// Completes the handshake, never answers `go`
    StallOnGo,
    /// Writes `handshake` in answer to `uci` and `search` in answer to `go`, byte for byte
    Raw { handshake: Vec<u8>, search: Vec<u8> },
    /// Acknowledges `uci` only after `delay`
    LateAck { delay: Duration },
    /// Emits a stray `bestmove` before acknowledging `uci`
    EarlyBestMove,
}

impl Behaviour {
    pub fn responsive() -> Self {
        Behaviour::Responsive {
            replies: vec!["bestmove e2e4 ponder e7e5".to_string()],
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Behaviour::Responsive {
            replies: replies.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}

/// One call to `launch`, with everything that worker was sent.
#[derive(Debug, Clone)]
pub struct Launch {
    pub mode: ThreadingMode,
    pub received: Arc<Mutex<Vec<String>>>,
}

impl Launch {
    pub fn lines(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

/// Hands out behaviours in launch order; the last one repeats.
#[derive(Clone)]
pub struct ScriptedLauncher {
    behaviours: Arc<Mutex<VecDeque<Behaviour>>>,
    launches: Arc<Mutex<Vec<Launch>>>,
}

impl ScriptedLauncher {
    pub fn new(behaviours: Vec<Behaviour>) -> Self {
        assert!(!behaviours.is_empty());
        ScriptedLauncher {
            behaviours: Arc::new(Mutex::new(behaviours.into())),
            launches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    pub fn modes(&self) -> Vec<ThreadingMode> {
        self.launches.lock().iter().map(|l| l.mode).collect()
    }

    fn next_behaviour(&self) -> Behaviour {
        let mut behaviours = self.behaviours.lock();
        if behaviours.len() > 1 {
            behaviours.pop_front().unwrap()
        } else {
            behaviours.front().cloned().unwrap()
        }
    }
}

impl WorkerLauncher for ScriptedLauncher {
    fn launch(&self, mode: ThreadingMode) -> io::Result<WorkerChannel> {
        let behaviour = self.next_behaviour();
        let received = Arc::new(Mutex::new(Vec::new()));
        self.launches.lock().push(Launch {
            mode,
            received: Arc::clone(&received),
        });

        if matches!(behaviour, Behaviour::FailLaunch) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "scripted launch failure"));
        }

        let (session_side, worker_side) = tokio::io::duplex(64 * 1024);
        let (read, write) = tokio::io::split(session_side);
        tokio::spawn(run_worker(worker_side, behaviour, received));
        Ok(WorkerChannel::from_streams(write, read))
    }
}

async fn run_worker(
    stream: tokio::io::DuplexStream,
    behaviour: Behaviour,
    received: Arc<Mutex<Vec<String>>>,
) {
    if matches!(behaviour, Behaviour::CloseImmediately) {
        return;
    }

    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();
    let mut replies: VecDeque<String> = match &behaviour {
        Behaviour::Responsive { replies } => replies.iter().cloned().collect(),
        _ => VecDeque::new(),
    };
    let answers_handshake = !matches!(behaviour, Behaviour::Silent);
    let handshake: Vec<u8> = match &behaviour {
        Behaviour::Raw { handshake, .. } => handshake.clone(),
        Behaviour::EarlyBestMove => b"bestmove a2a3\nid name scripted\nuciok\n".to_vec(),
        _ => b"id name scripted\nid author tests\nuciok\n".to_vec(),
    };

    while let Ok(Some(line)) = lines.next_line().await {
        received.lock().push(line.clone());
        let answer: Vec<u8> = match parse_uci_command(&line) {
            Some(UciCommand::Uci) if answers_handshake => {
                if let Behaviour::LateAck { delay } = &behaviour {
                    tokio::time::sleep(*delay).await;
                }
                handshake.clone()
            }
            Some(UciCommand::IsReady) if answers_handshake => b"readyok\n".to_vec(),
            Some(UciCommand::Go(_)) => match &behaviour {
                Behaviour::Responsive { .. } => {
                    let reply = if replies.len() > 1 {
                        replies.pop_front().unwrap()
                    } else {
                        replies.front().cloned().unwrap_or_default()
                    };
                    format!("info depth 1 score cp 12\n{reply}\n").into_bytes()
                }
                Behaviour::Raw { search, .. } => search.clone(),
                Behaviour::LateAck { .. } | Behaviour::EarlyBestMove => {
                    b"bestmove e2e4 ponder e7e5\n".to_vec()
                }
                Behaviour::CloseOnGo => return,
                _ => continue,
            },
            Some(UciCommand::Quit) => return,
            _ => continue,
        };
        if write.write_all(&answer).await.is_err() {
            return;
        }
    }
}

/// Config with short watchdogs so fallback paths finish quickly.
pub fn fast_config() -> uci_session::SessionConfig {
    uci_session::SessionConfig {
        handshake_timeout: Duration::from_millis(150),
        search_timeout: Some(Duration::from_millis(200)),
        threads: Some(4),
        default_move_time_ms: 500,
    }
}

/// Lines in `lines` that start with `prefix`.
pub fn matching(lines: &[String], prefix: &str) -> Vec<String> {
    lines
        .iter()
        .filter(|line| line.starts_with(prefix))
        .cloned()
        .collect()
}

pub fn looks_like_opening_move(mv: &str) -> bool {
    let bytes = mv.as_bytes();
    bytes.len() == 4
        && (b'a'..=b'h').contains(&bytes[0])
        && (b'1'..=b'8').contains(&bytes[1])
        && (b'a'..=b'h').contains(&bytes[2])
        && (b'1'..=b'8').contains(&bytes[3])
}
