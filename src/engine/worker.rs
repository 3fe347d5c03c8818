//! Worker launching and the byte channel to a running worker.

use std::fmt;
use std::io;
use std::process::Stdio;

use log::trace;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::WorkerCommand;
use crate::uci::UciCommand;

/// Which build of the worker is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThreadingMode {
    /// Primary, threading-capable variant
    Multi,
    /// Fallback, single-threaded variant
    Single,
}

impl ThreadingMode {
    /// Variant to try when this one fails to come up.
    #[must_use]
    pub fn fallback(self) -> Option<ThreadingMode> {
        match self {
            ThreadingMode::Multi => Some(ThreadingMode::Single),
            ThreadingMode::Single => None,
        }
    }
}

impl fmt::Display for ThreadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadingMode::Multi => f.write_str("multi-threaded"),
            ThreadingMode::Single => f.write_str("single-threaded"),
        }
    }
}

/// Longest worker line kept; the rest of an over-long line is discarded.
const MAX_LINE_BYTES: usize = 64 * 1024;

type Input = Box<dyn AsyncWrite + Send + Unpin>;
type Output = Box<dyn AsyncRead + Send + Unpin>;

/// Both directions of a launched worker, plus the process when there is one.
pub struct WorkerChannel {
    input: Input,
    output: Output,
    process: Option<Child>,
}

impl WorkerChannel {
    /// Wrap a child spawned with piped stdin and stdout.
    pub fn from_process(mut child: Child) -> io::Result<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "worker stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "worker stdout not piped"))?;
        Ok(WorkerChannel {
            input: Box::new(stdin),
            output: Box::new(stdout),
            process: Some(child),
        })
    }

    /// Wrap arbitrary streams, e.g. an in-process worker.
    pub fn from_streams<W, R>(input: W, output: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        WorkerChannel {
            input: Box::new(input),
            output: Box::new(output),
            process: None,
        }
    }
}

/// Starts worker variants on demand.
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, mode: ThreadingMode) -> io::Result<WorkerChannel>;
}

/// Launches each variant as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    primary: WorkerCommand,
    fallback: WorkerCommand,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(primary: WorkerCommand, fallback: WorkerCommand) -> Self {
        ProcessLauncher { primary, fallback }
    }

    /// One binary for both variants; the fallback just runs on one thread.
    #[must_use]
    pub fn single_binary(command: WorkerCommand) -> Self {
        ProcessLauncher {
            fallback: command.clone(),
            primary: command,
        }
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, mode: ThreadingMode) -> io::Result<WorkerChannel> {
        let command = match mode {
            ThreadingMode::Multi => &self.primary,
            ThreadingMode::Single => &self.fallback,
        };
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        WorkerChannel::from_process(child)
    }
}

/// Something the reader task saw on a worker's output.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Line(String),
    Closed(String),
}

/// A worker event tagged with the generation of the channel it came from.
#[derive(Debug)]
pub(crate) struct TaggedEvent {
    pub generation: u64,
    pub event: WorkerEvent,
}

/// The live half of a launched worker, owned by the controller.
pub(crate) struct Worker {
    pub generation: u64,
    pub mode: ThreadingMode,
    input: Input,
    process: Option<Child>,
    reader: JoinHandle<()>,
}

impl Worker {
    pub fn start(
        channel: WorkerChannel,
        generation: u64,
        mode: ThreadingMode,
        events: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        let WorkerChannel {
            input,
            output,
            process,
        } = channel;
        let reader = tokio::spawn(forward_lines(output, generation, events));
        Worker {
            generation,
            mode,
            input,
            process,
            reader,
        }
    }

    pub async fn send(&mut self, command: &UciCommand) -> io::Result<()> {
        trace!(">> {command}");
        let line = format!("{command}\n");
        self.input.write_all(line.as_bytes()).await?;
        self.input.flush().await
    }

    /// Ask the worker to quit, then make sure it is gone.
    pub async fn shutdown(mut self) {
        let _ = self.send(&UciCommand::Quit).await;
        self.reader.abort();
        if let Some(process) = self.process.as_mut() {
            let _ = process.start_kill();
        }
    }
}

async fn forward_lines(
    output: Output,
    generation: u64,
    events: mpsc::UnboundedSender<TaggedEvent>,
) {
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        let event = match read_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => WorkerEvent::Line(line),
            Ok(None) => WorkerEvent::Closed("worker closed its output".to_string()),
            Err(err) => WorkerEvent::Closed(format!("reading worker output failed: {err}")),
        };
        let closed = matches!(event, WorkerEvent::Closed(_));
        if events.send(TaggedEvent { generation, event }).is_err() || closed {
            return;
        }
    }
}

/// Read one newline-terminated line, or `None` at end of stream.
///
/// Bytes that are not UTF-8 are replaced rather than rejected, a trailing
/// `\r` is stripped, and anything past [`MAX_LINE_BYTES`] is dropped.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut truncated = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if buf.is_empty() && !truncated {
                return Ok(None);
            }
            break;
        }

        let (chunk, used, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (&available[..end], end + 1, true),
            None => (available, available.len(), false),
        };
        let room = MAX_LINE_BYTES - buf.len();
        if chunk.len() > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        reader.consume(used);
        if complete {
            break;
        }
    }

    if truncated {
        trace!("worker line exceeded {MAX_LINE_BYTES} bytes, truncated");
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
