use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;

use uci_session::{EngineSession, ProcessLauncher, SearchOptions, SessionConfig, WorkerCommand};

/// Ask a UCI engine for one move, falling back to a single-threaded build
/// when the primary one does not come up.
#[derive(Debug, Parser)]
#[command(name = "uci-session", version)]
struct Args {
    /// Primary (multi-threaded) engine executable
    #[arg(long)]
    engine: PathBuf,

    /// Single-threaded fallback executable (defaults to --engine)
    #[arg(long)]
    fallback: Option<PathBuf>,

    /// Position to search, as FEN or "startpos [moves ...]"
    #[arg(long, default_value = "startpos")]
    fen: String,

    /// Search time in milliseconds
    #[arg(long)]
    movetime: Option<u64>,

    /// Search depth (takes precedence over --movetime)
    #[arg(long)]
    depth: Option<u32>,

    /// Skill level, 0..=20
    #[arg(long)]
    skill: Option<i64>,

    /// Hash size in MB, 16..=4096
    #[arg(long)]
    hash: Option<i64>,

    /// Threads for the primary engine, 1..=8 (default: detected)
    #[arg(long)]
    threads: Option<usize>,

    /// Handshake watchdog in milliseconds
    #[arg(long, default_value_t = uci_session::config::HANDSHAKE_TIMEOUT_MS)]
    handshake_timeout_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let primary = WorkerCommand::new(&args.engine);
    let launcher = match &args.fallback {
        Some(fallback) => ProcessLauncher::new(primary, WorkerCommand::new(fallback)),
        None => ProcessLauncher::single_binary(primary),
    };
    let config = SessionConfig {
        handshake_timeout: Duration::from_millis(args.handshake_timeout_ms),
        threads: args.threads,
        ..SessionConfig::default()
    };

    let session = EngineSession::new(launcher, config);
    if let Some(level) = args.skill {
        session.set_skill_level(level);
    }
    if let Some(mb) = args.hash {
        session.set_hash_size_mb(mb);
    }

    session
        .initialize()
        .await
        .with_context(|| format!("could not start {}", args.engine.display()))?;
    let variant = if session.using_fallback() { "fallback" } else { "primary" };
    info!("running the {variant} variant");

    let options = SearchOptions {
        move_time_ms: args.movetime,
        depth: args.depth,
    };
    let result = session.best_move(&args.fen, options).await;
    session.dispose().await;
    let reply = result.context("search failed")?;

    match reply.ponder {
        Some(ponder) => println!("bestmove {} ponder {ponder}", reply.best_move),
        None => println!("bestmove {}", reply.best_move),
    }
    println!("variant {variant}");
    Ok(())
}
