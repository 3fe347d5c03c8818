//! Universal Chess Interface (UCI) protocol subset spoken to a worker.
//!
//! Only the commands a GUI needs to drive a single search session are
//! modelled: handshake, option setting, position, fixed-depth or
//! fixed-time search, and the `bestmove` reply that terminates it.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub mod command;
pub mod message;
pub mod options;

pub use command::{parse_uci_command, UciCommand};
pub use message::EngineMessage;
pub use options::EngineOptions;

/// Caller-facing search request options.
///
/// `depth` wins over `move_time_ms` when both are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchOptions {
    pub move_time_ms: Option<u64>,
    pub depth: Option<u32>,
}

impl SearchOptions {
    #[must_use]
    pub fn move_time(ms: u64) -> Self {
        SearchOptions {
            move_time_ms: Some(ms),
            depth: None,
        }
    }

    #[must_use]
    pub fn depth(depth: u32) -> Self {
        SearchOptions {
            move_time_ms: None,
            depth: Some(depth),
        }
    }

    /// Resolve to the single limit sent with `go`.
    #[must_use]
    pub fn limit(&self, default_move_time_ms: u64) -> SearchLimit {
        match (self.depth, self.move_time_ms) {
            (Some(depth), _) => SearchLimit::Depth(depth),
            (None, Some(ms)) => SearchLimit::MoveTime(ms),
            (None, None) => SearchLimit::MoveTime(default_move_time_ms),
        }
    }
}

/// Limit attached to a `go` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SearchLimit {
    Depth(u32),
    MoveTime(u64),
}

impl SearchLimit {
    /// Wall-clock time the worker is allowed to think (zero for depth searches).
    #[must_use]
    pub fn budget(&self) -> Duration {
        match self {
            SearchLimit::Depth(_) => Duration::ZERO,
            SearchLimit::MoveTime(ms) => Duration::from_millis(*ms),
        }
    }
}

/// Result of a finished search.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BestMove {
    /// Best move in coordinate notation (e.g. "e2e4", "e7e8q")
    pub best_move: String,
    /// Expected reply, when the worker reports one
    pub ponder: Option<String>,
}

impl BestMove {
    /// Parse a `bestmove <move> [ponder <move>]` line.
    ///
    /// Tokens other than the move and the `ponder` pair are ignored. A ponder
    /// token that is not a coordinate move is dropped.
    pub fn parse(line: &str) -> Result<Self, EngineError> {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("bestmove") {
            return Err(EngineError::protocol(line));
        }

        let best_move = tokens
            .next()
            .filter(|token| is_coordinate_move(token))
            .ok_or_else(|| EngineError::protocol(line))?;

        let ponder = tokens
            .skip_while(|token| *token != "ponder")
            .nth(1)
            .filter(|token| is_coordinate_move(token))
            .map(str::to_string);

        Ok(BestMove {
            best_move: best_move.to_string(),
            ponder,
        })
    }
}

/// Check for compact coordinate notation: from-square, to-square, optional
/// promotion letter.
#[must_use]
pub fn is_coordinate_move(notation: &str) -> bool {
    let bytes = notation.as_bytes();
    if !matches!(bytes.len(), 4 | 5) {
        return false;
    }
    let is_file = |b: u8| (b'a'..=b'h').contains(&b);
    let is_rank = |b: u8| (b'1'..=b'8').contains(&b);

    is_file(bytes[0])
        && is_rank(bytes[1])
        && is_file(bytes[2])
        && is_rank(bytes[3])
        && bytes
            .get(4)
            .map_or(true, |promo| matches!(promo, b'q' | b'r' | b'b' | b'n'))
}

/// Reject positions that would reach the worker as a bare `position fen`.
pub fn check_position(position: &str) -> Result<(), EngineError> {
    let trimmed = position.trim();
    if trimmed.is_empty() || trimmed == "fen" {
        return Err(EngineError::InvalidPosition {
            position: position.to_string(),
        });
    }
    Ok(())
}

/// Build the argument of a `position` command.
///
/// `startpos ...` and `fen ...` are forwarded as-is; anything else is taken
/// to be a bare FEN.
#[must_use]
pub fn position_argument(position: &str) -> String {
    let trimmed = position.trim();
    if trimmed.starts_with("startpos") || trimmed.starts_with("fen ") {
        trimmed.to_string()
    } else {
        format!("fen {trimmed}")
    }
}
