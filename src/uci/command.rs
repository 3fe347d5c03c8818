use std::fmt;

use super::{position_argument, SearchLimit};

/// Command sent from the session to the worker.
///
/// `Display` yields the exact wire line, without the trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    SetOption { name: String, value: String },
    /// Argument already normalised by [`position_argument`]
    Position(String),
    Go(SearchLimit),
    Quit,
}

impl UciCommand {
    #[must_use]
    pub fn set_option(name: impl Into<String>, value: impl ToString) -> Self {
        UciCommand::SetOption {
            name: name.into(),
            value: value.to_string(),
        }
    }

    #[must_use]
    pub fn position(position: &str) -> Self {
        UciCommand::Position(position_argument(position))
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::UciNewGame => f.write_str("ucinewgame"),
            UciCommand::SetOption { name, value } => {
                write!(f, "setoption name {name} value {value}")
            }
            UciCommand::Position(argument) => write!(f, "position {argument}"),
            UciCommand::Go(SearchLimit::Depth(depth)) => write!(f, "go depth {depth}"),
            UciCommand::Go(SearchLimit::MoveTime(ms)) => write!(f, "go movetime {ms}"),
            UciCommand::Quit => f.write_str("quit"),
        }
    }
}

/// Parse a line as seen by the worker. Lines outside the modelled subset
/// yield `None`.
pub fn parse_uci_command(line: &str) -> Option<UciCommand> {
    let trimmed = line.trim();
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let (&keyword, rest) = parts.split_first()?;

    let cmd = match keyword {
        "uci" => UciCommand::Uci,
        "isready" => UciCommand::IsReady,
        "ucinewgame" => UciCommand::UciNewGame,
        "quit" => UciCommand::Quit,
        "position" if !rest.is_empty() => UciCommand::Position(rest.join(" ")),
        "go" => match rest {
            ["depth", n, ..] => UciCommand::Go(SearchLimit::Depth(n.parse().ok()?)),
            ["movetime", n, ..] => UciCommand::Go(SearchLimit::MoveTime(n.parse().ok()?)),
            _ => return None,
        },
        "setoption" => parse_setoption(rest)?,
        _ => return None,
    };

    Some(cmd)
}

fn parse_setoption(parts: &[&str]) -> Option<UciCommand> {
    let mut name_parts: Vec<&str> = Vec::new();
    let mut value_parts: Vec<&str> = Vec::new();
    let mut mode = "";

    for part in parts {
        match *part {
            "name" if mode.is_empty() => mode = "name",
            "value" if mode == "name" => mode = "value",
            _ => match mode {
                "name" => name_parts.push(part),
                "value" => value_parts.push(part),
                _ => {}
            },
        }
    }

    if name_parts.is_empty() {
        return None;
    }

    Some(UciCommand::SetOption {
        name: name_parts.join(" "),
        value: value_parts.join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_lines() {
        assert_eq!(UciCommand::Uci.to_string(), "uci");
        assert_eq!(UciCommand::UciNewGame.to_string(), "ucinewgame");
        assert_eq!(
            UciCommand::set_option("Skill Level", 7).to_string(),
            "setoption name Skill Level value 7"
        );
        assert_eq!(
            UciCommand::set_option("Ponder", false).to_string(),
            "setoption name Ponder value false"
        );
        assert_eq!(
            UciCommand::position("startpos").to_string(),
            "position startpos"
        );
        assert_eq!(
            UciCommand::Go(SearchLimit::Depth(9)).to_string(),
            "go depth 9"
        );
        assert_eq!(
            UciCommand::Go(SearchLimit::MoveTime(500)).to_string(),
            "go movetime 500"
        );
    }

    #[test]
    fn test_parse_setoption_with_spaces() {
        let cmd = parse_uci_command("setoption name Skill Level value 12").unwrap();
        assert_eq!(cmd, UciCommand::set_option("Skill Level", 12));
    }

    #[test]
    fn test_parse_position_and_go() {
        assert_eq!(
            parse_uci_command("position fen 8/8/8/8/8/8/8/K1k5 w - - 0 1"),
            Some(UciCommand::Position("fen 8/8/8/8/8/8/8/K1k5 w - - 0 1".to_string()))
        );
        assert_eq!(
            parse_uci_command("go movetime 50"),
            Some(UciCommand::Go(SearchLimit::MoveTime(50)))
        );
        assert_eq!(parse_uci_command("go infinite"), None);
        assert_eq!(parse_uci_command("go depth x"), None);
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert_eq!(parse_uci_command(""), None);
        assert_eq!(parse_uci_command("   "), None);
        assert_eq!(parse_uci_command("perft 3"), None);
        assert_eq!(parse_uci_command("setoption value 3"), None);
    }
}
