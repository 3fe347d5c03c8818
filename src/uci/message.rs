/// A line received from the worker, classified by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMessage<'a> {
    /// `uciok`: protocol acknowledged
    UciOk,
    /// `readyok`: answer to `isready`
    ReadyOk,
    /// `bestmove ...`: terminates a search, holds the whole line
    BestMove(&'a str),
    /// `id name ...` / `id author ...`
    Id { field: &'a str, value: &'a str },
    /// `info ...`: search progress, holds the whole line
    Info(&'a str),
    /// `option name ...`: advertised option
    OptionInfo(&'a str),
    Other(&'a str),
}

impl<'a> EngineMessage<'a> {
    #[must_use]
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim_start()),
            None => (trimmed, ""),
        };

        match keyword {
            "uciok" => EngineMessage::UciOk,
            "readyok" => EngineMessage::ReadyOk,
            "bestmove" => EngineMessage::BestMove(trimmed),
            "info" => EngineMessage::Info(trimmed),
            "option" => EngineMessage::OptionInfo(trimmed),
            "id" => {
                let (field, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                EngineMessage::Id {
                    field,
                    value: value.trim(),
                }
            }
            _ => EngineMessage::Other(trimmed),
        }
    }
}
