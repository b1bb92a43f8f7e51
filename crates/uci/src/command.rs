//! Commands sent from the analysis client to the engine.

use std::fmt;

use crate::UciError;

/// FEN of the standard starting position, used for `position startpos`.
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Commands sent from GUI to engine.
///
/// [`Display`](fmt::Display) renders the protocol line without a trailing
/// newline.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// `setoption name <name> value <value>`
    SetOption { name: String, value: String },
    /// Tell the engine the next search belongs to a different game.
    UciNewGame,
    /// Set up a position, optionally followed by moves played from it.
    Position { fen: String, moves: Vec<String> },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Anything else, kept verbatim.
    Unknown(String),
}

/// Search limits for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    /// Depth-bounded search.
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }
}

impl GuiCommand {
    /// Shorthand for `setoption name <name> value <value>`.
    pub fn set_option(name: &str, value: impl ToString) -> Self {
        GuiCommand::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Shorthand for `position fen <fen>` without trailing moves.
    pub fn position_fen(fen: &str) -> Self {
        GuiCommand::Position {
            fen: fen.to_string(),
            moves: Vec::new(),
        }
    }

    /// Parse a UCI command line.
    ///
    /// The client only formats commands; parsing is what scripted engine
    /// doubles use to follow the conversation.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut tokens = input.split_whitespace();

        let command = match tokens.next() {
            Some("uci") => GuiCommand::Uci,
            Some("isready") => GuiCommand::IsReady,
            Some("ucinewgame") => GuiCommand::UciNewGame,
            Some("stop") => GuiCommand::Stop,
            Some("quit") => GuiCommand::Quit,
            Some("setoption") => parse_setoption(tokens.collect())?,
            Some("position") => parse_position(tokens.collect())?,
            Some("go") => GuiCommand::Go(parse_go(tokens)),
            _ => GuiCommand::Unknown(input.to_string()),
        };
        Ok(command)
    }
}

impl fmt::Display for GuiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuiCommand::Uci => f.write_str("uci"),
            GuiCommand::IsReady => f.write_str("isready"),
            GuiCommand::SetOption { name, value } => {
                write!(f, "setoption name {} value {}", name, value)
            }
            GuiCommand::UciNewGame => f.write_str("ucinewgame"),
            GuiCommand::Position { fen, moves } => {
                write!(f, "position fen {}", fen)?;
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            GuiCommand::Go(opts) => {
                f.write_str("go")?;
                if let Some(d) = opts.depth {
                    write!(f, " depth {}", d)?;
                }
                if let Some(n) = opts.nodes {
                    write!(f, " nodes {}", n)?;
                }
                if let Some(t) = opts.movetime {
                    write!(f, " movetime {}", t)?;
                }
                if opts.infinite {
                    f.write_str(" infinite")?;
                }
                Ok(())
            }
            GuiCommand::Stop => f.write_str("stop"),
            GuiCommand::Quit => f.write_str("quit"),
            GuiCommand::Unknown(raw) => f.write_str(raw),
        }
    }
}

fn parse_setoption(tokens: Vec<&str>) -> Result<GuiCommand, UciError> {
    let malformed = || UciError::ParseError("Expected 'setoption name <id> [value <x>]'".to_string());

    let rest = match tokens.split_first() {
        Some((&"name", rest)) => rest,
        _ => return Err(malformed()),
    };
    let (name, value) = match rest.iter().position(|&t| t == "value") {
        Some(at) => (&rest[..at], &rest[at + 1..]),
        None => (rest, &[][..]),
    };
    if name.is_empty() {
        return Err(malformed());
    }

    Ok(GuiCommand::SetOption {
        name: name.join(" "),
        value: value.join(" "),
    })
}

fn parse_position(tokens: Vec<&str>) -> Result<GuiCommand, UciError> {
    let (setup, moves) = match tokens.iter().position(|&t| t == "moves") {
        Some(at) => (&tokens[..at], &tokens[at + 1..]),
        None => (&tokens[..], &[][..]),
    };

    let fen = match setup.split_first() {
        Some((&"startpos", [])) => STARTPOS_FEN.to_string(),
        Some((&"fen", fen)) if !fen.is_empty() => fen.join(" "),
        _ => {
            return Err(UciError::ParseError(format!(
                "Expected 'startpos' or 'fen <fen>', got '{}'",
                setup.join(" ")
            )))
        }
    };

    Ok(GuiCommand::Position {
        fen,
        moves: moves.iter().map(|m| m.to_string()).collect(),
    })
}

fn parse_go<'a>(mut tokens: impl Iterator<Item = &'a str>) -> GoOptions {
    let mut opts = GoOptions::default();
    while let Some(key) = tokens.next() {
        match key {
            "depth" => opts.depth = tokens.next().and_then(|v| v.parse().ok()),
            "nodes" => opts.nodes = tokens.next().and_then(|v| v.parse().ok()),
            "movetime" => opts.movetime = tokens.next().and_then(|v| v.parse().ok()),
            "infinite" => opts.infinite = true,
            _ => {}
        }
    }
    opts
}
