//! UCI (Universal Chess Interface) protocol codec for analysis clients.
//!
//! This crate formats the commands an analysis client sends to a UCI engine
//! and parses the lines the engine answers with.
//!
//! # Commands (client → engine)
//!
//! - `uci` - Initialize engine, get id and options
//! - `setoption name <id> value <x>` - Configure the engine
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Forget state from the previous game
//! - `position fen <fen> [moves <move>...]` - Set position
//! - `go [depth <d>] [movetime <ms>]` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Messages (engine → client)
//!
//! - `id name <name>` / `id author <author>`
//! - `uciok`, `readyok`
//! - `info ... score cp <x> | score mate <n> ...`
//! - `bestmove <move> [ponder <move>]`

mod command;
mod info;

pub use command::{GoOptions, GuiCommand, STARTPOS_FEN};
pub use info::{EngineInfo, Score};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// `id name <name>`
    IdName(String),
    /// `id author <author>`
    IdAuthor(String),
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found. `mv` is `None` when the engine reports `(none)`,
    /// i.e. the side to move has no legal move.
    BestMove {
        mv: Option<String>,
        ponder: Option<String>,
    },
}

impl EngineMessage {
    /// Parse one line of engine output.
    ///
    /// Returns `None` for lines the client does not act on (`option ...`,
    /// banners, blank lines).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next()? {
            "id" => {
                let field = parts.next()?;
                let value = parts.collect::<Vec<_>>().join(" ");
                match field {
                    "name" => Some(EngineMessage::IdName(value)),
                    "author" => Some(EngineMessage::IdAuthor(value)),
                    _ => None,
                }
            }
            "uciok" => Some(EngineMessage::UciOk),
            "readyok" => Some(EngineMessage::ReadyOk),
            "info" => EngineInfo::parse(line).map(EngineMessage::Info),
            "bestmove" => {
                let mv = parts
                    .next()
                    .filter(|m| *m != "(none)" && *m != "0000")
                    .map(str::to_string);
                let ponder = match parts.next() {
                    Some("ponder") => parts.next().map(str::to_string),
                    _ => None,
                };
                Some(EngineMessage::BestMove { mv, ponder })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_name() {
        assert_eq!(
            EngineMessage::parse("id name Stockfish 16.1"),
            Some(EngineMessage::IdName("Stockfish 16.1".to_string()))
        );
    }

    #[test]
    fn parse_sync_messages() {
        assert_eq!(EngineMessage::parse("uciok"), Some(EngineMessage::UciOk));
        assert_eq!(EngineMessage::parse("readyok\r"), Some(EngineMessage::ReadyOk));
    }

    #[test]
    fn parse_bestmove_with_ponder() {
        assert_eq!(
            EngineMessage::parse("bestmove e2e4 ponder e7e5"),
            Some(EngineMessage::BestMove {
                mv: Some("e2e4".to_string()),
                ponder: Some("e7e5".to_string())
            })
        );
    }

    #[test]
    fn parse_bestmove_none() {
        assert_eq!(
            EngineMessage::parse("bestmove (none)"),
            Some(EngineMessage::BestMove {
                mv: None,
                ponder: None
            })
        );
    }

    #[test]
    fn parse_info_message() {
        match EngineMessage::parse("info depth 5 score cp -12") {
            Some(EngineMessage::Info(info)) => assert_eq!(info.score, Some(Score::Cp(-12))),
            other => panic!("Expected info, got {:?}", other),
        }
    }

    #[test]
    fn ignored_lines() {
        assert_eq!(EngineMessage::parse(""), None);
        assert_eq!(
            EngineMessage::parse("option name Hash type spin default 16 min 1 max 33554432"),
            None
        );
        assert_eq!(EngineMessage::parse("Stockfish 16 by the Stockfish developers"), None);
    }

    #[test]
    fn uci_error_display() {
        let err = UciError::ParseError("bad".to_string());
        assert_eq!(err.to_string(), "Parse error: bad");
    }
}
