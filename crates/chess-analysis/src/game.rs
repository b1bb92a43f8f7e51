//! Move extraction from PGN.
//!
//! [`parse_pgn`] turns a game record into an ordered list of validated
//! moves, each carrying the position it was played from. Moves are replayed
//! with `shakmaty`, so anything the analysis pipeline receives is legal.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position};

use crate::error::AnalysisError;

/// The side making a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Back rank of this side, `1` or `8`.
    pub fn home_rank(self) -> char {
        match self {
            Side::White => '1',
            Side::Black => '8',
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

/// A legal move together with the position it was played from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameMove {
    /// Half-move counter, starting at 1.
    pub ply: usize,
    /// Full-move number as shown in the movetext (`1.` for both `e4` and `e5`).
    pub move_number: u32,
    /// Side that played the move
    pub mover: Side,
    /// The move as written in the game record
    pub san: String,
    /// The same move in UCI coordinate notation
    pub uci: String,
    /// FEN of the position before the move
    pub fen_before: String,
}

/// A parsed game record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedGame {
    /// Tag pairs such as `White`, `Black`, `Result`.
    pub headers: BTreeMap<String, String>,
    pub moves: Vec<GameMove>,
}

/// Parses a single-game PGN and replays its main line.
///
/// Tag pairs are collected as headers. Comments, variations, NAGs, move
/// numbers and the result token are skipped. Play starts from the `FEN` tag
/// when present, otherwise from the standard position.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for malformed tags, unbalanced
/// comments or variations, unreadable move tokens, and illegal moves.
pub fn parse_pgn(pgn: &str) -> Result<ParsedGame, AnalysisError> {
    let (headers, movetext) = split_tags(pgn)?;
    let tokens = movetext_tokens(&movetext)?;

    let mut pos = starting_position(&headers)?;
    let mut moves = Vec::with_capacity(tokens.len());

    for token in tokens {
        let san: San = token.parse().map_err(|_| {
            AnalysisError::InvalidInput(format!("unreadable move '{}'", token))
        })?;
        let mv = san.to_move(&pos).map_err(|_| {
            AnalysisError::InvalidInput(format!(
                "illegal move '{}' at move {}",
                token,
                pos.fullmoves()
            ))
        })?;

        moves.push(GameMove {
            ply: moves.len() + 1,
            move_number: pos.fullmoves().get(),
            mover: pos.turn().into(),
            san: token,
            uci: mv.to_uci(CastlingMode::Standard).to_string(),
            fen_before: fen_of(&pos),
        });
        pos.play_unchecked(&mv);
    }

    Ok(ParsedGame { headers, moves })
}

/// Plays `uci` on the position `fen` and returns the resulting FEN.
///
/// # Errors
///
/// Returns [`AnalysisError::InternalInconsistency`] if either the position
/// or the move is invalid; both are expected to come from [`parse_pgn`].
pub fn apply_move(fen: &str, uci: &str) -> Result<String, AnalysisError> {
    let mut pos = position_from_fen(fen).map_err(AnalysisError::InternalInconsistency)?;
    let mv = uci
        .parse::<UciMove>()
        .ok()
        .and_then(|m| m.to_move(&pos).ok())
        .ok_or_else(|| {
            AnalysisError::InternalInconsistency(format!(
                "move '{}' cannot be played in position '{}'",
                uci, fen
            ))
        })?;
    pos.play_unchecked(&mv);
    Ok(fen_of(&pos))
}

fn fen_of(pos: &Chess) -> String {
    Fen(pos.clone().into_setup(EnPassantMode::Legal)).to_string()
}

fn position_from_fen(fen: &str) -> Result<Chess, String> {
    let parsed: Fen = fen
        .parse()
        .map_err(|e| format!("invalid FEN '{}': {}", fen, e))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| format!("impossible position '{}': {}", fen, e))
}

fn starting_position(headers: &BTreeMap<String, String>) -> Result<Chess, AnalysisError> {
    match headers.get("FEN") {
        Some(fen) => position_from_fen(fen).map_err(AnalysisError::InvalidInput),
        None => Ok(Chess::default()),
    }
}

/// Splits leading `[Tag "value"]` lines from the movetext.
fn split_tags(pgn: &str) -> Result<(BTreeMap<String, String>, String), AnalysisError> {
    let mut headers = BTreeMap::new();
    let mut movetext = String::new();
    let mut in_tags = true;

    for line in pgn.lines() {
        let trimmed = line.trim();
        if in_tags && trimmed.starts_with('[') {
            let (key, value) = parse_tag(trimmed)?;
            headers.insert(key, value);
            continue;
        }
        if !trimmed.is_empty() {
            in_tags = false;
        }
        movetext.push_str(line);
        movetext.push('\n');
    }

    Ok((headers, movetext))
}

fn parse_tag(line: &str) -> Result<(String, String), AnalysisError> {
    let malformed = || AnalysisError::InvalidInput(format!("malformed tag pair: {}", line));

    let inner = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(malformed)?
        .trim();
    let (key, rest) = inner.split_once(char::is_whitespace).ok_or_else(malformed)?;
    let value = rest
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(malformed)?;

    Ok((key.to_string(), value.replace("\\\"", "\"").replace("\\\\", "\\")))
}

/// Extracts the main-line move tokens from movetext.
fn movetext_tokens(movetext: &str) -> Result<Vec<String>, AnalysisError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = movetext.chars();
    let mut variation_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush_token(&mut current, &mut tokens, variation_depth);
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(AnalysisError::InvalidInput(
                        "unterminated comment".to_string(),
                    ));
                }
            }
            ';' => {
                flush_token(&mut current, &mut tokens, variation_depth);
                chars.by_ref().find(|&c| c == '\n');
            }
            '(' => {
                flush_token(&mut current, &mut tokens, variation_depth);
                variation_depth += 1;
            }
            ')' => {
                flush_token(&mut current, &mut tokens, variation_depth);
                variation_depth = variation_depth.checked_sub(1).ok_or_else(|| {
                    AnalysisError::InvalidInput("unbalanced ')' in movetext".to_string())
                })?;
            }
            c if c.is_whitespace() => flush_token(&mut current, &mut tokens, variation_depth),
            c => current.push(c),
        }
    }
    flush_token(&mut current, &mut tokens, variation_depth);

    if variation_depth > 0 {
        return Err(AnalysisError::InvalidInput(
            "unterminated variation".to_string(),
        ));
    }
    Ok(tokens)
}

fn flush_token(current: &mut String, tokens: &mut Vec<String>, variation_depth: usize) {
    let raw = std::mem::take(current);
    if variation_depth > 0 {
        return;
    }
    if let Some(token) = normalize_token(&raw) {
        tokens.push(token);
    }
}

/// Reduces a raw movetext token to bare SAN, or `None` if it is not a move.
fn normalize_token(raw: &str) -> Option<String> {
    if raw.is_empty() || raw.starts_with('$') {
        return None;
    }
    if matches!(raw, "1-0" | "0-1" | "1/2-1/2" | "*") {
        return None;
    }

    // "12." / "12..." / "12.e4"
    let after_digits = raw.trim_start_matches(|c: char| c.is_ascii_digit());
    let token = if after_digits.len() < raw.len() && after_digits.starts_with('.') {
        after_digits.trim_start_matches('.')
    } else {
        raw
    };

    let token = token.trim_end_matches(['!', '?', '+', '#']);
    if token.is_empty() {
        return None;
    }
    if token.starts_with("0-0") {
        return Some(token.replace('0', "O"));
    }
    Some(token.to_string())
}
