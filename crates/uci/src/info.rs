//! UCI info line types.

use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};

/// Score in centipawns or mate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = side to move mates, negative = side to move is mated).
    Mate(i32),
}

/// Search information reported in an `info` line.
///
/// Only the fields an analysis client acts on are kept; `currmove`,
/// `hashfull`, `tbhits` and the like are skipped while parsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    /// Which line of a multi-PV search this is.
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time: Option<u64>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    /// Free text after `string`.
    pub string: Option<String>,
}

const KEYWORDS: &[&str] = &[
    "depth",
    "seldepth",
    "multipv",
    "score",
    "nodes",
    "nps",
    "time",
    "pv",
    "currmove",
    "currmovenumber",
    "hashfull",
    "tbhits",
    "sbhits",
    "cpuload",
    "refutation",
    "currline",
    "string",
];

impl EngineInfo {
    /// Parse one `info` line.
    ///
    /// Returns `None` for lines that are not `info` lines. Values that fail
    /// to parse leave their field unset; bound markers (`lowerbound`,
    /// `upperbound`) are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().peekable();
        if tokens.next() != Some("info") {
            return None;
        }

        let mut info = Self::default();
        while let Some(key) = tokens.next() {
            match key {
                "depth" => info.depth = value(&mut tokens),
                "seldepth" => info.seldepth = value(&mut tokens),
                "multipv" => info.multipv = value(&mut tokens),
                "nodes" => info.nodes = value(&mut tokens),
                "nps" => info.nps = value(&mut tokens),
                "time" => info.time = value(&mut tokens),
                "score" => {
                    let kind = tokens.next();
                    let amount = value(&mut tokens);
                    match (kind, amount) {
                        (Some("cp"), Some(cp)) => info.score = Some(Score::Cp(cp)),
                        (Some("mate"), Some(m)) => info.score = Some(Score::Mate(m)),
                        _ => {}
                    }
                }
                "pv" => {
                    while let Some(mv) = tokens.next_if(|t| !KEYWORDS.contains(t)) {
                        info.pv.push(mv.to_string());
                    }
                }
                "string" => {
                    info.string = Some(tokens.by_ref().collect::<Vec<_>>().join(" "));
                }
                _ => {}
            }
        }

        Some(info)
    }
}

fn value<T: FromStr>(tokens: &mut Peekable<SplitWhitespace<'_>>) -> Option<T> {
    tokens.next().and_then(|t| t.parse().ok())
}
