//! Game-level statistics derived from evaluated moves.

use serde::Serialize;

use crate::game::Side;
use crate::level::{classify, MLevel};
use crate::pipeline::EvaluatedMove;

/// Moves with loss below this count as accurate.
pub const ACCURATE_LOSS: u32 = 10;

/// Moves with loss below this keep a flow run going.
pub const FLOW_LOSS: u32 = 20;

/// Maximum opening length in moves.
pub const MAX_OPENING_MOVES: usize = 15;

/// Width of each collapse-detection window.
pub const COLLAPSE_WINDOW: usize = 5;

/// Summary of one game phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub average_loss: f64,
    pub classification_level: MLevel,
    /// Fraction of moves in the phase with loss below [`ACCURATE_LOSS`].
    pub accuracy_fraction: f64,
    pub move_count: usize,
}

/// Opening, middlegame and endgame summaries; a phase with no moves is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Phases {
    pub opening: Option<PhaseSummary>,
    pub middlegame: Option<PhaseSummary>,
    pub endgame: Option<PhaseSummary>,
}

/// A sudden, sustained rise in error rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollapseEvent {
    /// Position in the move sequence (0-based) where the worse window starts.
    pub move_index: usize,
    /// Full-move number of the move at `move_index`.
    pub move_number: u32,
    pub mover: Side,
    pub loss_before_window: f64,
    pub loss_after_window: f64,
    /// `loss_after_window / max(loss_before_window, 1)`
    pub severity: f64,
}

/// Complete metrics for one analysed game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub moves: Vec<EvaluatedMove>,
    pub phases: Phases,
    pub collapse_events: Vec<CollapseEvent>,
    pub average_loss: f64,
    pub accuracy: f64,
    pub flow_stability: f64,
    pub pattern_match_rate: f64,
    pub classification: MLevel,
    pub blunders: usize,
    pub mistakes: usize,
}

/// Reduces an evaluated-move sequence to an [`AnalysisResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEngine;

impl MetricsEngine {
    pub fn compute(&self, moves: Vec<EvaluatedMove>) -> AnalysisResult {
        let losses: Vec<u32> = moves.iter().map(|m| m.centipawn_loss).collect();
        let average = average_loss(&losses);

        AnalysisResult {
            phases: phases(&losses),
            collapse_events: detect_collapses(&moves),
            average_loss: average,
            accuracy: accuracy(&losses),
            flow_stability: flow_stability(&losses),
            pattern_match_rate: pattern_match_rate(&moves),
            classification: classify(average),
            blunders: moves.iter().filter(|m| m.is_blunder).count(),
            mistakes: moves.iter().filter(|m| m.is_mistake).count(),
            moves,
        }
    }
}

/// Mean loss, `0.0` when there are no moves.
pub fn average_loss(losses: &[u32]) -> f64 {
    if losses.is_empty() {
        return 0.0;
    }
    losses.iter().map(|&l| f64::from(l)).sum::<f64>() / losses.len() as f64
}

/// Fraction of moves with loss below [`ACCURATE_LOSS`].
pub fn accuracy(losses: &[u32]) -> f64 {
    fraction(losses.iter().filter(|&&l| l < ACCURATE_LOSS).count(), losses.len())
}

/// Longest run of moves with loss below [`FLOW_LOSS`], as a fraction of
/// all moves.
pub fn flow_stability(losses: &[u32]) -> f64 {
    let mut longest = 0;
    let mut current = 0;
    for &loss in losses {
        if loss < FLOW_LOSS {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    fraction(longest, losses.len())
}

/// Fraction of moves that matched the engine's best move.
pub fn pattern_match_rate(moves: &[EvaluatedMove]) -> f64 {
    fraction(moves.iter().filter(|m| m.matched_best).count(), moves.len())
}

/// Opening end and endgame start for a game of `n` moves.
///
/// The opening is `[0, opening_end)`, the middlegame
/// `[opening_end, endgame_start)` and the endgame `[endgame_start, n)`.
pub fn phase_bounds(n: usize) -> (usize, usize) {
    let third = n / 3;
    let opening_end = MAX_OPENING_MOVES.min(third);
    let endgame_start = (opening_end + 1).max(n - third).min(n);
    (opening_end, endgame_start)
}

pub fn phases(losses: &[u32]) -> Phases {
    let (opening_end, endgame_start) = phase_bounds(losses.len());
    Phases {
        opening: summarize(&losses[..opening_end]),
        middlegame: summarize(&losses[opening_end..endgame_start]),
        endgame: summarize(&losses[endgame_start..]),
    }
}

fn summarize(losses: &[u32]) -> Option<PhaseSummary> {
    if losses.is_empty() {
        return None;
    }
    let average = average_loss(losses);
    Some(PhaseSummary {
        average_loss: average,
        classification_level: classify(average),
        accuracy_fraction: accuracy(losses),
        move_count: losses.len(),
    })
}

/// Flags every index where a calm window is followed by a much worse one.
///
/// Overlapping events are all reported.
pub fn detect_collapses(moves: &[EvaluatedMove]) -> Vec<CollapseEvent> {
    let n = moves.len();
    if n < 2 * COLLAPSE_WINDOW {
        return Vec::new();
    }
    let losses: Vec<u32> = moves.iter().map(|m| m.centipawn_loss).collect();

    (COLLAPSE_WINDOW..n - COLLAPSE_WINDOW)
        .filter_map(|i| {
            let before = average_loss(&losses[i - COLLAPSE_WINDOW..i]);
            let after = average_loss(&losses[i..i + COLLAPSE_WINDOW]);
            let collapsed = before < 30.0 && after > 2.5 * before && after > 50.0;
            collapsed.then(|| CollapseEvent {
                move_index: i,
                move_number: moves[i].index,
                mover: moves[i].mover,
                loss_before_window: before,
                loss_after_window: after,
                severity: after / before.max(1.0),
            })
        })
        .collect()
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
