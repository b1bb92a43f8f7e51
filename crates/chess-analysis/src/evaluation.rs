//! Position evaluation types.

use serde::Serialize;
use uci::Score;

/// Centipawn magnitude of an immediate mate (`mate 0`).
pub const MATE_SCORE: i32 = 10_000;

/// Centipawns subtracted per move of mate distance.
pub const MATE_STEP: i32 = 10;

/// Mate distances beyond this are treated as this far away, so every
/// mate-derived value stays at or above `MATE_SCORE / 2`.
const MAX_MATE_DISTANCE: u32 = (MATE_SCORE / 2 / MATE_STEP) as u32;

/// Evaluation of one position as reported by the engine.
///
/// `score_cp` is relative to the side to move in that position. Forced
/// mates are folded into the same integer scale by [`score_to_centipawns`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionEvaluation {
    pub score_cp: i32,
    /// Engine's best move in UCI notation; `None` when the side to move has
    /// no legal move.
    pub best_move: Option<String>,
}

/// Converts a UCI score to a side-to-move centipawn value.
///
/// Mate in `m` becomes `sign(m) * (10000 - |m| * 10)`: shorter mates give
/// larger magnitudes, and `mate 0` (side to move is mated) gives `-10000`.
pub fn score_to_centipawns(score: Score) -> i32 {
    match score {
        Score::Cp(cp) => cp,
        Score::Mate(m) => {
            let distance = m.unsigned_abs().min(MAX_MATE_DISTANCE) as i32;
            let magnitude = MATE_SCORE - distance * MATE_STEP;
            if m > 0 {
                magnitude
            } else {
                -magnitude
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centipawns_pass_through() {
        assert_eq!(score_to_centipawns(Score::Cp(35)), 35);
        assert_eq!(score_to_centipawns(Score::Cp(-150)), -150);
        assert_eq!(score_to_centipawns(Score::Cp(0)), 0);
    }

    #[test]
    fn test_mate_encoding() {
        assert_eq!(score_to_centipawns(Score::Mate(1)), 9_990);
        assert_eq!(score_to_centipawns(Score::Mate(5)), 9_950);
        assert_eq!(score_to_centipawns(Score::Mate(-3)), -9_970);
        assert_eq!(score_to_centipawns(Score::Mate(0)), -10_000);
    }

    #[test]
    fn test_shorter_mates_are_larger() {
        let mut previous = i32::MAX;
        for m in 1..=50 {
            let value = score_to_centipawns(Score::Mate(m));
            assert!(value < previous, "mate in {} should be below mate in {}", m, m - 1);
            previous = value;
        }

        let mut previous = i32::MIN;
        for m in 1..=50 {
            let value = score_to_centipawns(Score::Mate(-m));
            assert!(value > previous);
            previous = value;
        }
    }

    #[test]
    fn test_mate_exceeds_plausible_centipawns() {
        assert!(score_to_centipawns(Score::Mate(100)) > 3_000);
        assert!(score_to_centipawns(Score::Mate(-100)) < -3_000);
        assert!(score_to_centipawns(Score::Mate(10_000)) >= MATE_SCORE / 2);
        assert!(score_to_centipawns(Score::Mate(-10_000)) <= -MATE_SCORE / 2);
    }

    #[test]
    fn test_extreme_mate_distances_are_clamped() {
        assert_eq!(score_to_centipawns(Score::Mate(i32::MIN)), -MATE_SCORE / 2);
        assert_eq!(score_to_centipawns(Score::Mate(i32::MAX)), MATE_SCORE / 2);

        let info = uci::EngineInfo::parse("info depth 1 score mate -2147483648").unwrap();
        assert_eq!(info.score.map(score_to_centipawns), Some(-MATE_SCORE / 2));
    }
}
