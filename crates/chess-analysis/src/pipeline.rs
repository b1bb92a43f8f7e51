//! Move-by-move evaluation.
//!
//! For every move the position before and after it is evaluated. Engine
//! scores are relative to the side to move, so the post-move score belongs
//! to the opponent and is negated to put both values in the mover's
//! perspective before the loss is taken.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::engine::PositionEvaluator;
use crate::error::AnalysisError;
use crate::evaluation::PositionEvaluation;
use crate::game::{apply_move, GameMove, Side};
use crate::notation::moves_match;

/// Loss above which a move is a blunder.
pub const BLUNDER_LOSS: u32 = 100;

/// Loss above which a move is a mistake (up to [`BLUNDER_LOSS`]).
pub const MISTAKE_LOSS: u32 = 50;

/// One move with its engine assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluatedMove {
    /// Full-move number, shared by White's move and Black's reply
    pub index: u32,
    /// Half-move counter, starting at 1
    pub ply: usize,
    pub mover: Side,
    /// Move as written in the game record
    pub notation: String,
    /// Move in UCI coordinates
    pub uci: String,
    /// FEN before the move
    pub position_before: String,
    /// Best achievable evaluation, mover's perspective
    pub eval_before: i32,
    /// Evaluation after the played move, mover's perspective
    pub eval_after: i32,
    /// Engine's preferred move in the position before
    pub engine_best_move: Option<String>,
    /// `max(0, eval_before - eval_after)`
    pub centipawn_loss: u32,
    /// The played move is the engine's best move
    pub matched_best: bool,
    pub is_blunder: bool,
    pub is_mistake: bool,
}

/// Builds the record for one move from its two evaluations.
///
/// `before` is the evaluation of the position the move was played from and
/// `after` the evaluation of the position it produced, each relative to its
/// own side to move.
pub fn evaluate_move(
    mv: &GameMove,
    before: &PositionEvaluation,
    after: &PositionEvaluation,
) -> EvaluatedMove {
    let eval_before = before.score_cp;
    let eval_after = after.score_cp.saturating_neg();
    let centipawn_loss = eval_before.saturating_sub(eval_after).max(0).unsigned_abs();

    let matched_best = before
        .best_move
        .as_deref()
        .is_some_and(|best| moves_match(best, &mv.uci, mv.mover));

    EvaluatedMove {
        index: mv.move_number,
        ply: mv.ply,
        mover: mv.mover,
        notation: mv.san.clone(),
        uci: mv.uci.clone(),
        position_before: mv.fen_before.clone(),
        eval_before,
        eval_after,
        engine_best_move: before.best_move.clone(),
        centipawn_loss,
        matched_best,
        is_blunder: centipawn_loss > BLUNDER_LOSS,
        is_mistake: centipawn_loss > MISTAKE_LOSS && centipawn_loss <= BLUNDER_LOSS,
    }
}

/// Walks a move list through an evaluator, strictly in order.
pub struct EvaluationPipeline {
    cancel: CancellationToken,
}

impl EvaluationPipeline {
    /// `cancel` aborts the run at the next engine request.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Evaluates every move of a game.
    ///
    /// Each move costs two engine requests; nothing is cached between moves.
    ///
    /// # Errors
    ///
    /// The first failure aborts the run and no partial result is returned:
    /// engine errors map through [`AnalysisError::from`], a move that cannot
    /// be played on its position is [`AnalysisError::InternalInconsistency`],
    /// and cancellation is [`AnalysisError::Cancelled`].
    #[instrument(skip_all, fields(moves = moves.len()))]
    pub async fn run<E: PositionEvaluator>(
        &self,
        engine: &mut E,
        moves: &[GameMove],
    ) -> Result<Vec<EvaluatedMove>, AnalysisError> {
        let mut evaluated = Vec::with_capacity(moves.len());

        for mv in moves {
            let before = self.evaluate(engine, &mv.fen_before).await?;
            let fen_after = apply_move(&mv.fen_before, &mv.uci)?;
            let after = self.evaluate(engine, &fen_after).await?;

            let record = evaluate_move(mv, &before, &after);
            debug!(
                ply = record.ply,
                mv = %record.notation,
                loss = record.centipawn_loss,
                best = record.matched_best,
                "evaluated move"
            );
            evaluated.push(record);
        }

        Ok(evaluated)
    }

    async fn evaluate<E: PositionEvaluator>(
        &self,
        engine: &mut E,
        fen: &str,
    ) -> Result<PositionEvaluation, AnalysisError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AnalysisError::Cancelled),
            result = engine.evaluate(fen) => result.map_err(AnalysisError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::game::parse_pgn;
    use crate::metrics::MetricsEngine;
    use crate::test_support::ScriptedEvaluator;
    use std::time::Duration;

    fn eval(score_cp: i32, best: Option<&str>) -> PositionEvaluation {
        PositionEvaluation {
            score_cp,
            best_move: best.map(str::to_string),
        }
    }

    fn opening_moves() -> Vec<GameMove> {
        parse_pgn("1. e4 e5").unwrap().moves
    }

    #[test]
    fn test_loss_uses_negated_after_score() {
        let mv = &opening_moves()[0];
        let record = evaluate_move(mv, &eval(30, Some("d2d4")), &eval(70, Some("e7e5")));
        assert_eq!(record.eval_before, 30);
        assert_eq!(record.eval_after, -70);
        assert_eq!(record.centipawn_loss, 100);
        assert!(record.is_mistake);
        assert!(!record.is_blunder);
        assert!(!record.matched_best);
    }

    #[test]
    fn test_improvement_is_zero_loss() {
        let mv = &opening_moves()[0];
        let record = evaluate_move(mv, &eval(10, Some("e2e4")), &eval(-50, None));
        assert_eq!(record.eval_after, 50);
        assert_eq!(record.centipawn_loss, 0);
        assert!(record.matched_best);
    }

    #[test]
    fn test_blunder_threshold() {
        let mv = &opening_moves()[0];
        let record = evaluate_move(mv, &eval(0, None), &eval(101, None));
        assert!(record.is_blunder);
        assert!(!record.is_mistake);

        let record = evaluate_move(mv, &eval(0, None), &eval(50, None));
        assert!(!record.is_blunder);
        assert!(!record.is_mistake);
    }

    #[test]
    fn test_best_move_in_long_algebraic_still_matches() {
        let mv = &opening_moves()[0];
        let record = evaluate_move(mv, &eval(20, Some("e2-e4")), &eval(-20, None));
        assert!(record.matched_best);
    }

    #[test]
    fn test_mate_scores_flow_through() {
        let mv = &opening_moves()[0];
        // Mate in 1 was available; the move played allows a plain +300.
        let record = evaluate_move(mv, &eval(9_990, Some("d1h5")), &eval(-300, None));
        assert_eq!(record.centipawn_loss, 9_690);
        assert!(record.is_blunder);
    }

    #[tokio::test]
    async fn test_run_requests_each_position_in_order() {
        let moves = opening_moves();
        let mut engine = ScriptedEvaluator::new(&[
            (20, Some("e2e4")),
            (-20, Some("e7e5")),
            (30, Some("d7d5")),
            (70, Some("g1f3")),
        ]);

        let pipeline = EvaluationPipeline::new(CancellationToken::new());
        let evaluated = pipeline.run(&mut engine, &moves).await.unwrap();

        assert_eq!(
            engine.seen,
            vec![
                moves[0].fen_before.clone(),
                moves[1].fen_before.clone(),
                moves[1].fen_before.clone(),
                "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2".to_string(),
            ]
        );

        assert_eq!(evaluated.len(), 2);
        assert_eq!(evaluated[0].centipawn_loss, 0);
        assert!(evaluated[0].matched_best);
        assert_eq!(evaluated[1].mover, Side::Black);
        assert_eq!(evaluated[1].centipawn_loss, 100);
        assert!(evaluated[1].is_mistake);
        assert!(!evaluated[1].is_blunder);

        let result = MetricsEngine.compute(evaluated);
        assert_eq!(result.average_loss, 50.0);
    }

    #[tokio::test]
    async fn test_engine_error_aborts_run() {
        let moves = opening_moves();
        let mut engine = ScriptedEvaluator::new(&[(20, Some("e2e4")), (-20, None)])
            .then_fail(EngineError::Timeout(Duration::from_millis(300)));

        let pipeline = EvaluationPipeline::new(CancellationToken::new());
        let err = pipeline.run(&mut engine, &moves).await.unwrap_err();
        assert!(matches!(err, AnalysisError::EngineTimeout(d) if d == Duration::from_millis(300)));
        assert_eq!(engine.seen.len(), 3);
    }

    #[tokio::test]
    async fn test_unplayable_move_is_inconsistency() {
        let mut moves = opening_moves();
        moves[0].uci = "e2e5".to_string();
        let mut engine = ScriptedEvaluator::new(&[(20, None), (0, None)]);

        let pipeline = EvaluationPipeline::new(CancellationToken::new());
        let err = pipeline.run(&mut engine, &moves).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InternalInconsistency(_)));
        assert_eq!(engine.seen.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut engine = ScriptedEvaluator::new(&[(0, None); 4]);

        let pipeline = EvaluationPipeline::new(cancel);
        let err = pipeline.run(&mut engine, &opening_moves()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
        assert!(engine.seen.is_empty());
    }

    #[tokio::test]
    async fn test_empty_game() {
        let mut engine = ScriptedEvaluator::new(&[]);
        let pipeline = EvaluationPipeline::new(CancellationToken::new());
        assert!(pipeline.run(&mut engine, &[]).await.unwrap().is_empty());
    }
}
