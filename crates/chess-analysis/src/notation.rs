//! Canonical move comparison.
//!
//! Engines report best moves in UCI coordinates (`e2e4`, `e7e8q`); game
//! records and other tools may use long algebraic forms (`e2-e4`, `Ng1-f3`,
//! `e7xd8=Q`, `O-O`). Both sides of a comparison are reduced to a
//! [`CanonicalMove`] first, so equivalent moves always match.

use std::fmt;

use crate::game::Side;

/// A move reduced to origin, destination and promotion piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalMove {
    pub from: Square,
    pub to: Square,
    /// Lowercase promotion piece (`q`, `r`, `b`, `n`).
    pub promotion: Option<char>,
}

/// Board square as file and rank characters, e.g. `('e', '4')`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub file: char,
    pub rank: char,
}

impl Square {
    fn new(file: char, rank: char) -> Option<Self> {
        let file = file.to_ascii_lowercase();
        let on_board = ('a'..='h').contains(&file) && ('1'..='8').contains(&rank);
        on_board.then_some(Self { file, rank })
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file, self.rank)
    }
}

impl CanonicalMove {
    /// Parses a coordinate or long-algebraic move.
    ///
    /// Accepts an optional piece letter, `-` or `x` between squares, `=`
    /// before a promotion piece, trailing check and annotation marks, and
    /// castling as `O-O`/`0-0`/`O-O-O` (resolved against `mover`'s back
    /// rank). A move marked as a king move onto its own rook (`Ke1h1`) is
    /// read as castling; bare `e1h1` stays a plain move, since a rook on
    /// `e1` could make it.
    ///
    /// Returns `None` for `(none)`, `0000` and anything unreadable.
    pub fn parse(notation: &str, mover: Side) -> Option<Self> {
        let text = notation.trim().trim_end_matches(['+', '#', '!', '?']);

        match text.replace('0', "O").as_str() {
            "O-O" => return Some(Self::castle(mover, 'g')),
            "O-O-O" => return Some(Self::castle(mover, 'c')),
            _ => {}
        }

        let mut chars: Vec<char> = text
            .chars()
            .filter(|c| !matches!(c, '-' | 'x' | ':' | '='))
            .collect();
        let piece = match chars.first() {
            Some(&c) if "KQRBN".contains(c) => {
                chars.remove(0);
                Some(c)
            }
            _ => None,
        };

        let (from, to, promotion) = match chars.as_slice() {
            [f1, r1, f2, r2] => (Square::new(*f1, *r1)?, Square::new(*f2, *r2)?, None),
            [f1, r1, f2, r2, p] => {
                let p = p.to_ascii_lowercase();
                if !"qrbn".contains(p) {
                    return None;
                }
                (Square::new(*f1, *r1)?, Square::new(*f2, *r2)?, Some(p))
            }
            _ => return None,
        };

        let mv = Self { from, to, promotion };
        Some(match piece {
            Some('K') => mv.king_onto_rook(),
            _ => mv,
        })
    }

    fn castle(mover: Side, file: char) -> Self {
        let rank = mover.home_rank();
        Self {
            from: Square { file: 'e', rank },
            to: Square { file, rank },
            promotion: None,
        }
    }

    fn king_onto_rook(self) -> Self {
        let on_home_rank = self.from.file == 'e'
            && self.from.rank == self.to.rank
            && matches!(self.from.rank, '1' | '8');
        match self.to.file {
            'h' if on_home_rank => Self {
                to: Square { file: 'g', ..self.to },
                ..self
            },
            'a' if on_home_rank => Self {
                to: Square { file: 'c', ..self.to },
                ..self
            },
            _ => self,
        }
    }
}

impl fmt::Display for CanonicalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p)?;
        }
        Ok(())
    }
}

/// Whether two move notations denote the same move for `mover`.
///
/// A promotion piece missing on one side matches any piece on the other;
/// unreadable notation never matches.
pub fn moves_match(a: &str, b: &str, mover: Side) -> bool {
    match (CanonicalMove::parse(a, mover), CanonicalMove::parse(b, mover)) {
        (Some(a), Some(b)) => {
            a.from == b.from
                && a.to == b.to
                && match (a.promotion, b.promotion) {
                    (Some(x), Some(y)) => x == y,
                    _ => true,
                }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        let mv = CanonicalMove::parse("e2e4", Side::White).unwrap();
        assert_eq!(mv.to_string(), "e2e4");
        assert_eq!(mv.promotion, None);

        let promo = CanonicalMove::parse("e7e8q", Side::White).unwrap();
        assert_eq!(promo.to_string(), "e7e8q");
    }

    #[test]
    fn test_parse_long_algebraic() {
        assert_eq!(CanonicalMove::parse("e2-e4", Side::White).unwrap().to_string(), "e2e4");
        assert_eq!(CanonicalMove::parse("Ng1-f3", Side::White).unwrap().to_string(), "g1f3");
        assert_eq!(CanonicalMove::parse("e7xd8=Q+", Side::White).unwrap().to_string(), "e7d8q");
        assert_eq!(CanonicalMove::parse("Qh5xf7#", Side::White).unwrap().to_string(), "h5f7");
        assert_eq!(CanonicalMove::parse("E2E4", Side::White).unwrap().to_string(), "e2e4");
    }

    #[test]
    fn test_parse_castling_by_side() {
        assert_eq!(CanonicalMove::parse("O-O", Side::White).unwrap().to_string(), "e1g1");
        assert_eq!(CanonicalMove::parse("O-O", Side::Black).unwrap().to_string(), "e8g8");
        assert_eq!(CanonicalMove::parse("0-0-0", Side::White).unwrap().to_string(), "e1c1");
        assert_eq!(CanonicalMove::parse("O-O-O+", Side::Black).unwrap().to_string(), "e8c8");
    }

    #[test]
    fn test_king_onto_rook_is_castling() {
        assert_eq!(CanonicalMove::parse("Ke1h1", Side::White).unwrap().to_string(), "e1g1");
        assert_eq!(CanonicalMove::parse("Ke8-a8", Side::Black).unwrap().to_string(), "e8c8");
        // A rook on e1 sliding to h1 is an ordinary move.
        assert_eq!(CanonicalMove::parse("Re1h1", Side::White).unwrap().to_string(), "e1h1");
    }

    #[test]
    fn test_bare_king_onto_rook_needs_piece_letter() {
        assert!(moves_match("Ke1h1", "O-O", Side::White));
        assert!(moves_match("e8c8", "Ke8a8", Side::Black));
        assert!(!moves_match("e1h1", "O-O", Side::White));
        assert!(!moves_match("e8a8", "O-O-O", Side::Black));
    }

    #[test]
    fn test_unreadable_notation() {
        for bad in ["(none)", "0000", "", "e4", "Nf3", "z9a1", "e7e8k", "e2e4e5"] {
            assert_eq!(CanonicalMove::parse(bad, Side::White), None, "{}", bad);
        }
    }

    #[test]
    fn test_equivalent_notations_match() {
        assert!(moves_match("e2e4", "e2-e4", Side::White));
        assert!(moves_match("g1f3", "Ng1-f3", Side::White));
        assert!(moves_match("e1g1", "O-O", Side::White));
        assert!(moves_match("e8c8", "0-0-0", Side::Black));
        assert!(moves_match("e7d8q", "e7xd8=Q", Side::White));
        assert!(moves_match("d7d5", "d7-d5!?", Side::Black));
    }

    #[test]
    fn test_promotion_wildcard() {
        assert!(moves_match("e7e8q", "e7e8", Side::White));
        assert!(moves_match("e7e8", "e7e8=N", Side::White));
        assert!(!moves_match("e7e8q", "e7e8n", Side::White));
    }

    #[test]
    fn test_different_moves_do_not_match() {
        assert!(!moves_match("e2e4", "e2e3", Side::White));
        assert!(!moves_match("e1g1", "O-O", Side::Black));
        assert!(!moves_match("(none)", "(none)", Side::White));
        assert!(!moves_match("e2e4", "", Side::White));
    }
}
