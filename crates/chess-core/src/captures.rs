//! Captured piece tally derived from the board.
//!
//! There is no capture history: the tally compares the pieces on the board
//! against the starting roster. A promoted pawn counts as a piece of its new
//! type, so after a promotion the pawn shows up as captured and the extra
//! queen hides a real queen capture. The error is accepted.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use shakmaty::{Color, Piece, Position as _, Role};

use crate::rules::Position;

/// Starting count per role for one side. Kings are never captured.
const INITIAL_ROSTER: [(Role, usize); 5] = [
    (Role::Pawn, 8),
    (Role::Knight, 2),
    (Role::Bishop, 2),
    (Role::Rook, 2),
    (Role::Queen, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapturedTally {
    white: [usize; 5],
    black: [usize; 5],
}

impl CapturedTally {
    pub fn from_position(pos: &Position) -> Self {
        let board = pos.chess().board();
        let mut tally = Self::default();
        for (idx, (role, initial)) in INITIAL_ROSTER.iter().enumerate() {
            for color in [Color::White, Color::Black] {
                let on_board = board.by_piece(Piece { color, role: *role }).count();
                let captured = initial.saturating_sub(on_board);
                match color {
                    Color::White => tally.white[idx] = captured,
                    Color::Black => tally.black[idx] = captured,
                }
            }
        }
        tally
    }

    /// Captured pieces of `color` and `role`.
    pub fn count(&self, color: Color, role: Role) -> usize {
        INITIAL_ROSTER
            .iter()
            .position(|(r, _)| *r == role)
            .map(|idx| self.side(color)[idx])
            .unwrap_or(0)
    }

    /// Captured pieces of one color, pawns first.
    pub fn pieces(&self, color: Color) -> Vec<Role> {
        let counts = self.side(color);
        INITIAL_ROSTER
            .iter()
            .enumerate()
            .flat_map(|(idx, (role, _))| std::iter::repeat(*role).take(counts[idx]))
            .collect()
    }

    pub fn total(&self, color: Color) -> usize {
        self.side(color).iter().sum()
    }

    fn side(&self, color: Color) -> &[usize; 5] {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Pawn => "pawn",
        Role::Knight => "knight",
        Role::Bishop => "bishop",
        Role::Rook => "rook",
        Role::Queen => "queen",
        Role::King => "king",
    }
}

impl Serialize for CapturedTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = |color| -> Vec<&'static str> {
            self.pieces(color).into_iter().map(role_name).collect()
        };
        let mut st = serializer.serialize_struct("CapturedTally", 2)?;
        st.serialize_field("white", &names(Color::White))?;
        st.serialize_field("black", &names(Color::Black))?;
        st.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{apply_san, legal_moves};

    #[test]
    fn test_initial_position_has_no_captures() {
        let tally = CapturedTally::from_position(&Position::initial());
        assert_eq!(tally.total(Color::White), 0);
        assert_eq!(tally.total(Color::Black), 0);
    }

    #[test]
    fn test_pawn_capture_counted() {
        let mut pos = Position::initial();
        for san in ["e4", "d5", "exd5"] {
            pos = apply_san(&pos, san).unwrap().position;
        }
        let tally = CapturedTally::from_position(&pos);
        assert_eq!(tally.count(Color::Black, Role::Pawn), 1);
        assert_eq!(tally.pieces(Color::Black), vec![Role::Pawn]);
        assert_eq!(tally.total(Color::White), 0);
    }

    #[test]
    fn test_bare_kings_capture_everything() {
        let pos = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        let tally = CapturedTally::from_position(&pos);
        assert_eq!(tally.total(Color::White), 15);
        assert_eq!(tally.pieces(Color::Black).len(), 15);
        assert_eq!(tally.count(Color::White, Role::King), 0);
    }

    #[test]
    fn test_extra_queen_never_goes_negative() {
        // Two white queens after a promotion: the queen count saturates at zero
        // and the missing pawn shows as captured.
        let pos =
            Position::from_fen("QQ6/8/8/7k/8/8/1PPPPPPP/RNB1KBNR w KQ - 0 1").unwrap();
        let tally = CapturedTally::from_position(&pos);
        assert_eq!(tally.count(Color::White, Role::Queen), 0);
        assert_eq!(tally.count(Color::White, Role::Pawn), 1);
    }

    #[test]
    fn test_tally_bounded_over_a_long_game() {
        // Deterministic walk: always play the first legal move.
        let mut pos = Position::initial();
        for _ in 0..120 {
            let moves = legal_moves(&pos, None);
            let Some(first) = moves.first() else { break };
            pos = apply_san(&pos, &first.san).unwrap().position;
            let tally = CapturedTally::from_position(&pos);
            for color in [Color::White, Color::Black] {
                for (role, initial) in INITIAL_ROSTER {
                    assert!(tally.count(color, role) <= initial);
                }
            }
        }
    }

    #[test]
    fn test_serializes_role_names() {
        let mut pos = Position::initial();
        for san in ["e4", "d5", "exd5"] {
            pos = apply_san(&pos, san).unwrap().position;
        }
        let json = serde_json::to_value(CapturedTally::from_position(&pos)).unwrap();
        assert_eq!(json["black"], serde_json::json!(["pawn"]));
        assert_eq!(json["white"], serde_json::json!([]));
    }
}
