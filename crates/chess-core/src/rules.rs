//! Rules engine adapter over shakmaty.
//!
//! Everything the session controller knows about chess goes through this
//! module: positions travel as FEN, moves as SAN or square pairs.

use std::fmt;

use serde::Serialize;
use shakmaty::{
    fen::Fen, san::San, san::SanPlus, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode,
    Move, Position as _, Role, Square,
};

/// Standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Half-moves without capture or pawn move after which the game is drawn.
const FIFTY_MOVE_HALFMOVES: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("Invalid FEN '{0}'")]
    InvalidFen(String),

    #[error("Invalid square '{0}'")]
    InvalidSquare(String),

    #[error("Invalid promotion piece '{0}'")]
    InvalidPromotion(String),

    #[error("Invalid SAN '{0}'")]
    InvalidSan(String),

    #[error("Illegal move '{0}'")]
    IllegalMove(String),
}

/// An immutable chess position. Cloning is cheap enough to keep one per ply.
#[derive(Debug, Clone)]
pub struct Position {
    inner: Chess,
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.fen() == other.fen()
    }
}

impl Eq for Position {}

impl Default for Position {
    fn default() -> Self {
        Self::initial()
    }
}

impl Position {
    pub fn initial() -> Self {
        Self {
            inner: Chess::default(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|_| RulesError::InvalidFen(fen.to_string()))?;
        let inner = parsed
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|_| RulesError::InvalidFen(fen.to_string()))?;
        Ok(Self { inner })
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.inner, EnPassantMode::Legal).to_string()
    }

    pub fn turn(&self) -> Color {
        self.inner.turn()
    }

    pub(crate) fn chess(&self) -> &Chess {
        &self.inner
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen())
    }
}

/// A request to move a piece between two squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveIntent {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl MoveIntent {
    /// Parse square names ("e2", "e4") and an optional promotion letter ("q").
    pub fn parse(from: &str, to: &str, promotion: Option<&str>) -> Result<Self, RulesError> {
        let from_sq: Square = from
            .trim()
            .parse()
            .map_err(|_| RulesError::InvalidSquare(from.to_string()))?;
        let to_sq: Square = to
            .trim()
            .parse()
            .map_err(|_| RulesError::InvalidSquare(to.to_string()))?;
        let promotion = match promotion.map(str::trim).filter(|p| !p.is_empty()) {
            None => None,
            Some(p) => Some(parse_promotion(p)?),
        };
        Ok(Self {
            from: from_sq,
            to: to_sq,
            promotion,
        })
    }
}

fn parse_promotion(p: &str) -> Result<Role, RulesError> {
    let mut chars = p.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => match Role::from_char(c.to_ascii_lowercase()) {
            Some(role @ (Role::Queen | Role::Rook | Role::Bishop | Role::Knight)) => Ok(role),
            _ => Err(RulesError::InvalidPromotion(p.to_string())),
        },
        _ => match p.to_ascii_lowercase().as_str() {
            "queen" => Ok(Role::Queen),
            "rook" => Ok(Role::Rook),
            "bishop" => Ok(Role::Bishop),
            "knight" => Ok(Role::Knight),
            _ => Err(RulesError::InvalidPromotion(p.to_string())),
        },
    }
}

/// Result of applying a move.
#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub position: Position,
    /// SAN including the check/mate suffix, e.g. "Qxf7#".
    pub san: String,
    pub uci: String,
}

/// Verbose description of a legal move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegalMove {
    pub from: String,
    pub to: String,
    pub san: String,
    pub uci: String,
    pub promotion: Option<char>,
}

/// Why a game ended in a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatus {
    pub turn: Color,
    pub in_check: bool,
    pub is_checkmate: bool,
    pub is_draw: bool,
    pub draw_reason: Option<DrawReason>,
    pub is_game_over: bool,
}

impl GameStatus {
    /// The side that delivered mate, if any.
    pub fn winner(&self) -> Option<Color> {
        self.is_checkmate.then(|| self.turn.other())
    }
}

/// Square pair in UCI form with castling as the king's destination.
fn uci_squares(m: &Move) -> Option<(Square, Square, Option<Role>)> {
    match m.to_uci(CastlingMode::Standard) {
        UciMove::Normal {
            from,
            to,
            promotion,
        } => Some((from, to, promotion)),
        _ => None,
    }
}

fn san_with_suffix(before: &Chess, m: Move, after: &Chess) -> String {
    let mut san = San::from_move(before, m).to_string();
    if after.is_checkmate() {
        san.push('#');
    } else if after.is_check() {
        san.push('+');
    }
    san
}

fn commit(pos: &Position, m: Move) -> Result<AppliedMove, RulesError> {
    let uci = m.to_uci(CastlingMode::Standard).to_string();
    let after = pos
        .inner
        .clone()
        .play(m)
        .map_err(|_| RulesError::IllegalMove(uci.clone()))?;
    let san = san_with_suffix(&pos.inner, m, &after);
    Ok(AppliedMove {
        position: Position { inner: after },
        san,
        uci,
    })
}

/// Validate and apply a square-to-square move. A promoting pawn move without
/// an explicit choice becomes a queen.
pub fn apply_intent(pos: &Position, intent: &MoveIntent) -> Result<AppliedMove, RulesError> {
    let wanted = intent.promotion;
    let candidates: Vec<(Move, Option<Role>)> = pos
        .inner
        .legal_moves()
        .into_iter()
        .filter_map(|m| {
            let (from, to, promotion) = uci_squares(&m)?;
            (from == intent.from && to == intent.to).then_some((m, promotion))
        })
        .collect();

    let chosen = candidates
        .iter()
        .find(|(_, promotion)| match promotion {
            None => true,
            Some(role) => *role == wanted.unwrap_or(Role::Queen),
        })
        .map(|(m, _)| *m);

    match chosen {
        Some(m) => commit(pos, m),
        None => Err(RulesError::IllegalMove(format!("{}{}", intent.from, intent.to))),
    }
}

/// Parse standard move notation and apply it.
pub fn apply_san(pos: &Position, notation: &str) -> Result<AppliedMove, RulesError> {
    let cleaned = clean_san(notation);
    if cleaned.is_empty() {
        return Err(RulesError::InvalidSan(notation.to_string()));
    }
    let san_plus: SanPlus = cleaned
        .parse()
        .map_err(|_| RulesError::InvalidSan(notation.to_string()))?;
    let m = san_plus
        .san
        .to_move(&pos.inner)
        .map_err(|_| RulesError::IllegalMove(notation.to_string()))?;
    commit(pos, m)
}

/// Strip annotation glyphs and normalize zero-castling.
fn clean_san(notation: &str) -> String {
    let trimmed = notation
        .trim()
        .trim_end_matches(|c: char| c == '!' || c == '?' || c == '.' || c == ',');
    match trimmed.trim_end_matches(['+', '#']) {
        "0-0" => "O-O".to_string(),
        "0-0-0" => "O-O-O".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Legal moves in the position, optionally only those starting on `from`.
pub fn legal_moves(pos: &Position, from: Option<Square>) -> Vec<LegalMove> {
    pos.inner
        .legal_moves()
        .into_iter()
        .filter_map(|m| {
            let (origin, dest, promotion) = uci_squares(&m)?;
            if from.is_some_and(|sq| sq != origin) {
                return None;
            }
            let after = pos.inner.clone().play(m).ok()?;
            Some(LegalMove {
                from: origin.to_string(),
                to: dest.to_string(),
                san: san_with_suffix(&pos.inner, m, &after),
                uci: m.to_uci(CastlingMode::Standard).to_string(),
                promotion: promotion.map(|r| r.char()),
            })
        })
        .collect()
}

/// Report check, mate and draw for `pos`. `earlier` holds the positions that
/// preceded it in the game and is only used for threefold repetition.
pub fn status(pos: &Position, earlier: &[Position]) -> GameStatus {
    let chess = &pos.inner;
    let is_checkmate = chess.is_checkmate();

    let draw_reason = if is_checkmate {
        None
    } else if chess.is_stalemate() {
        Some(DrawReason::Stalemate)
    } else if chess.is_insufficient_material() {
        Some(DrawReason::InsufficientMaterial)
    } else if chess.halfmoves() >= FIFTY_MOVE_HALFMOVES {
        Some(DrawReason::FiftyMoveRule)
    } else if repetitions(pos, earlier) >= 3 {
        Some(DrawReason::ThreefoldRepetition)
    } else {
        None
    };

    GameStatus {
        turn: chess.turn(),
        in_check: chess.is_check(),
        is_checkmate,
        is_draw: draw_reason.is_some(),
        draw_reason,
        is_game_over: is_checkmate || draw_reason.is_some(),
    }
}

fn repetitions(pos: &Position, earlier: &[Position]) -> usize {
    let key = normalize_fen(&pos.fen());
    1 + earlier
        .iter()
        .filter(|p| normalize_fen(&p.fen()) == key)
        .count()
}

/// Strips move counters from FEN, keeping only position + side + castling + ep.
pub fn normalize_fen(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_all(sans: &[&str]) -> (Position, Vec<Position>) {
        let mut pos = Position::initial();
        let mut seen = Vec::new();
        for san in sans {
            seen.push(pos.clone());
            pos = apply_san(&pos, san).unwrap().position;
        }
        (pos, seen)
    }

    #[test]
    fn test_normalize_fen() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let normalized = normalize_fen(fen);
        assert_eq!(normalized, "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3");
    }

    #[test]
    fn test_fen_round_trip() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.fen(), fen);
        assert_eq!(Position::initial().fen(), STARTING_FEN);
    }

    #[test]
    fn test_fen_after_moves() {
        let e4 = apply_san(&Position::initial(), "e4").unwrap().position;
        // No black pawn can take on e3, so no en passant square is written.
        assert_eq!(
            e4.fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );

        let mut pos = Position::initial();
        for san in ["e4", "a6", "e5", "d5"] {
            pos = apply_san(&pos, san).unwrap().position;
        }
        assert_eq!(
            pos.fen(),
            "rnbqkbnr/1pp1pppp/p7/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3"
        );
        assert_eq!(Position::from_fen(&pos.fen()).unwrap(), pos);
    }

    #[test]
    fn test_invalid_fen_rejected() {
        assert!(matches!(
            Position::from_fen("not a fen"),
            Err(RulesError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_apply_intent_e2e4() {
        let pos = Position::initial();
        let applied = apply_intent(&pos, &MoveIntent::parse("e2", "e4", None).unwrap()).unwrap();
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.uci, "e2e4");
        assert_eq!(applied.position.turn(), Color::Black);
    }

    #[test]
    fn test_illegal_intent_rejected() {
        let pos = Position::initial();
        let err = apply_intent(&pos, &MoveIntent::parse("e2", "e5", None).unwrap()).unwrap_err();
        assert_eq!(err, RulesError::IllegalMove("e2e5".into()));
    }

    #[test]
    fn test_castling_by_king_destination() {
        let (pos, _) = play_all(&["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"]);
        let applied = apply_intent(&pos, &MoveIntent::parse("e1", "g1", None).unwrap()).unwrap();
        assert_eq!(applied.san, "O-O");
        assert_eq!(applied.uci, "e1g1");
    }

    #[test]
    fn test_promotion_defaults_to_queen() {
        let pos = Position::from_fen("8/P7/8/8/8/8/8/k6K w - - 0 1").unwrap();
        let queen = apply_intent(&pos, &MoveIntent::parse("a7", "a8", None).unwrap()).unwrap();
        assert!(queen.san.starts_with("a8=Q"));

        let knight = apply_intent(&pos, &MoveIntent::parse("a7", "a8", Some("n")).unwrap()).unwrap();
        assert!(knight.san.starts_with("a8=N"));
    }

    #[test]
    fn test_promotion_letter_ignored_on_normal_move() {
        let pos = Position::initial();
        let applied =
            apply_intent(&pos, &MoveIntent::parse("g1", "f3", Some("q")).unwrap()).unwrap();
        assert_eq!(applied.san, "Nf3");
    }

    #[test]
    fn test_apply_san_tolerates_annotations() {
        let pos = Position::initial();
        assert_eq!(apply_san(&pos, "e4!").unwrap().san, "e4");
        assert_eq!(apply_san(&pos, " Nf3 ").unwrap().san, "Nf3");
        assert!(matches!(apply_san(&pos, "banana"), Err(RulesError::InvalidSan(_))));
        assert!(matches!(apply_san(&pos, "e5"), Err(RulesError::IllegalMove(_))));
        assert!(matches!(apply_san(&pos, ""), Err(RulesError::InvalidSan(_))));
    }

    #[test]
    fn test_zero_castling_accepted() {
        let (pos, _) = play_all(&["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"]);
        assert_eq!(apply_san(&pos, "0-0").unwrap().san, "O-O");
    }

    #[test]
    fn test_check_suffix() {
        let (pos, _) = play_all(&["e4", "f5"]);
        let applied = apply_san(&pos, "Qh5").unwrap();
        assert_eq!(applied.san, "Qh5+");
    }

    #[test]
    fn test_legal_moves_from_square() {
        let pos = Position::initial();
        assert_eq!(legal_moves(&pos, None).len(), 20);

        let knight = legal_moves(&pos, Some(Square::G1));
        let mut targets: Vec<&str> = knight.iter().map(|m| m.to.as_str()).collect();
        targets.sort();
        assert_eq!(targets, vec!["f3", "h3"]);
        assert!(legal_moves(&pos, Some(Square::E4)).is_empty());
    }

    #[test]
    fn test_fools_mate_status() {
        let (pos, earlier) = play_all(&["f3", "e5", "g4", "Qh4#"]);
        let st = status(&pos, &earlier);
        assert!(st.is_checkmate);
        assert!(st.in_check);
        assert!(st.is_game_over);
        assert!(!st.is_draw);
        assert_eq!(st.winner(), Some(Color::Black));
        assert!(legal_moves(&pos, None).is_empty());
    }

    #[test]
    fn test_stalemate_status() {
        let pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let st = status(&pos, &[]);
        assert_eq!(st.draw_reason, Some(DrawReason::Stalemate));
        assert!(st.is_game_over);
        assert_eq!(st.winner(), None);
    }

    #[test]
    fn test_insufficient_material() {
        let pos = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(status(&pos, &[]).draw_reason, Some(DrawReason::InsufficientMaterial));
    }

    #[test]
    fn test_fifty_move_rule() {
        let pos = Position::from_fen("8/8/8/4k3/8/8/R7/4K3 w - - 100 80").unwrap();
        assert_eq!(status(&pos, &[]).draw_reason, Some(DrawReason::FiftyMoveRule));
    }

    #[test]
    fn test_threefold_repetition() {
        let shuffle = ["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"];
        let (pos, earlier) = play_all(&shuffle);
        assert_eq!(
            status(&pos, &earlier).draw_reason,
            Some(DrawReason::ThreefoldRepetition)
        );

        let (pos, earlier) = play_all(&shuffle[..4]);
        assert!(!status(&pos, &earlier).is_draw);
    }
}
