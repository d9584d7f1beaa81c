//! Game session state and the controller task that owns it.

pub mod controller;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shakmaty::Color;

use chess_core::captures::CapturedTally;
use chess_core::notation::{move_pairs, MovePair};
use chess_core::rules::{self, color_name, AppliedMove, DrawReason, GameStatus, Position};

use crate::difficulty::Difficulty;

pub use controller::{MoveOutcome, MoveRejection, SessionError, SessionHandle, SessionSettings};

/// The child always plays White.
pub const HUMAN_COLOR: Color = Color::White;

pub const WELCOME_MESSAGE: &str = "Welcome! Let's play some chess!";
pub const RESET_MESSAGE: &str = "New game started! Good luck!";
pub const UNDO_MESSAGE: &str = "Took a step back. What's your new plan?";
/// Commentary used whenever the oracle has nothing to say.
pub const DEFAULT_ADVICE: &str = "Nice move! What's your next plan?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveSource {
    Human,
    Oracle,
    /// Random legal move played because the oracle gave nothing usable.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ply {
    pub san: String,
    pub uci: String,
    pub source: MoveSource,
}

/// One game. Values are never mutated in place: every transition returns a
/// new `Session`.
#[derive(Debug, Clone)]
pub struct Session {
    /// Starting position followed by the position after each ply.
    positions: Vec<Position>,
    plies: Vec<Ply>,
    status: GameStatus,
    commentary: String,
    oracle_pending: bool,
    difficulty: Difficulty,
    generation: u64,
}

impl Session {
    pub fn new(difficulty: Difficulty, commentary: &str, generation: u64) -> Self {
        let start = Position::initial();
        let status = rules::status(&start, &[]);
        Self {
            positions: vec![start],
            plies: Vec::new(),
            status,
            commentary: commentary.to_string(),
            oracle_pending: false,
            difficulty,
            generation,
        }
    }

    pub fn position(&self) -> &Position {
        // `positions` always holds at least the starting position.
        &self.positions[self.positions.len() - 1]
    }

    pub fn history(&self) -> Vec<String> {
        self.plies.iter().map(|p| p.san.clone()).collect()
    }

    pub fn plies(&self) -> &[Ply] {
        &self.plies
    }

    pub fn status(&self) -> &GameStatus {
        &self.status
    }

    pub fn commentary(&self) -> &str {
        &self.commentary
    }

    pub fn oracle_pending(&self) -> bool {
        self.oracle_pending
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn human_to_move(&self) -> bool {
        self.position().turn() == HUMAN_COLOR
    }

    /// Side to move once only the first `plies` half-moves are kept.
    pub fn turn_after(&self, plies: usize) -> Color {
        let index = plies.min(self.positions.len() - 1);
        self.positions[index].turn()
    }

    /// Session after `applied`; clears the pending flag and bumps the generation.
    pub fn with_move(&self, applied: AppliedMove, source: MoveSource) -> Self {
        let status = rules::status(&applied.position, &self.positions);
        let mut positions = self.positions.clone();
        positions.push(applied.position);
        let mut plies = self.plies.clone();
        plies.push(Ply {
            san: applied.san,
            uci: applied.uci,
            source,
        });
        Self {
            positions,
            plies,
            status,
            commentary: self.commentary.clone(),
            oracle_pending: false,
            difficulty: self.difficulty,
            generation: self.generation + 1,
        }
    }

    /// Session cut back to its first `plies` half-moves.
    pub fn truncated(&self, plies: usize, commentary: &str) -> Self {
        let keep = plies.min(self.plies.len());
        let positions = self.positions[..=keep].to_vec();
        let status = rules::status(&positions[keep], &positions[..keep]);
        Self {
            positions,
            plies: self.plies[..keep].to_vec(),
            status,
            commentary: commentary.to_string(),
            oracle_pending: false,
            difficulty: self.difficulty,
            generation: self.generation + 1,
        }
    }

    pub fn with_pending(&self, pending: bool) -> Self {
        Self {
            oracle_pending: pending,
            ..self.clone()
        }
    }

    pub fn with_commentary(&self, commentary: &str) -> Self {
        Self {
            commentary: commentary.to_string(),
            ..self.clone()
        }
    }

    pub fn with_difficulty(&self, difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..self.clone()
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let history = self.history();
        SessionSnapshot {
            generation: self.generation,
            fen: self.position().fen(),
            turn: color_name(self.status.turn),
            human_color: color_name(HUMAN_COLOR),
            move_pairs: move_pairs(&history),
            history,
            last_move: self.plies.last().cloned(),
            status: StatusView::from(&self.status),
            commentary: self.commentary.clone(),
            oracle_pending: self.oracle_pending,
            difficulty: self.difficulty,
            captured: CapturedTally::from_position(self.position()),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub in_check: bool,
    pub is_checkmate: bool,
    pub is_draw: bool,
    pub draw_reason: Option<DrawReason>,
    pub is_game_over: bool,
    pub winner: Option<&'static str>,
    /// PGN result token.
    pub result: &'static str,
}

impl From<&GameStatus> for StatusView {
    fn from(status: &GameStatus) -> Self {
        let winner = status.winner();
        let result = match winner {
            Some(Color::White) => "1-0",
            Some(Color::Black) => "0-1",
            None if status.is_draw => "1/2-1/2",
            None => "*",
        };
        Self {
            in_check: status.in_check,
            is_checkmate: status.is_checkmate,
            is_draw: status.is_draw,
            draw_reason: status.draw_reason,
            is_game_over: status.is_game_over,
            winner: winner.map(color_name),
            result,
        }
    }
}

/// Read-only view of a session handed to renderers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub fen: String,
    pub turn: &'static str,
    pub human_color: &'static str,
    pub history: Vec<String>,
    pub move_pairs: Vec<MovePair>,
    pub last_move: Option<Ply>,
    pub status: StatusView,
    pub commentary: String,
    pub oracle_pending: bool,
    pub difficulty: Difficulty,
    pub captured: CapturedTally,
    pub updated_at: DateTime<Utc>,
}
