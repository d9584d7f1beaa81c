//! Move and advice oracle.
//!
//! The oracle is untrusted and best-effort: callers treat an error, an empty
//! string or text that is not a legal move the same way.

pub mod offline;
pub mod scripted;

use async_trait::async_trait;

use crate::difficulty::DifficultyProfile;

pub use offline::OfflineOracle;
pub use scripted::ScriptedOracle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Request error: {0}")]
    Http(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Oracle unavailable")]
    Unavailable,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Suggest a move for the side to move in `fen`, as free text that
    /// should contain standard algebraic notation.
    async fn request_move(
        &self,
        fen: &str,
        profile: &DifficultyProfile,
    ) -> Result<String, OracleError>;

    /// A short comment on `last_move`, which led to `fen`.
    async fn request_advice(&self, fen: &str, last_move: &str) -> Result<String, OracleError>;
}

/// Prompt for a move request, the FEN followed by the level's hint.
pub fn move_prompt(fen: &str, profile: &DifficultyProfile) -> String {
    format!("Current FEN: {}. {}", fen, profile.prompt)
}

pub fn advice_prompt(fen: &str, last_move: &str) -> String {
    format!(
        "The current chess board position is {}. The last move was {}. \
         In 2 short, encouraging sentences, give a kid-friendly piece of advice \
         or explain why that move was interesting.",
        fen, last_move
    )
}
