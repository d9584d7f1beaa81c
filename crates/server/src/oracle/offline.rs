use async_trait::async_trait;
use tracing::debug;

use super::{Oracle, OracleError};
use crate::difficulty::DifficultyProfile;

/// Oracle used when no API key is configured. It never answers, so the
/// opponent plays random legal moves and the coach uses its default line.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

#[async_trait]
impl Oracle for OfflineOracle {
    async fn request_move(
        &self,
        _fen: &str,
        profile: &DifficultyProfile,
    ) -> Result<String, OracleError> {
        debug!(difficulty = %profile.level, "Offline oracle: no move");
        Err(OracleError::Unavailable)
    }

    async fn request_advice(&self, _fen: &str, _last_move: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable)
    }
}
