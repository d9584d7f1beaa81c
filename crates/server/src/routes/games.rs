use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use chess_core::notation::to_pgn;
use chess_core::rules::{self, LegalMove, MoveIntent, Position};
use chess_core::Square;

use crate::app::SessionRegistry;
use crate::difficulty::Difficulty;
use crate::error::AppError;
use crate::session::{MoveOutcome, SessionHandle, SessionSnapshot};

#[derive(Deserialize, Default)]
pub struct CreateGameRequest {
    pub difficulty: Option<String>,
}

#[derive(Serialize)]
pub struct GameResponse {
    pub id: u64,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

#[derive(Deserialize)]
pub struct DifficultyRequest {
    pub difficulty: String,
}

#[derive(Deserialize)]
pub struct LegalMovesQuery {
    pub square: Option<String>,
}

#[derive(Serialize)]
pub struct DifficultyOption {
    pub level: Difficulty,
    pub label: &'static str,
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, AppError> {
    s.parse::<Difficulty>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

pub(crate) async fn lookup(
    registry: &SessionRegistry,
    game_id: u64,
) -> Result<SessionHandle, AppError> {
    registry
        .get(game_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Game {} not found", game_id)))
}

/// GET /api/difficulties
pub async fn list_difficulties() -> Json<Vec<DifficultyOption>> {
    Json(
        Difficulty::ALL
            .into_iter()
            .map(|level| DifficultyOption {
                level,
                label: level.label(),
            })
            .collect(),
    )
}

/// POST /api/games
pub async fn create_game(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    body: Option<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameResponse>), AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let difficulty = req.difficulty.as_deref().map(parse_difficulty).transpose()?;

    let (id, handle) = registry.create(difficulty).await;
    Ok((
        StatusCode::CREATED,
        Json(GameResponse {
            id,
            snapshot: handle.snapshot(),
        }),
    ))
}

/// GET /api/games/{game_id}
pub async fn get_game(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
) -> Result<Json<GameResponse>, AppError> {
    let handle = lookup(&registry, game_id).await?;
    Ok(Json(GameResponse {
        id: game_id,
        snapshot: handle.snapshot(),
    }))
}

/// DELETE /api/games/{game_id}
pub async fn delete_game(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
) -> Result<StatusCode, AppError> {
    if registry.remove(game_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Game {} not found", game_id)))
    }
}

/// GET /api/games/{game_id}/legal-moves?square=e2
pub async fn legal_moves(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
    Query(q): Query<LegalMovesQuery>,
) -> Result<Json<Vec<LegalMove>>, AppError> {
    let handle = lookup(&registry, game_id).await?;
    let from = match q.square.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<Square>()
                .map_err(|_| AppError::BadRequest(format!("Invalid square '{}'", s)))?,
        ),
        None => None,
    };

    let snapshot = handle.snapshot();
    if snapshot.status.is_game_over {
        return Ok(Json(Vec::new()));
    }
    let position = Position::from_fen(&snapshot.fen)?;
    Ok(Json(rules::legal_moves(&position, from)))
}

/// POST /api/games/{game_id}/move
pub async fn make_move(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<MoveOutcome>, AppError> {
    let handle = lookup(&registry, game_id).await?;
    let intent = MoveIntent::parse(&req.from, &req.to, req.promotion.as_deref())?;
    Ok(Json(handle.apply_move(intent).await?))
}

/// POST /api/games/{game_id}/reset
pub async fn reset_game(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = lookup(&registry, game_id).await?;
    Ok(Json(handle.reset().await?))
}

/// POST /api/games/{game_id}/undo
pub async fn undo_move(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = lookup(&registry, game_id).await?;
    Ok(Json(handle.undo().await?))
}

/// PUT /api/games/{game_id}/difficulty
pub async fn set_difficulty(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
    Json(req): Json<DifficultyRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = lookup(&registry, game_id).await?;
    let difficulty = parse_difficulty(&req.difficulty)?;
    Ok(Json(handle.set_difficulty(difficulty).await?))
}

/// GET /api/games/{game_id}/pgn
pub async fn export_pgn(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let handle = lookup(&registry, game_id).await?;
    let snapshot = handle.snapshot();
    let date = snapshot.updated_at.format("%Y.%m.%d").to_string();
    let pgn = to_pgn(&snapshot.history, snapshot.status.result, &date);
    Ok((
        [(header::CONTENT_TYPE, "application/x-chess-pgn")],
        pgn,
    ))
}
