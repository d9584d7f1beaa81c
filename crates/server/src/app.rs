use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::clients::gemini::GeminiOracle;
use crate::config::Config;
use crate::difficulty::Difficulty;
use crate::oracle::{OfflineOracle, Oracle};
use crate::routes;
use crate::session::{SessionHandle, SessionSettings};

/// In-memory table of running sessions. Nothing outlives the process, and
/// sessions that stop changing are dropped by `spawn_idle_sweeper`.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, SessionHandle>>,
    next_id: AtomicU64,
    oracle: Arc<dyn Oracle>,
    thinking_delay: Duration,
    default_difficulty: Difficulty,
}

impl SessionRegistry {
    pub fn new(oracle: Arc<dyn Oracle>, config: &Config) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            oracle,
            thinking_delay: config.thinking_delay,
            default_difficulty: config.default_difficulty,
        }
    }

    /// Start a new session and return its id.
    pub async fn create(&self, difficulty: Option<Difficulty>) -> (u64, SessionHandle) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle::spawn(
            Arc::clone(&self.oracle),
            SessionSettings {
                difficulty: difficulty.unwrap_or(self.default_difficulty),
                thinking_delay: self.thinking_delay,
            },
        );
        self.sessions.write().await.insert(id, handle.clone());
        tracing::info!(session_id = id, "Session created");
        (id, handle)
    }

    pub async fn get(&self, id: u64) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drop a session. Its controller stops once the last handle is gone.
    pub async fn remove(&self, id: u64) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = id, "Session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session whose last change is older than `cutoff`. Sessions
    /// waiting on the oracle are kept.
    pub async fn evict_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| {
            let snapshot = handle.snapshot();
            let keep = snapshot.oracle_pending || snapshot.updated_at >= cutoff;
            if !keep {
                tracing::info!(session_id = *id, last_change = %snapshot.updated_at, "Idle session evicted");
            }
            keep
        });
        before - sessions.len()
    }

    /// Periodically evict sessions idle for longer than `idle`.
    pub fn spawn_idle_sweeper(self: Arc<Self>, idle: Duration) -> tokio::task::JoinHandle<()> {
        let period = idle.min(IDLE_SWEEP_PERIOD).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(cutoff) = idle_cutoff(Utc::now(), idle) else {
                    continue;
                };
                let evicted = self.evict_idle(cutoff).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Idle sweep finished");
                }
            }
        })
    }
}

const IDLE_SWEEP_PERIOD: Duration = Duration::from_secs(60);

fn idle_cutoff(now: DateTime<Utc>, idle: Duration) -> Option<DateTime<Utc>> {
    let span = chrono::Duration::from_std(idle).ok()?;
    now.checked_sub_signed(span)
}

/// Gemini when an API key is configured, otherwise the offline oracle.
pub fn build_oracle(config: &Config) -> anyhow::Result<Arc<dyn Oracle>> {
    match &config.gemini_api_key {
        Some(key) => {
            let oracle = GeminiOracle::new(config, key.clone())?;
            tracing::info!(model = %config.gemini_model, "Gemini oracle configured");
            Ok(Arc::new(oracle))
        }
        None => {
            tracing::info!("Gemini not configured - computer plays random moves");
            Ok(Arc::new(OfflineOracle))
        }
    }
}

pub fn router(registry: Arc<SessionRegistry>, config: Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        .route("/api/difficulties", get(routes::games::list_difficulties))
        // Games
        .route("/api/games", post(routes::games::create_game))
        .route(
            "/api/games/{game_id}",
            get(routes::games::get_game).delete(routes::games::delete_game),
        )
        .route("/api/games/{game_id}/legal-moves", get(routes::games::legal_moves))
        .route("/api/games/{game_id}/move", post(routes::games::make_move))
        .route("/api/games/{game_id}/reset", post(routes::games::reset_game))
        .route("/api/games/{game_id}/undo", post(routes::games::undo_move))
        .route("/api/games/{game_id}/difficulty", put(routes::games::set_difficulty))
        .route("/api/games/{game_id}/pgn", get(routes::games::export_pgn))
        // Live snapshots
        .route("/api/games/{game_id}/ws", get(routes::session_ws::ws_handler))
        // Shared state
        .layer(Extension(registry))
        .layer(Extension(config))
        .layer(cors)
}
