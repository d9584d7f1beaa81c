use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{Oracle, OracleError};
use crate::difficulty::{Difficulty, DifficultyProfile};

enum Reply {
    Ready(Result<String, OracleError>),
    /// Answered later through the paired sender; a dropped sender is a
    /// network failure.
    Gated(oneshot::Receiver<Result<String, OracleError>>),
}

impl Reply {
    async fn resolve(self) -> Result<String, OracleError> {
        match self {
            Reply::Ready(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(OracleError::Http("connection closed".into()))),
        }
    }
}

/// Deterministic oracle fed from queues. An empty queue answers with an
/// empty string.
#[derive(Default)]
pub struct ScriptedOracle {
    moves: Mutex<VecDeque<Reply>>,
    advice: Mutex<VecDeque<Reply>>,
    move_requests: Mutex<Vec<(String, Difficulty)>>,
    advice_requests: Mutex<Vec<(String, String)>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_move(&self, reply: Result<String, OracleError>) -> &Self {
        lock(&self.moves).push_back(Reply::Ready(reply));
        self
    }

    pub fn push_advice(&self, reply: Result<String, OracleError>) -> &Self {
        lock(&self.advice).push_back(Reply::Ready(reply));
        self
    }

    /// Queue a move reply that is held until the returned sender fires.
    pub fn push_move_gated(&self) -> oneshot::Sender<Result<String, OracleError>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.moves).push_back(Reply::Gated(rx));
        tx
    }

    /// Queue an advice reply that is held until the returned sender fires.
    pub fn push_advice_gated(&self) -> oneshot::Sender<Result<String, OracleError>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.advice).push_back(Reply::Gated(rx));
        tx
    }

    /// FEN and difficulty of every move request so far.
    pub fn move_requests(&self) -> Vec<(String, Difficulty)> {
        lock(&self.move_requests).clone()
    }

    /// FEN and last move of every advice request so far.
    pub fn advice_requests(&self) -> Vec<(String, String)> {
        lock(&self.advice_requests).clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn request_move(
        &self,
        fen: &str,
        profile: &DifficultyProfile,
    ) -> Result<String, OracleError> {
        lock(&self.move_requests).push((fen.to_string(), profile.level));
        let reply = lock(&self.moves).pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(String::new()),
        }
    }

    async fn request_advice(&self, fen: &str, last_move: &str) -> Result<String, OracleError> {
        lock(&self.advice_requests).push((fen.to_string(), last_move.to_string()));
        let reply = lock(&self.advice).pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(String::new()),
        }
    }
}
