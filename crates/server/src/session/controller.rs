//! Session controller task.
//!
//! One tokio task owns the `Session`. Commands from handlers and results
//! from oracle calls are handled strictly one at a time, and every change is
//! published as a fresh snapshot on a watch channel. Oracle results carry
//! the session generation they were requested for; anything older than the
//! current generation is dropped.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use chess_core::notation::extract_san;
use chess_core::rules::{self, AppliedMove, MoveIntent, Position};

use super::{
    MoveSource, Session, SessionSnapshot, DEFAULT_ADVICE, HUMAN_COLOR, RESET_MESSAGE,
    UNDO_MESSAGE, WELCOME_MESSAGE,
};
use crate::difficulty::Difficulty;
use crate::oracle::{Oracle, OracleError};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session controller stopped")]
    ControllerStopped,

    #[error("The computer is still thinking")]
    OraclePending,

    /// Fallback reached in a position with no legal moves that was not
    /// flagged as game over.
    #[error("Controller and rules engine disagree about position {0}")]
    Desynchronized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveRejection {
    NotYourTurn,
    GameOver,
    OraclePending,
    IllegalMove,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub applied: bool,
    pub reason: Option<MoveRejection>,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub difficulty: Difficulty,
    pub thinking_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Easy,
            thinking_delay: Duration::from_millis(1000),
        }
    }
}

enum Command {
    ApplyMove {
        intent: MoveIntent,
        reply: oneshot::Sender<MoveOutcome>,
    },
    Reset {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Undo {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    SetDifficulty {
        difficulty: Difficulty,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
}

enum Event {
    OracleMove {
        generation: u64,
        result: Result<String, OracleError>,
    },
    Advice {
        generation: u64,
        result: Result<String, OracleError>,
    },
}

/// Cheap handle to a running controller.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Start a controller task for a fresh game. Must be called inside a
    /// tokio runtime. The task stops once every handle is dropped.
    pub fn spawn(oracle: Arc<dyn Oracle>, settings: SessionSettings) -> Self {
        let session = Session::new(settings.difficulty, WELCOME_MESSAGE, 0);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let controller = Controller {
            session,
            oracle,
            thinking_delay: settings.thinking_delay,
            events: event_tx,
            snapshots: snapshot_tx,
            move_task: None,
        };

        tokio::spawn(async move {
            match controller.run(command_rx, event_rx).await {
                Ok(()) => debug!("Session controller finished"),
                Err(e) => error!(error = %e, "Session controller failed"),
            }
        });

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
        }
    }

    pub async fn apply_move(&self, intent: MoveIntent) -> Result<MoveOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ApplyMove { intent, reply }).await?;
        rx.await.map_err(|_| SessionError::ControllerStopped)
    }

    pub async fn reset(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply }).await?;
        rx.await.map_err(|_| SessionError::ControllerStopped)
    }

    pub async fn undo(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Undo { reply }).await?;
        rx.await.map_err(|_| SessionError::ControllerStopped)
    }

    pub async fn set_difficulty(
        &self,
        difficulty: Difficulty,
    ) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetDifficulty { difficulty, reply }).await?;
        rx.await.map_err(|_| SessionError::ControllerStopped)?
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<SessionSnapshot, SessionError>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::ControllerStopped)?;
        Ok(snapshot.clone())
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ControllerStopped)
    }
}

struct Controller {
    session: Session,
    oracle: Arc<dyn Oracle>,
    thinking_delay: Duration,
    events: mpsc::UnboundedSender<Event>,
    snapshots: watch::Sender<SessionSnapshot>,
    /// The outstanding oracle move request, if any.
    move_task: Option<JoinHandle<()>>,
}

impl Controller {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) -> Result<(), SessionError> {
        let result = loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break Ok(()),
                },
                Some(event) = events.recv() => {
                    if let Err(e) = self.handle_event(event) {
                        break Err(e);
                    }
                }
            }
        };
        self.abort_move_task();
        result
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ApplyMove { intent, reply } => {
                let _ = reply.send(self.apply_move(intent));
            }
            Command::Reset { reply } => {
                let _ = reply.send(self.reset());
            }
            Command::Undo { reply } => {
                let _ = reply.send(self.undo());
            }
            Command::SetDifficulty { difficulty, reply } => {
                let _ = reply.send(self.set_difficulty(difficulty));
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<(), SessionError> {
        match event {
            Event::OracleMove { generation, result } => self.finish_automated_move(generation, result),
            Event::Advice { generation, result } => {
                self.finish_advice(generation, result);
                Ok(())
            }
        }
    }

    fn replace(&mut self, next: Session) {
        self.session = next;
        self.snapshots.send_replace(self.session.snapshot());
    }

    fn move_guard(&self) -> Option<MoveRejection> {
        if self.session.status().is_game_over {
            Some(MoveRejection::GameOver)
        } else if self.session.oracle_pending() {
            Some(MoveRejection::OraclePending)
        } else if !self.session.human_to_move() {
            Some(MoveRejection::NotYourTurn)
        } else {
            None
        }
    }

    fn apply_move(&mut self, intent: MoveIntent) -> MoveOutcome {
        if let Some(reason) = self.move_guard() {
            debug!(?reason, from = %intent.from, to = %intent.to, "Move rejected");
            return self.rejected(reason);
        }

        match rules::apply_intent(self.session.position(), &intent) {
            Ok(applied) => {
                self.commit(applied, MoveSource::Human);
                MoveOutcome {
                    applied: true,
                    reason: None,
                    snapshot: self.session.snapshot(),
                }
            }
            Err(e) => {
                debug!(error = %e, "Illegal move dropped");
                self.rejected(MoveRejection::IllegalMove)
            }
        }
    }

    fn rejected(&self, reason: MoveRejection) -> MoveOutcome {
        MoveOutcome {
            applied: false,
            reason: Some(reason),
            snapshot: self.session.snapshot(),
        }
    }

    /// Install a move, ask for commentary on it, and hand the turn to the
    /// computer when it is Black's move.
    fn commit(&mut self, applied: AppliedMove, source: MoveSource) {
        let next = self.session.with_move(applied, source);
        if let Some(ply) = next.plies().last() {
            info!(
                san = %ply.san,
                source = ?source,
                generation = next.generation(),
                game_over = next.status().is_game_over,
                "Move applied"
            );
        }
        self.replace(next);
        self.request_advice();
        self.trigger_automated_move();
    }

    fn trigger_automated_move(&mut self) {
        if self.session.status().is_game_over
            || self.session.human_to_move()
            || self.session.oracle_pending()
        {
            return;
        }

        let generation = self.session.generation();
        let fen = self.session.position().fen();
        let profile = self.session.difficulty().profile();
        let oracle = Arc::clone(&self.oracle);
        let events = self.events.clone();
        let delay = self.thinking_delay;

        self.replace(self.session.with_pending(true));
        debug!(generation, difficulty = %profile.level, "Requesting oracle move");

        self.move_task = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = oracle.request_move(&fen, profile).await;
            let _ = events.send(Event::OracleMove { generation, result });
        }));
    }

    fn finish_automated_move(
        &mut self,
        generation: u64,
        result: Result<String, OracleError>,
    ) -> Result<(), SessionError> {
        if generation != self.session.generation() || !self.session.oracle_pending() {
            debug!(generation, current = self.session.generation(), "Discarding stale oracle move");
            return Ok(());
        }
        self.move_task = None;

        let position = self.session.position().clone();
        let suggested = match result {
            Ok(reply) => match extract_san(&reply) {
                Some(san) => match rules::apply_san(&position, &san) {
                    Ok(applied) => Some(applied),
                    Err(e) => {
                        warn!(error = %e, reply = %reply, "Oracle suggested an unusable move");
                        None
                    }
                },
                None => {
                    warn!(reply = %reply, "Oracle reply holds no move");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Oracle move request failed");
                None
            }
        };

        let (applied, source) = match suggested {
            Some(applied) => (applied, MoveSource::Oracle),
            None => match random_legal_move(&position) {
                Some(applied) => (applied, MoveSource::Fallback),
                None => {
                    self.replace(self.session.with_pending(false));
                    return Err(SessionError::Desynchronized(position.fen()));
                }
            },
        };

        self.commit(applied, source);
        Ok(())
    }

    fn request_advice(&self) {
        let Some(last) = self.session.plies().last() else {
            return;
        };
        let generation = self.session.generation();
        let fen = self.session.position().fen();
        let last_move = last.san.clone();
        let oracle = Arc::clone(&self.oracle);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = oracle.request_advice(&fen, &last_move).await;
            let _ = events.send(Event::Advice { generation, result });
        });
    }

    fn finish_advice(&mut self, generation: u64, result: Result<String, OracleError>) {
        if generation != self.session.generation() {
            debug!(generation, current = self.session.generation(), "Discarding stale advice");
            return;
        }
        let commentary = match result {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => DEFAULT_ADVICE.to_string(),
            Err(e) => {
                warn!(error = %e, "Advice request failed");
                DEFAULT_ADVICE.to_string()
            }
        };
        self.replace(self.session.with_commentary(&commentary));
    }

    fn reset(&mut self) -> SessionSnapshot {
        self.abort_move_task();
        let next = Session::new(
            self.session.difficulty(),
            RESET_MESSAGE,
            self.session.generation() + 1,
        );
        info!(generation = next.generation(), "Game reset");
        self.replace(next);
        self.session.snapshot()
    }

    /// Take back the last half-move, and the one before it if needed, so the
    /// human is to move afterwards. An empty history is left alone.
    fn undo(&mut self) -> SessionSnapshot {
        self.abort_move_task();
        let played = self.session.plies().len();
        let keep = plies_kept_after_undo(&self.session);

        if keep == played {
            self.replace(self.session.with_pending(false));
        } else {
            let next = self.session.truncated(keep, UNDO_MESSAGE);
            info!(undone = played - keep, generation = next.generation(), "Moves taken back");
            self.replace(next);
        }
        self.session.snapshot()
    }

    fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<SessionSnapshot, SessionError> {
        if self.session.oracle_pending() {
            return Err(SessionError::OraclePending);
        }
        info!(%difficulty, "Difficulty changed");
        self.replace(self.session.with_difficulty(difficulty));
        Ok(self.session.snapshot())
    }

    fn abort_move_task(&mut self) {
        if let Some(task) = self.move_task.take() {
            task.abort();
        }
    }
}

fn plies_kept_after_undo(session: &Session) -> usize {
    let played = session.plies().len();
    if played == 0 {
        return 0;
    }
    let mut keep = played - 1;
    if keep > 0 && session.turn_after(keep) != HUMAN_COLOR {
        keep -= 1;
    }
    keep
}

/// Uniformly random legal move, `None` only when there are no legal moves.
fn random_legal_move(position: &Position) -> Option<AppliedMove> {
    let moves = rules::legal_moves(position, None);
    let choice = moves.choose(&mut rand::thread_rng())?;
    rules::apply_san(position, &choice.san).ok()
}
