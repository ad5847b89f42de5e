//! Runs a [`QuizSession`] in real time on the tokio runtime.
//!
//! The driver task owns the session. It ticks the question clock once per
//! `tick`, applies answers sent through the [`SessionHandle`], holds each
//! result on screen for `reveal_delay`, and publishes a [`SessionSnapshot`]
//! after every change. When the session completes, the outcome is handed
//! to the UI first and the archive save runs afterwards, so a slow or
//! failing store never delays the result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::archive::SessionArchive;
use crate::model::{Question, SessionRecord};
use crate::session::{Phase, QuizSession, SessionSnapshot};

/// Timing used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Length of one clock tick; one tick takes one second off the clock.
    pub tick: Duration,
    /// How long a result stays on screen before the next question.
    pub reveal_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            reveal_delay: Duration::from_millis(3000),
        }
    }
}

/// Input from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Answer(usize),
    Abandon,
}

/// How a driven session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(SessionRecord),
    /// The user left early; nothing was archived.
    Abandoned,
}

impl SessionOutcome {
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            SessionOutcome::Completed(record) => Some(record),
            SessionOutcome::Abandoned => None,
        }
    }
}

/// The UI's view of a running session.
///
/// Dropping the handle abandons the session.
pub struct SessionHandle {
    id: Uuid,
    questions: Arc<[Question]>,
    snapshots: watch::Receiver<SessionSnapshot>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    outcome: oneshot::Receiver<SessionOutcome>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.snapshots.borrow().current_index()
    }

    pub fn remaining_secs(&self) -> u32 {
        self.snapshots.borrow().remaining_secs
    }

    /// Submit option `option` for the question on screen. Returns `false`
    /// if the session is no longer running. A second answer to the same
    /// question is accepted here but ignored by the session.
    pub fn answer(&self, option: usize) -> bool {
        self.commands.send(SessionCommand::Answer(option)).is_ok()
    }

    /// Leave the session early. Nothing is archived.
    pub fn abandon(&self) {
        let _ = self.commands.send(SessionCommand::Abandon);
    }

    /// Wait for the next published snapshot. Returns `false` once the
    /// driver has stopped.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }

    /// Wait for the session to end.
    pub async fn finished(self) -> SessionOutcome {
        let SessionHandle {
            commands, outcome, ..
        } = self;
        let result = outcome.await.unwrap_or(SessionOutcome::Abandoned);
        drop(commands);
        result
    }

    /// Wait for the session to end and for the driver to finish archiving
    /// it.
    pub async fn settled(self) -> SessionOutcome {
        let SessionHandle {
            commands,
            outcome,
            task,
            ..
        } = self;
        let result = outcome.await.unwrap_or(SessionOutcome::Abandoned);
        if let Err(e) = task.await {
            tracing::warn!("session driver task failed: {e}");
        }
        drop(commands);
        result
    }
}

/// Spawn a driver for a loaded session. Must be called from within a tokio
/// runtime.
///
/// When `archive` is set, a completed session is saved to it; a failed
/// save is logged and does not change the outcome.
pub fn spawn_session(
    session: QuizSession,
    archive: Option<Arc<SessionArchive>>,
    config: DriverConfig,
) -> SessionHandle {
    let id = session.id();
    let questions: Arc<[Question]> = Arc::from(session.questions().to_vec());
    let (snapshot_tx, snapshots) = watch::channel(session.snapshot());
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome) = oneshot::channel();

    let task = tokio::spawn(async move {
        let Some(record) = drive(session, command_rx, &snapshot_tx, config).await else {
            let _ = outcome_tx.send(SessionOutcome::Abandoned);
            return;
        };

        let _ = outcome_tx.send(SessionOutcome::Completed(record.clone()));
        if let Some(archive) = archive {
            match archive.save(&record).await {
                Ok(seq) => tracing::info!(session = %record.id, seq, "session saved"),
                Err(e) => tracing::error!(session = %record.id, "{e}"),
            }
        }
    });

    SessionHandle {
        id,
        questions,
        snapshots,
        commands,
        outcome,
        task,
    }
}

/// Run the session until it completes (`Some`) or is abandoned (`None`).
async fn drive(
    mut session: QuizSession,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    snapshots: &watch::Sender<SessionSnapshot>,
    config: DriverConfig,
) -> Option<SessionRecord> {
    let mut ticker = time::interval_at(Instant::now() + config.tick, config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        match session.phase() {
            Phase::Presenting(_) => {
                tokio::select! {
                    command = commands.recv() => match command {
                        Some(SessionCommand::Answer(option)) => {
                            if session.select(option).is_none() {
                                continue;
                            }
                        }
                        Some(SessionCommand::Abandon) | None => {
                            session.abandon();
                            return None;
                        }
                    },
                    _ = ticker.tick() => {
                        session.tick();
                    }
                }
            }
            Phase::Answered(_) => {
                let reveal = time::sleep(config.reveal_delay);
                tokio::pin!(reveal);
                loop {
                    tokio::select! {
                        _ = &mut reveal => break,
                        command = commands.recv() => match command {
                            Some(SessionCommand::Answer(_)) => {}
                            Some(SessionCommand::Abandon) | None => {
                                session.abandon();
                                return None;
                            }
                        },
                    }
                }
                session.advance();
                ticker.reset();
            }
            Phase::Loading | Phase::Completed => break,
        }
        snapshots.send_replace(session.snapshot());
    }

    session.finish()
}
