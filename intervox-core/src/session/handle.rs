//! Spawned session: a cloneable handle talking to the loop over mpsc.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::AnswerSource;
use crate::error::{InterviewError, Result};
use crate::events::{SessionEvent, SessionSnapshot};
use crate::ptt::KeyEvent;
use crate::session::SessionController;

/// Everything a host can ask of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    End,
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    ToggleMic,
    UpdateDraft(String),
    SubmitDraft,
    Submit { text: String, source: AnswerSource },
    StopSpeaking,
    ResetMic,
    RetryOpeningQuestion,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| InterviewError::LoopClosed)
    }

    pub fn start(&self) -> Result<()> {
        self.send(SessionCommand::Start)
    }

    pub fn end(&self) -> Result<()> {
        self.send(SessionCommand::End)
    }

    pub fn submit(&self, text: impl Into<String>, source: AnswerSource) -> Result<()> {
        self.send(SessionCommand::Submit {
            text: text.into(),
            source,
        })
    }

    /// Latest published state. Never blocks on the loop.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl SessionController {
    /// Move the controller onto its own task. The task exits once every
    /// handle has been dropped.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            commands: tx,
            snapshot: Arc::clone(&self.snapshot),
            events: self.events_tx.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    pub fn apply(&mut self, command: SessionCommand) {
        debug!(?command, "session command");
        match command {
            SessionCommand::Start => self.start(),
            SessionCommand::End => self.end(),
            SessionCommand::KeyDown(event) => self.key_down(&event),
            SessionCommand::KeyUp(event) => self.key_up(&event),
            SessionCommand::ToggleMic => self.toggle_mic(),
            SessionCommand::UpdateDraft(text) => self.update_draft(text),
            SessionCommand::SubmitDraft => {
                self.submit_draft();
            }
            SessionCommand::Submit { text, source } => {
                self.submit(text, source);
            }
            SessionCommand::StopSpeaking => {
                self.stop_speaking();
            }
            SessionCommand::ResetMic => self.reset_mic(),
            SessionCommand::RetryOpeningQuestion => {
                self.retry_opening_question();
            }
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                event = self.next_event() => self.dispatch(event),
            }
        }
        info!("session loop exiting: all handles dropped");
    }
}
