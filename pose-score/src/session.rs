//! Session lifecycle: Idle -> Running -> Completed.
//!
//! A [`SessionController`] owns the score log of the one active session. The
//! frame loop mutates it; status readers never touch it. Every transition
//! publishes a [`SessionStatus`] snapshot on a watch channel, and readers poll
//! that snapshot through a [`SessionStatusHandle`].
//!
//! Completed does not fall back to Idle on its own. A new `start` re-enters
//! Running directly and clears the previous log and result.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::SessionError;

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session started yet, or the last result was consumed
    Idle,
    /// Capture active, scores accumulating
    Running,
    /// Capture ended, aggregate available
    Completed,
}

/// Published snapshot of the session, safe to read from any thread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed { result: f64 },
}

/// Owner of the session state machine and score log.
#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    scores: Vec<f64>,
    result: Option<f64>,
    deadline: Option<Instant>,
    discarded_frames: usize,
    session_id: u64,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionController {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        Self {
            state: SessionState::Idle,
            scores: Vec::new(),
            result: None,
            deadline: None,
            discarded_frames: 0,
            session_id: 0,
            status_tx,
        }
    }

    /// Begin a session lasting `duration` from now.
    ///
    /// Rejected while another session is running, so a result someone may be
    /// polling for is never silently discarded.
    pub fn start(&mut self, duration: Duration) -> Result<(), SessionError> {
        self.start_at(duration, Instant::now())
    }

    /// Begin a session whose clock starts at `now`.
    pub fn start_at(&mut self, duration: Duration, now: Instant) -> Result<(), SessionError> {
        match self.state {
            SessionState::Running => {
                log::warn!("Rejecting session start: a session is already running");
                Err(SessionError::SessionAlreadyRunning)
            }
            SessionState::Idle | SessionState::Completed => {
                log::info!("Starting session for {:.1}s", duration.as_secs_f64());
                self.scores.clear();
                self.result = None;
                self.discarded_frames = 0;
                self.deadline = now.checked_add(duration);
                self.session_id += 1;
                self.state = SessionState::Running;
                self.publish();
                Ok(())
            }
        }
    }

    /// Append a blended frame score to the log.
    ///
    /// Returns `false` when the score was not recorded: outside Running, or when
    /// the score is NaN or infinite. Non-finite scores are counted in
    /// [`discarded_frames`](Self::discarded_frames) and never reach the average.
    pub fn record_frame(&mut self, score: f64) -> bool {
        if self.state != SessionState::Running {
            log::debug!("Ignoring frame score {score} in {:?} state", self.state);
            return false;
        }

        if !score.is_finite() {
            self.discarded_frames += 1;
            log::debug!("Discarding non-finite frame score {score}");
            return false;
        }

        self.scores.push(score);
        true
    }

    /// End the running session and compute the mean score (0 if no frames).
    ///
    /// Idempotent: outside Running this changes nothing and returns the
    /// existing result, if any.
    pub fn stop(&mut self) -> Option<f64> {
        match self.state {
            SessionState::Running => {
                let result = if self.scores.is_empty() {
                    0.0
                } else {
                    self.scores.iter().sum::<f64>() / self.scores.len() as f64
                };

                log::info!(
                    "Session complete: {} frames scored, {} discarded, average {:.2}",
                    self.scores.len(),
                    self.discarded_frames,
                    result
                );

                self.result = Some(result);
                self.deadline = None;
                self.state = SessionState::Completed;
                self.publish();
                Some(result)
            }
            SessionState::Idle | SessionState::Completed => self.result,
        }
    }

    /// Abandon a running session without producing a result.
    ///
    /// Used when capture could not start at all. Returns `true` if a session
    /// was running.
    pub fn abort(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }

        log::warn!(
            "Aborting session after {} scored frames",
            self.scores.len()
        );
        self.scores.clear();
        self.deadline = None;
        self.state = SessionState::Idle;
        self.publish();
        true
    }

    /// Consume a completed result and return to Idle.
    pub fn reset(&mut self) -> Option<f64> {
        match self.state {
            SessionState::Completed => {
                let result = self.result.take();
                self.scores.clear();
                self.state = SessionState::Idle;
                self.publish();
                result
            }
            SessionState::Idle | SessionState::Running => None,
        }
    }

    pub fn query_status(&self) -> SessionStatus {
        match (self.state, self.result) {
            (SessionState::Running, _) => SessionStatus::Running,
            (SessionState::Completed, Some(result)) => SessionStatus::Completed { result },
            _ => SessionStatus::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the frame loop should end: the session is no longer running or
    /// its deadline has passed.
    pub fn should_stop(&self, now: Instant) -> bool {
        match (self.state, self.deadline) {
            (SessionState::Running, Some(deadline)) => now >= deadline,
            (SessionState::Running, None) => false,
            _ => true,
        }
    }

    /// Time left before the deadline, if running.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            SessionState::Running => self
                .deadline
                .map(|deadline| deadline.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Increments on every successful `start`, so a frame loop can tell
    /// whether the session it was started for is still the current one.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn frames_recorded(&self) -> usize {
        self.scores.len()
    }

    pub fn discarded_frames(&self) -> usize {
        self.discarded_frames
    }

    /// A read-only handle to the published status.
    pub fn subscribe(&self) -> SessionStatusHandle {
        SessionStatusHandle {
            rx: self.status_tx.subscribe(),
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.query_status());
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the session snapshot.
///
/// Reading never blocks the frame loop, which only publishes on transitions.
#[derive(Debug, Clone)]
pub struct SessionStatusHandle {
    rx: watch::Receiver<SessionStatus>,
}

impl SessionStatusHandle {
    pub fn current(&self) -> SessionStatus {
        *self.rx.borrow()
    }

    /// Wait until a session completes. Returns `None` if the controller is dropped first.
    pub async fn wait_for_completion(&mut self) -> Option<f64> {
        let status = self
            .rx
            .wait_for(|status| matches!(status, SessionStatus::Completed { .. }))
            .await
            .ok()?;
        match *status {
            SessionStatus::Completed { result } => Some(result),
            _ => None,
        }
    }
}
