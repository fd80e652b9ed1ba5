//! Scenario runner.
//!
//! Executes steps strictly in order on one task:
//!
//! ```text
//! Ready ─► Sending ─► Ready ─► Waiting ─► Ready ─► ... ─► Done
//!             │                   │
//!             └──── Failed ◄──────┘
//! ```
//!
//! OUTBOUND steps go through the role's `prepare_outbound` hook and then the
//! session layer. EXPECT_INBOUND steps arm the expectation slot and race the
//! completion signal against the role's wait ceiling. The first failure ends
//! the run.
//!
//! A reply that arrives before its expectation is armed finds the slot idle
//! and is lost; a script must not expect a message that can only arrive
//! before the preceding step has finished.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
    env::Environment,
    error::ScenarioError,
    expectation::ExpectationSlot,
    logon::LogonLatch,
    role::Role,
    session::{SessionId, SessionLayer},
    step::{Step, StepKind},
};

/// Runner tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Override for the role's EXPECT_INBOUND ceiling.
    pub expect_timeout: Option<Duration>,
    /// How long [`ScenarioRunner::await_logon`] waits.
    pub logon_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { expect_timeout: None, logon_timeout: Duration::from_secs(30) }
    }
}

/// Where the runner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Between steps.
    Ready,
    /// Handing step `step` to the session layer.
    Sending {
        /// 0-based step index
        step: usize,
    },
    /// Waiting for a message matching step `step`.
    Waiting {
        /// 0-based step index
        step: usize,
    },
    /// All steps executed.
    Done,
    /// Aborted.
    Failed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Steps executed (all of them).
    pub steps_executed: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// Sequential step executor for one role and one session.
pub struct ScenarioRunner<R: Role, E: Environment> {
    role: Arc<R>,
    env: E,
    sessions: Arc<dyn SessionLayer>,
    slot: Arc<ExpectationSlot>,
    latch: LogonLatch,
    session: SessionId,
    config: RunnerConfig,
    state: RunnerState,
}

impl<R: Role, E: Environment> ScenarioRunner<R, E> {
    /// Runner sending on `session`.
    ///
    /// `slot` and `latch` must be the ones the role's session adapter feeds.
    pub fn new(
        role: Arc<R>,
        env: E,
        sessions: Arc<dyn SessionLayer>,
        slot: Arc<ExpectationSlot>,
        latch: LogonLatch,
        session: SessionId,
    ) -> Self {
        Self {
            role,
            env,
            sessions,
            slot,
            latch,
            session,
            config: RunnerConfig::default(),
            state: RunnerState::Ready,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Session the runner sends on.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Wait until the session is logged on, bounded by `logon_timeout`.
    pub async fn await_logon(&self) -> Result<SessionId, ScenarioError> {
        let waited = self.config.logon_timeout;
        tokio::select! {
            biased;
            session = self.latch.wait() => {
                let session = session.unwrap_or_else(|| self.session.clone());
                info!(%session, "logged on");
                Ok(session)
            },
            () = self.env.sleep(waited) => {
                warn!(session = %self.session, ?waited, "logon timed out");
                Err(ScenarioError::LogonTimeout { waited })
            },
        }
    }

    /// Execute `steps` in order.
    ///
    /// Ends in [`RunnerState::Done`] with a report, or in
    /// [`RunnerState::Failed`] with the first error.
    pub async fn run(&mut self, steps: &[Step]) -> Result<ScenarioReport, ScenarioError> {
        let started = self.env.now();
        info!(role = self.role.name(), session = %self.session, steps = steps.len(), "scenario started");

        for (index, step) in steps.iter().enumerate() {
            let result = match step.kind {
                StepKind::Outbound => self.send(index, step),
                StepKind::ExpectInbound => self.expect(index, step).await,
            };
            if let Err(err) = result {
                self.state = RunnerState::Failed;
                warn!(role = self.role.name(), step = index, line = step.line, %err, "scenario failed");
                return Err(err);
            }
            self.state = RunnerState::Ready;
        }

        self.state = RunnerState::Done;
        let elapsed = elapsed_since(started, self.env.now());
        info!(role = self.role.name(), steps = steps.len(), ?elapsed, "scenario done");
        Ok(ScenarioReport { steps_executed: steps.len(), elapsed })
    }

    fn send(&mut self, index: usize, step: &Step) -> Result<(), ScenarioError> {
        self.state = RunnerState::Sending { step: index };

        let mut message = step.message.clone();
        self.role.prepare_outbound(&mut message, &self.session);
        debug!(step = index, line = step.line, message = %message.pretty(), "sending");

        self.sessions.send(message, &self.session).map_err(|reason| ScenarioError::SendFailure {
            step: index,
            line: step.line,
            reason,
        })
    }

    async fn expect(&mut self, index: usize, step: &Step) -> Result<(), ScenarioError> {
        self.state = RunnerState::Waiting { step: index };

        let waited = self.config.expect_timeout.unwrap_or_else(|| self.role.default_wait());
        let mut receiver = self.slot.install(step.message.clone());
        debug!(step = index, line = step.line, template = %step.message.pretty(), ?waited, "waiting");

        tokio::select! {
            biased;
            received = &mut receiver => match received {
                Ok(message) => {
                    debug!(step = index, message = %message.pretty(), "expectation met");
                    Ok(())
                },
                Err(_) => Err(ScenarioError::ExpectationCancelled { step: index }),
            },
            () = self.env.sleep(waited) => {
                // A match may have taken the slot between the timer firing
                // and here.
                if !self.slot.clear() && receiver.try_recv().is_ok() {
                    return Ok(());
                }
                Err(ScenarioError::ExpectationTimeout {
                    step: index,
                    line: step.line,
                    expected: step.message.pretty(),
                    waited,
                })
            },
        }
    }
}

fn elapsed_since(start: Instant, end: Instant) -> Duration {
    end.saturating_duration_since(start)
}
