//! Scenario steps.

use fixsim_proto::Message;

/// What the runner does with a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Send the message to the counterparty.
    Outbound,
    /// Wait for an inbound message matching the template.
    ExpectInbound,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outbound => f.write_str("OUTBOUND"),
            Self::ExpectInbound => f.write_str("EXPECT_INBOUND"),
        }
    }
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Send or wait
    pub kind: StepKind,
    /// Message to send, or template to match
    pub message: Message,
    /// 1-based script line the step came from
    pub line: usize,
}

impl Step {
    /// Create a step.
    pub fn new(kind: StepKind, message: Message, line: usize) -> Self {
        Self { kind, message, line }
    }
}
