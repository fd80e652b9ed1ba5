//! Audit line publishing.
//!
//! Every message a role sends or receives produces one human-readable line.
//! Where the lines end up (a file, a channel, a test recorder) is the sink's
//! business; callers fire and forget.

use std::sync::Arc;

/// One-way sink for audit lines.
///
/// `publish` runs on session callback tasks. A sink that blocks stalls the
/// calling session, so slow sinks should hand lines off to a channel.
pub trait AuditSink: Send + Sync {
    /// Publish one line.
    fn publish(&self, line: &str);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn publish(&self, line: &str) {
        (**self).publish(line);
    }
}

/// Sink that emits lines as `tracing` events under the `fixsim::audit`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn publish(&self, line: &str) {
        tracing::info!(target: "fixsim::audit", "{line}");
    }
}
