use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Append-only, human-readable progress log fed by deployments.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Forwards messages to an unbounded channel. A closed receiver is ignored.
pub struct ChannelSink(pub UnboundedSender<String>);

impl ProgressSink for ChannelSink {
    fn report(&self, message: &str) {
        let _ = self.0.send(message.to_string());
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct ProgressLog {
    messages: Mutex<Vec<String>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

/// Emits each message as an `info` event.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&self, message: &str) {
        tracing::info!(target: "tokeneasy::progress", "{message}");
    }
}
