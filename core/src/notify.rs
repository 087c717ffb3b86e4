use serde_json::Value;
use tokio::sync::mpsc;

/// Host UI notification sink: `(channel, ...args)`, fire-and-forget.
pub trait UiNotifier: Send + Sync {
    fn notify(&self, channel: &str, args: &[Value]);
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiEvent {
    pub channel: String,
    pub args: Vec<Value>,
}

/// Forwards notifications to an unbounded channel, for embedding hosts.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UiNotifier for ChannelNotifier {
    fn notify(&self, channel: &str, args: &[Value]) {
        let event = UiEvent {
            channel: channel.to_string(),
            args: args.to_vec(),
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(target: "scriptbridge.notify", channel, "ui receiver dropped");
        }
    }
}

/// Logs notifications only.
pub struct TracingNotifier;

impl UiNotifier for TracingNotifier {
    fn notify(&self, channel: &str, args: &[Value]) {
        tracing::info!(target: "scriptbridge.notify", channel, args = ?args, "ui notify");
    }
}
