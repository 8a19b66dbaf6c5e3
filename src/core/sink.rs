//! Display sinks receiving session output

use crossbeam_channel::{Receiver, Sender};

/// Output of the framing engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One decoded chunk, ready for display
    Data(String),
    /// The device failed during a poll and the session was closed
    Disconnected {
        /// Port that went away
        port: String,
    },
}

/// Receiver of session events
pub trait Sink: Send {
    /// Deliver one event
    fn emit(&mut self, event: SessionEvent);
}

impl std::fmt::Debug for dyn Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sink")
    }
}

impl Sink for Vec<SessionEvent> {
    fn emit(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

/// Sink forwarding events over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SessionEvent>,
}

impl ChannelSink {
    /// Create an unbounded sink and the receiver the host drains
    pub fn new() -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn emit(&mut self, event: SessionEvent) {
        // receiver gone means the host is shutting down
        if self.tx.send(event).is_err() {
            tracing::trace!("Session event dropped, receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (mut sink, rx) = ChannelSink::new();
        sink.emit(SessionEvent::Data("a\n".into()));
        sink.emit(SessionEvent::Disconnected { port: "COM1".into() });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::Data("a\n".into()),
                SessionEvent::Disconnected { port: "COM1".into() },
            ]
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(SessionEvent::Data("lost".into()));
    }
}
