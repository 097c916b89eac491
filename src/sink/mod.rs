//! Downstream consumers of press/release notifications

#[cfg(target_os = "linux")]
mod uinput;

#[cfg(target_os = "linux")]
pub use uinput::{UinputSink, KEY_MAX};

use crate::keyboard::{KeyCode, KeyEvent};
use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use thiserror::Error;

/// Error type for sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    /// IO error talking to the input framework
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The code cannot be registered with the input framework
    #[error("key code {0} is out of range for the input device")]
    UnsupportedCode(KeyCode),
    /// The receiving side of a channel sink went away
    #[error("event receiver disconnected")]
    Disconnected,
}

/// Receives key notifications from the state machine
///
/// Calls for one key always arrive as `press` then `release`, alternating.
pub trait EventSink: Send + Sync {
    fn press(&self, code: KeyCode) -> Result<(), SinkError>;

    fn release(&self, code: KeyCode) -> Result<(), SinkError>;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn press(&self, code: KeyCode) -> Result<(), SinkError> {
        (**self).press(code)
    }

    fn release(&self, code: KeyCode) -> Result<(), SinkError> {
        (**self).release(code)
    }
}

/// Writes every notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn press(&self, code: KeyCode) -> Result<(), SinkError> {
        log::info!("key {} down", code);
        Ok(())
    }

    fn release(&self, code: KeyCode) -> Result<(), SinkError> {
        log::info!("key {} up", code);
        Ok(())
    }
}

/// Forwards notifications as [`KeyEvent`]s over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    event_tx: mpsc::Sender<KeyEvent>,
}

impl ChannelSink {
    pub fn new(event_tx: mpsc::Sender<KeyEvent>) -> Self {
        Self { event_tx }
    }

    /// Create a sink together with the receiver that observes it
    pub fn channel() -> (Self, mpsc::Receiver<KeyEvent>) {
        let (event_tx, event_rx) = mpsc::channel();
        (Self::new(event_tx), event_rx)
    }

    fn send(&self, event: KeyEvent) -> Result<(), SinkError> {
        self.event_tx
            .send(event)
            .map_err(|_| SinkError::Disconnected)
    }
}

impl EventSink for ChannelSink {
    fn press(&self, code: KeyCode) -> Result<(), SinkError> {
        self.send(KeyEvent::press(code))
    }

    fn release(&self, code: KeyCode) -> Result<(), SinkError> {
        self.send(KeyEvent::release(code))
    }
}

/// Delivers each notification to two sinks, in order
///
/// The second sink is called even if the first one fails; the first error
/// is returned.
pub struct Tee {
    first: Arc<dyn EventSink>,
    second: Arc<dyn EventSink>,
}

impl Tee {
    pub fn new(first: Arc<dyn EventSink>, second: Arc<dyn EventSink>) -> Self {
        Self { first, second }
    }
}

impl EventSink for Tee {
    fn press(&self, code: KeyCode) -> Result<(), SinkError> {
        let first = self.first.press(code);
        let second = self.second.press(code);
        first.and(second)
    }

    fn release(&self, code: KeyCode) -> Result<(), SinkError> {
        let first = self.first.release(code);
        let second = self.second.release(code);
        first.and(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyEventType;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn press(&self, _code: KeyCode) -> Result<(), SinkError> {
            Err(SinkError::Disconnected)
        }

        fn release(&self, _code: KeyCode) -> Result<(), SinkError> {
            Err(SinkError::Disconnected)
        }
    }

    #[test]
    fn channel_sink_forwards_events() {
        let (sink, rx) = ChannelSink::channel();
        sink.press(KeyCode(30)).unwrap();
        sink.release(KeyCode(30)).unwrap();

        let press = rx.try_recv().unwrap();
        assert_eq!(press.code, KeyCode(30));
        assert_eq!(press.event_type, KeyEventType::Press);

        let release = rx.try_recv().unwrap();
        assert_eq!(release.event_type, KeyEventType::Release);
        assert!(release.timestamp >= press.timestamp);
    }

    #[test]
    fn channel_sink_reports_disconnect() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        assert!(matches!(
            sink.press(KeyCode(1)),
            Err(SinkError::Disconnected)
        ));
    }

    #[test]
    fn tee_reaches_second_sink_when_first_fails() {
        let (channel, rx) = ChannelSink::channel();
        let tee = Tee::new(Arc::new(FailingSink), Arc::new(channel));

        assert!(tee.press(KeyCode(9)).is_err());
        assert_eq!(rx.try_recv().unwrap().code, KeyCode(9));
    }

    #[test]
    fn log_sink_never_fails() {
        assert!(LogSink.press(KeyCode(1)).is_ok());
        assert!(LogSink.release(KeyCode(1)).is_ok());
    }
}
