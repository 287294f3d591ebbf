use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;
use tracing::warn;

use crate::error::{SensorError, SensorResult};

/// Destination of published readings.
///
/// Publishing is fire-and-forget: implementations swallow (and log) their own
/// failures so a generator never blocks or errors on delivery.
pub trait PublishSink: Send + Sync {
    fn publish(&self, subtopic: &str, value: f64);

    /// Flush and release the transport. Called once at shutdown.
    fn disconnect(&self) {}
}

// ============================================================================
// WRITER SINK - Line-oriented "<subtopic> <value>" output
// ============================================================================

pub struct WriterSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Open the configured output: `"stdout"` or a file path (appended to).
    pub fn connect(target: &str) -> SensorResult<Self> {
        if target == "stdout" || target == "-" {
            return Ok(Self::new(Box::new(io::stdout())));
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(Path::new(target))
            .map_err(|e| SensorError::SinkConnect { message: format!("{}: {}", target, e) })?;
        Ok(Self::new(Box::new(file)))
    }
}

impl PublishSink for WriterSink {
    fn publish(&self, subtopic: &str, value: f64) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{} {}", subtopic, value).and_then(|_| out.flush()) {
            warn!(subtopic, error = %e, "publish failed");
        }
    }

    fn disconnect(&self) {
        if let Err(e) = self.out.lock().flush() {
            warn!(error = %e, "flush on disconnect failed");
        }
    }
}

// ============================================================================
// CHANNEL SINK - Hands publications to an in-process consumer
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Publication {
    pub subtopic: String,
    pub value: f64,
    pub at: Instant,
}

#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<Publication>,
}

impl ChannelSink {
    pub fn new(buffer_size: usize) -> (Self, Receiver<Publication>) {
        let (tx, rx) = bounded(buffer_size);
        (Self { tx }, rx)
    }
}

impl PublishSink for ChannelSink {
    fn publish(&self, subtopic: &str, value: f64) {
        let publication = Publication { subtopic: subtopic.to_string(), value, at: Instant::now() };
        match self.tx.try_send(publication) {
            Ok(()) => {}
            Err(TrySendError::Full(p)) => warn!(subtopic = %p.subtopic, "sink buffer full, dropping value"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_sink_formats_lines() {
        let buf = SharedBuf::default();
        let sink = WriterSink::new(Box::new(buf.clone()));
        sink.publish("/g/co201", 760.0);
        sink.publish("/g/pres01", 104.25);
        sink.disconnect();

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert_eq!(text, "/g/co201 760\n/g/pres01 104.25\n");
    }

    #[test]
    fn connect_fails_for_unwritable_path() {
        let result = WriterSink::connect("/definitely/not/a/dir/out.log");
        assert!(matches!(result, Err(SensorError::SinkConnect { .. })));
    }

    #[test]
    fn channel_sink_delivers_in_order() {
        let (sink, rx) = ChannelSink::new(10);
        sink.publish("/g/a", 1.0);
        sink.publish("/g/a", 2.0);

        let first = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        let second = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!((first.subtopic.as_str(), first.value), ("/g/a", 1.0));
        assert_eq!(second.value, 2.0);
    }

    #[test]
    fn full_channel_sink_drops_instead_of_blocking() {
        let (sink, rx) = ChannelSink::new(1);
        sink.publish("/g/a", 1.0);
        sink.publish("/g/a", 2.0);
        assert_eq!(rx.len(), 1);
    }
}
