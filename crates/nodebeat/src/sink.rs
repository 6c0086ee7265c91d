//! Telemetry sinks.
//!
//! The scheduler owns its sink exclusively and closes it once on shutdown.
//! A failed `emit` drops that record; nothing is retried.

use std::path::Path;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::EmitError;
use crate::record::TelemetryRecord;

/// Destination for finished telemetry records.
#[async_trait::async_trait]
pub trait TelemetrySink: Send {
    async fn emit(&mut self, record: &TelemetryRecord) -> Result<(), EmitError>;

    /// Flush and release the underlying connection.
    async fn close(&mut self) -> Result<(), EmitError>;
}

/// Writes each record as one line of JSON.
pub struct JsonLinesSink<W> {
    writer: Option<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Some(writer) }
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl JsonLinesSink<tokio::fs::File> {
    /// Append to `path`, creating it if needed.
    pub async fn append(path: impl AsRef<Path>) -> Result<Self, EmitError> {
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self::new(file))
    }
}

#[async_trait::async_trait]
impl<W> TelemetrySink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&mut self, record: &TelemetryRecord) -> Result<(), EmitError> {
        let writer = self.writer.as_mut().ok_or(EmitError::Closed)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EmitError> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

/// Forwards records through a channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::Sender<TelemetryRecord>>,
}

impl ChannelSink {
    /// Create a channel sink and the receiving half.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<TelemetryRecord>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx: Some(tx) }, rx)
    }
}

#[async_trait::async_trait]
impl TelemetrySink for ChannelSink {
    async fn emit(&mut self, record: &TelemetryRecord) -> Result<(), EmitError> {
        let tx = self.tx.as_ref().ok_or(EmitError::Closed)?;
        tx.send(record.clone()).await.map_err(|_| EmitError::Closed)
    }

    async fn close(&mut self) -> Result<(), EmitError> {
        self.tx = None;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S> TelemetrySink for Box<S>
where
    S: TelemetrySink + ?Sized,
{
    async fn emit(&mut self, record: &TelemetryRecord) -> Result<(), EmitError> {
        (**self).emit(record).await
    }

    async fn close(&mut self) -> Result<(), EmitError> {
        (**self).close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Endpoint;

    fn record() -> TelemetryRecord {
        TelemetryRecord::failure("test1", "src", &Endpoint::new("nodeA", "127.0.0.1", 8888), "down")
    }

    #[tokio::test]
    async fn test_json_lines_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");

        let mut sink = JsonLinesSink::append(&path).await.unwrap();
        sink.emit(&record()).await.unwrap();
        sink.emit(&record()).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: TelemetryRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.bp_name, "nodeA");
    }

    #[tokio::test]
    async fn test_emit_after_close_fails() {
        let mut sink = JsonLinesSink::new(Vec::<u8>::new());
        sink.close().await.unwrap();
        assert!(matches!(sink.emit(&record()).await, Err(EmitError::Closed)));
        // Closing twice is harmless
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (mut sink, mut rx) = ChannelSink::channel(4);
        sink.emit(&record()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().target, "127.0.0.1");

        sink.close().await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_sink_receiver_dropped() {
        let (mut sink, rx) = ChannelSink::channel(1);
        drop(rx);
        assert!(matches!(sink.emit(&record()).await, Err(EmitError::Closed)));
    }

    #[tokio::test]
    async fn test_boxed_sink() {
        let (sink, mut rx) = ChannelSink::channel(1);
        let mut boxed: Box<dyn TelemetrySink> = Box::new(sink);
        boxed.emit(&record()).await.unwrap();
        assert!(rx.recv().await.is_some());
    }
}
