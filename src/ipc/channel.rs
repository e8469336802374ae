//! Newline-delimited JSON message channel.
//!
//! Each message is one line of JSON. `serde_json` escapes control characters
//! inside strings, so a serialized message never contains a raw newline.
//!
//! Writes go through a single writer task fed by an unbounded queue, so any
//! number of request tasks can send concurrently without interleaving bytes.

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("message channel closed")]
    Closed,

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cloneable sending half of a message channel.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<String>,
}

impl MessageSender {
    /// Serialize `message` and queue it for writing.
    pub fn send<T: Serialize>(&self, message: &T) -> Result<(), ChannelError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.tx.send(line).map_err(|_| ChannelError::Closed)
    }
}

/// Spawn the writer task for `writer`.
///
/// The task ends, shutting the writer down, once every [`MessageSender`]
/// clone has been dropped. It ends early with an error if a write fails.
pub fn spawn_writer<W>(writer: W) -> (MessageSender, JoinHandle<Result<(), ChannelError>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        writer.shutdown().await?;
        Ok(())
    });

    (MessageSender { tx }, task)
}

/// Receiving half: yields one message per non-blank line.
pub struct MessageReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next message, or `None` once the peer closed its end.
    pub async fn next_message(&mut self) -> Result<Option<String>, ChannelError> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn messages_round_trip_over_a_pipe() {
        let (client, server) = tokio::io::duplex(1024);
        let (sender, writer_task) = spawn_writer(client);
        let mut reader = MessageReader::new(server);

        sender.send(&json!({"data": "line\nbreak"})).unwrap();
        sender.send(&json!({"data": "second"})).unwrap();
        drop(sender);

        let first: serde_json::Value =
            serde_json::from_str(&reader.next_message().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["data"], "line\nbreak");

        let second: serde_json::Value =
            serde_json::from_str(&reader.next_message().await.unwrap().unwrap()).unwrap();
        assert_eq!(second["data"], "second");

        writer_task.await.unwrap().unwrap();
        assert!(reader.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn send_after_writer_gone_is_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let (sender, writer_task) = spawn_writer(client);

        // First write fails inside the task; later sends see a closed queue.
        let _ = sender.send(&json!({"n": 1}));
        assert!(writer_task.await.unwrap().is_err());
        assert!(matches!(
            sender.send(&json!({"n": 2})),
            Err(ChannelError::Closed)
        ));
    }
}
