//! Message transports: where payloads come from and where totals go.

use std::collections::HashMap;
use std::io::{self, BufRead, ErrorKind};
use std::sync::RwLock;
use std::thread;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::pipeline::{InboundMessage, InboxSender};
use crate::application::ports::{PublishError, Publisher};

/// Forward every non-empty line of `reader` to the inbox under `topic`.
///
/// Only the line terminator is stripped; the payload is otherwise forwarded
/// as sent. Lines that are not valid UTF-8 are logged and skipped. Blocks the
/// calling thread; run it on a dedicated thread so a pending read never holds
/// up runtime shutdown. Returns the number of forwarded messages once the
/// reader hits EOF or the inbox closes.
pub fn forward_lines<R>(mut reader: R, topic: &str, inbox: &InboxSender) -> io::Result<usize>
where
    R: BufRead,
{
    let mut forwarded = 0usize;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "Skipping input line that is not valid UTF-8");
                continue;
            }
        };
        let payload = line.trim_end_matches(['\r', '\n']);
        if payload.is_empty() {
            continue;
        }
        if inbox
            .blocking_send(InboundMessage::new(topic, payload))
            .is_err()
        {
            debug!("Inbox closed, no longer reading input");
            break;
        }
        forwarded += 1;
    }
    info!(forwarded, "Input source exhausted");
    Ok(forwarded)
}

/// Spawn a thread forwarding stdin lines to the inbox.
pub fn spawn_stdin_reader(topic: String, inbox: InboxSender) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if let Err(err) = forward_lines(io::stdin().lock(), &topic, &inbox) {
            warn!(error = %err, "Reading stdin failed");
        }
    })
}

/// Writes each payload as one line, e.g. to stdout.
pub struct LinePublisher<W> {
    writer: Mutex<W>,
}

impl<W> LinePublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl LinePublisher<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> Publisher for LinePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, _topic: &str, payload: &str) -> Result<(), PublishError> {
        let mut writer = self.writer.lock().await;
        let written = async {
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        written.map_err(|err| match err.kind() {
            ErrorKind::BrokenPipe => PublishError::Closed,
            _ => PublishError::Failed(err.to_string()),
        })
    }
}

/// Keeps the last payload published on every topic, like a retained
/// message on a broker.
#[derive(Debug, Default)]
pub struct RetainedPublisher {
    retained: RwLock<HashMap<String, String>>,
}

impl RetainedPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retained(&self, topic: &str) -> Option<String> {
        self.retained
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(topic)
            .cloned()
    }
}

#[async_trait]
impl Publisher for RetainedPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.retained
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(topic.to_string(), payload.to_string());
        Ok(())
    }
}
