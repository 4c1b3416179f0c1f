//! Connection plumbing: the shared outbound writer and the prompt/line rendezvous.
//!
//! One input-producer task owns the read half of the connection. It sleeps until the session
//! hands it a [`ReadRequest`], writes that request's prompt, reads one line and passes the line
//! back. Because the producer never prompts on its own, a prompt only ever appears when the
//! session is actually waiting for input. Arming waits until the prompt is on the wire, so text
//! the session writes afterwards always lands behind it.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::logutil::escape_log;
use crate::session::errors::SessionError;
use crate::session::terminal::Terminal;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Outbound half of a connection, shared by the session and its input producer.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<BoxedWriter>>,
}

impl SharedWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write and flush `text` as one unit; concurrent writers never interleave inside it.
    pub async fn write_str(&self, text: &str) -> io::Result<()> {
        let mut writer = self.inner.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await
    }

    pub async fn shutdown(&self) -> io::Result<()> {
        self.inner.lock().await.shutdown().await
    }
}

/// Ask the input producer for one line, shown with `prompt`.
#[derive(Debug)]
pub struct ReadRequest {
    pub prompt: String,
    /// Fired once the prompt has been written, before the producer starts reading.
    written: oneshot::Sender<()>,
}

impl ReadRequest {
    pub fn new(prompt: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (written, ack) = oneshot::channel();
        (
            Self {
                prompt: prompt.into(),
                written,
            },
            ack,
        )
    }
}

/// Serve read requests until the session hangs up or the peer disconnects. Dropping `lines` on
/// exit is how the session learns the connection is gone.
pub async fn run_input_producer<R>(
    reader: R,
    writer: SharedWriter,
    mut requests: mpsc::Receiver<ReadRequest>,
    lines: mpsc::Sender<String>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(request) = requests.recv().await {
        if !request.prompt.is_empty() {
            if let Err(e) = writer.write_str(&request.prompt).await {
                debug!("prompt write failed: {}", e);
                break;
            }
        }
        let _ = request.written.send(());
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("peer closed input");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                trace!("input line: {}", escape_log(&line));
                if lines.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("input read failed: {}", e);
                break;
            }
        }
    }
}

/// The session's side of the rendezvous plus the shared writer.
pub struct SessionIo {
    writer: SharedWriter,
    requests: mpsc::Sender<ReadRequest>,
    lines: mpsc::Receiver<String>,
    window: (usize, usize),
    producer: JoinHandle<()>,
}

impl SessionIo {
    /// Spawn the input producer for `reader` and return the session end.
    pub fn spawn<R>(reader: R, writer: SharedWriter, window: (usize, usize)) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        // A single slot: at most one outstanding "please type now".
        let (request_tx, request_rx) = mpsc::channel(1);
        let (line_tx, line_rx) = mpsc::channel(1);
        let producer = tokio::spawn(run_input_producer(
            reader,
            writer.clone(),
            request_rx,
            line_tx,
        ));
        Self {
            writer,
            requests: request_tx,
            lines: line_rx,
            window,
            producer,
        }
    }

    /// Re-arm the producer: it prints `prompt` and reads the next line. Returns once the prompt
    /// has been written.
    pub async fn arm(&self, prompt: &str) -> Result<(), SessionError> {
        let (request, written) = ReadRequest::new(prompt);
        self.requests
            .send(request)
            .await
            .map_err(|_| SessionError::Disconnected)?;
        written.await.map_err(|_| SessionError::Disconnected)
    }

    /// Wait for the line answering the last [`SessionIo::arm`]. Cancel-safe.
    pub async fn next_line(&mut self) -> Result<String, SessionError> {
        self.lines.recv().await.ok_or(SessionError::Disconnected)
    }

    pub fn writer(&self) -> &SharedWriter {
        &self.writer
    }

    /// Close the outbound half; the peer sees end of stream.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl Drop for SessionIo {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

#[async_trait]
impl Terminal for SessionIo {
    async fn get_input(&mut self, prompt: &str) -> Result<String, SessionError> {
        self.arm(prompt).await?;
        self.next_line().await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.writer.write_str(&format!("{}\r\n", line)).await?;
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), SessionError> {
        self.writer.write_str(text).await?;
        Ok(())
    }

    fn window_size(&self) -> (usize, usize) {
        self.window
    }
}
