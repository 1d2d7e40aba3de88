//! Console session: one command, one connection
//!
//! Every command opens a fresh TCP connection to the emulator's serial port,
//! writes the command, and reads until the line has been idle for the
//! command's timeout. Nothing marks the end of a response except silence, so
//! the idle timer is the only way an exchange completes.

use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info};

use crate::activation::WindowActivator;

use super::classifier::StreamClassifier;
use super::timer::IdleTimer;
use super::types::{
    Command, ConsoleError, DEFAULT_FAST_PATH_MS, DEFAULT_SETTLE_MS, ExchangeResult, SessionStats,
    Target,
};

const READ_BUFFER_SIZE: usize = 4096;

/// Console session bound to one emulator
#[derive(Debug)]
pub struct Session {
    target: Target,
    activator: WindowActivator,
    settle_delay: Duration,
    fast_path: Duration,
    stats: SessionStats,
}

impl Session {
    /// Create a session for `target` that never activates a window
    pub fn new(target: Target) -> Self {
        Self {
            target,
            activator: WindowActivator::noop(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            fast_path: Duration::from_millis(DEFAULT_FAST_PATH_MS),
            stats: SessionStats::default(),
        }
    }

    pub fn with_activator(mut self, activator: WindowActivator) -> Self {
        self.activator = activator;
        self
    }

    /// Delay between activating the window and connecting
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Idle timeout once the prompt has been seen
    pub fn with_fast_path(mut self, fast_path: Duration) -> Self {
        self.fast_path = fast_path;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Connect, send `command` and return the in-flight exchange.
    ///
    /// The exchange borrows the session, so a second exchange cannot start
    /// until this one is finished or dropped.
    pub async fn execute(&mut self, command: &Command) -> Result<Exchange<'_>, ConsoleError> {
        if command.is_activate() {
            self.activator.activate();
            tokio::time::sleep(self.settle_delay).await;
        }

        let addr = self.target.addr();
        let mut stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(source) => {
                error!("Failed to connect to console at {}: {}", addr, source);
                return Err(ConsoleError::Connect { addr, source });
            }
        };
        debug!("Connected to console at {}", addr);

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on console socket: {}", e);
        }

        // Arm the exchange before the first byte goes out.
        let classifier = StreamClassifier::new(command.text().len());
        stream.write_all(&command.wire_bytes()).await?;
        stream.flush().await?;
        debug!("Sent command {:?}", command.text());

        let timer = IdleTimer::new(command.timeout(), self.fast_path);

        Ok(Exchange {
            session: self,
            stream: Some(stream),
            classifier,
            timer,
            quiet: command.is_quiet(),
            text: String::new(),
            read_buf: vec![0; READ_BUFFER_SIZE],
            eof: false,
        })
    }

    /// Run `command` to completion, writing live output to `observer`
    pub async fn execute_command<W>(
        &mut self,
        command: &Command,
        observer: &mut W,
    ) -> Result<ExchangeResult, ConsoleError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut exchange = self.execute(command).await?;

        while let Some(chunk) = exchange.next_chunk().await? {
            // The observer is not the console; a broken stdout must not end the exchange.
            if let Err(e) = write_chunk(observer, &chunk).await {
                debug!("Failed to emit output chunk: {}", e);
            }
        }

        exchange.finish().await
    }
}

async fn write_chunk<W>(observer: &mut W, chunk: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    observer.write_all(chunk.as_bytes()).await?;
    observer.flush().await
}

/// A single in-flight command/response exchange
#[derive(Debug)]
pub struct Exchange<'a> {
    session: &'a mut Session,
    stream: Option<TcpStream>,
    classifier: StreamClassifier,
    timer: IdleTimer,
    quiet: bool,
    text: String,
    read_buf: Vec<u8>,
    eof: bool,
}

impl<'a> Exchange<'a> {
    /// Next chunk of output to show the user, or `None` once the line has
    /// gone idle. Quiet exchanges never yield chunks.
    pub async fn next_chunk(&mut self) -> Result<Option<String>, ConsoleError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };

            tokio::select! {
                read = stream.read(&mut self.read_buf), if !self.eof => {
                    match read {
                        Ok(0) => {
                            // Keep waiting out the idle timer; a close is not a response end.
                            debug!("Console closed the connection");
                            self.eof = true;
                        }
                        Ok(n) => {
                            if let Some(chunk) = self.handle_chunk(n) {
                                return Ok(Some(chunk));
                            }
                        }
                        Err(e) => {
                            error!("Console connection error: {}", e);
                            self.stream = None;
                            return Err(ConsoleError::ConnectionLost(e));
                        }
                    }
                }
                _ = self.timer.expired() => {
                    self.complete().await;
                    return Ok(None);
                }
            }
        }
    }

    /// Wait for the exchange to complete and return the accumulated response
    pub async fn finish(mut self) -> Result<ExchangeResult, ConsoleError> {
        while self.next_chunk().await?.is_some() {}

        Ok(ExchangeResult {
            text: std::mem::take(&mut self.text),
            sentinel_seen: self.classifier.sentinel_seen(),
            prompt_seen: self.classifier.prompt_seen(),
        })
    }

    /// Output chunks as a finite stream; ends after the idle timer fires or
    /// after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<String, ConsoleError>> + 'a {
        stream::unfold(Some(self), |state| async move {
            let mut exchange = state?;
            match exchange.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(exchange))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Response text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sentinel_seen(&self) -> bool {
        self.classifier.sentinel_seen()
    }

    pub fn is_complete(&self) -> bool {
        self.stream.is_none()
    }

    fn handle_chunk(&mut self, n: usize) -> Option<String> {
        let classified = self.classifier.feed(&self.read_buf[..n]);
        self.session.stats.bytes_received += n as u64;

        if classified.activity {
            self.timer.restart();
        }
        if classified.sentinel {
            debug!("End-of-output sentinel received");
        }
        if classified.prompt {
            debug!("Prompt detected, collapsing idle timer");
            self.timer.collapse();
        }

        let content = classified.content?;
        self.session.stats.content_bytes += content.len() as u64;
        self.text.push_str(&content);

        if self.quiet { None } else { Some(content) }
    }

    async fn complete(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Error shutting down console connection: {}", e);
            }
        }

        self.session.stats.exchanges += 1;
        info!(
            "Exchange complete: {} bytes of output, sentinel={}, prompt={}",
            self.text.len(),
            self.classifier.sentinel_seen(),
            self.classifier.prompt_seen()
        );
    }
}
