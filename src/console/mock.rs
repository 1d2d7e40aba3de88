//! Mock serial console for testing
//! Scripts the byte bursts an emulated Amiga shell sends back, so exchanges can
//! be tested without an emulator.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use super::types::{SENTINEL, Target};

/// Gap after the echo so it is not coalesced with the output
const ECHO_GAP_MS: u64 = 20;

/// One step of a scripted console conversation
#[derive(Debug, Clone)]
pub enum Step {
    /// Read up to and including the next `\r` and record the command text
    ReadCommand,
    /// Write raw bytes in a single burst
    Send(Vec<u8>),
    /// Stay silent for a while
    Pause(Duration),
    /// Abort the connection with a TCP reset
    Reset,
}

/// Steps played on a single connection
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_command(mut self) -> Self {
        self.steps.push(Step::ReadCommand);
        self
    }

    pub fn send(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.steps.push(Step::Send(bytes.as_ref().to_vec()));
        self
    }

    pub fn sentinel(self) -> Self {
        self.send([SENTINEL])
    }

    pub fn pause(mut self, ms: u64) -> Self {
        self.steps.push(Step::Pause(Duration::from_millis(ms)));
        self
    }

    pub fn reset(mut self) -> Self {
        self.steps.push(Step::Reset);
        self
    }

    /// A well-behaved shell: echo, output, sentinel, then `prompt`.
    /// The echo goes out in its own burst, as a real console sends it.
    pub fn shell_reply(echo: &str, output: &str, prompt: &str) -> Self {
        Self::new()
            .read_command()
            .send(format!("{}\r", echo))
            .pause(ECHO_GAP_MS)
            .send(output)
            .sentinel()
            .send(format!("\r{}", prompt))
    }

    /// A shell that accepts the command and never answers
    pub fn silent() -> Self {
        Self::new().read_command()
    }
}

#[derive(Debug, Default)]
struct ConsoleLog {
    commands: Vec<String>,
    accepted: usize,
    closed: usize,
}

/// In-process TCP console serving one script per accepted connection
pub struct MockConsole {
    target: Target,
    log: Arc<Mutex<ConsoleLog>>,
    task: JoinHandle<()>,
}

impl MockConsole {
    /// Bind to an ephemeral localhost port and serve `scripts` in order.
    /// Connections beyond the scripts get a silent console.
    pub async fn start(scripts: Vec<Script>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let log = Arc::new(Mutex::new(ConsoleLog::default()));
        let mut scripts: VecDeque<Script> = scripts.into();

        let task_log = log.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                task_log.lock().await.accepted += 1;
                let script = scripts.pop_front().unwrap_or_else(Script::silent);
                let log = task_log.clone();
                tokio::spawn(async move {
                    if let Err(e) = play(stream, script, log).await {
                        tracing::debug!("Mock console connection ended: {}", e);
                    }
                });
            }
        });

        Ok(Self {
            target: Target::new("127.0.0.1", port),
            log,
            task,
        })
    }

    pub fn target(&self) -> Target {
        self.target.clone()
    }

    /// Command lines received so far, without the trailing `\r`
    pub async fn commands(&self) -> Vec<String> {
        self.log.lock().await.commands.clone()
    }

    pub async fn accepted_connections(&self) -> usize {
        self.log.lock().await.accepted
    }

    pub async fn closed_connections(&self) -> usize {
        self.log.lock().await.closed
    }

    /// Wait until `count` connections have been closed by the client
    pub async fn wait_closed(&self, count: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.closed_connections().await >= count {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

impl Drop for MockConsole {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn play(mut stream: TcpStream, script: Script, log: Arc<Mutex<ConsoleLog>>) -> Result<()> {
    stream.set_nodelay(true)?;
    for step in script.steps {
        match step {
            Step::ReadCommand => {
                let mut line = Vec::new();
                let mut byte = [0u8; 1];
                loop {
                    if stream.read(&mut byte).await? == 0 {
                        log.lock().await.closed += 1;
                        return Ok(());
                    }
                    if byte[0] == b'\r' {
                        break;
                    }
                    line.push(byte[0]);
                }
                log.lock()
                    .await
                    .commands
                    .push(String::from_utf8_lossy(&line).into_owned());
            }
            Step::Send(bytes) => {
                stream.write_all(&bytes).await?;
                stream.flush().await?;
            }
            Step::Pause(duration) => sleep(duration).await,
            Step::Reset => {
                // Zero linger turns the close into an RST.
                stream.set_linger(Some(Duration::ZERO))?;
                drop(stream);
                log.lock().await.closed += 1;
                return Ok(());
            }
        }
    }

    // Hold the line open until the client hangs up.
    let mut sink = [0u8; 256];
    loop {
        match stream.read(&mut sink).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
    log.lock().await.closed += 1;
    Ok(())
}
