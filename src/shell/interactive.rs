//! Interactive shell loop against the emulator console

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::console::{Command, ConsoleError, ExchangeResult, Session, SessionStats};

use super::input::{LineReader, SubmissionGate};

/// Printed when input ends
const TERMINATED_MESSAGE: &str = "\n[Terminated by user]\n";

/// Timeouts and commands driving the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub timeout_ms: u64,
    pub activate: bool,
    pub probe_timeout_ms: u64,
    pub prompt_timeout_ms: u64,
    pub location_command: String,
}

impl ShellSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout_ms: config.console.timeout_ms,
            activate: config.activation.activate,
            probe_timeout_ms: config.shell.probe_timeout_ms,
            prompt_timeout_ms: config.shell.prompt_timeout_ms,
            location_command: config.shell.location_command.clone(),
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to a submitted line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The command ran; output was streamed while it arrived
    Executed(ExchangeResult),
    /// The liveness probe saw no sentinel, so the command was not sent
    Unresponsive,
}

/// Read-eval-print loop over one console session
pub struct InteractiveShell<W> {
    session: Session,
    settings: ShellSettings,
    output: W,
    gate: SubmissionGate,
    prompt: String,
}

impl<W> InteractiveShell<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(session: Session, settings: ShellSettings, output: W) -> Self {
        Self {
            session,
            settings,
            output,
            gate: SubmissionGate::new(),
            prompt: String::new(),
        }
    }

    /// Gate to hand to the line reader feeding this shell
    pub fn gate(&self) -> SubmissionGate {
        self.gate.clone()
    }

    /// Current prompt; blank when the console did not answer
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn stats(&self) -> &SessionStats {
        self.session.stats()
    }

    /// Run until `lines` ends. A connection error ends the loop early.
    pub async fn run(mut self, mut lines: LineReader) -> Result<SessionStats, ConsoleError> {
        info!("Starting interactive shell on {}", self.session.target());
        self.refresh_prompt().await?;

        while let Some(line) = lines.next_line().await {
            let result = self.handle_line(&line).await;
            self.gate.release();
            result?;
        }

        self.write(TERMINATED_MESSAGE).await;
        debug!(
            "Shell finished: {:?}, {} lines dropped while busy",
            self.session.stats(),
            lines.dropped()
        );
        Ok(self.session.stats().clone())
    }

    /// Probe, run the line, then redraw the prompt
    pub async fn handle_line(&mut self, line: &str) -> Result<Submission, ConsoleError> {
        let submission = self.submit(line).await?;
        self.refresh_prompt().await?;
        Ok(submission)
    }

    /// Probe the console and, if it is idle, run `line` with live output
    pub async fn submit(&mut self, line: &str) -> Result<Submission, ConsoleError> {
        let probe = Command::new("", self.settings.probe_timeout_ms)?.quiet(true);
        let probe_result = self.session.execute_command(&probe, &mut self.output).await?;

        if !probe_result.sentinel_seen {
            warn!("Console did not answer the probe; command not sent");
            return Ok(Submission::Unresponsive);
        }

        let command = Command::new(line.replace('\r', ""), self.settings.timeout_ms)?
            .activate(self.settings.activate);
        let result = self
            .session
            .execute_command(&command, &mut self.output)
            .await?;

        Ok(Submission::Executed(result))
    }

    /// Ask the console where it is and show the next prompt
    pub async fn refresh_prompt(&mut self) -> Result<&str, ConsoleError> {
        let command =
            Command::new(self.settings.location_command.as_str(), self.settings.prompt_timeout_ms)?
                .quiet(true);
        let result = self.session.execute_command(&command, &mut self.output).await?;

        self.prompt = prompt_from(&result);
        let prompt = self.prompt.clone();
        self.write(&prompt).await;
        Ok(&self.prompt)
    }

    async fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let written = async {
            self.output.write_all(text.as_bytes()).await?;
            self.output.flush().await
        };
        if let Err(e) = written.await {
            debug!("Failed to write to output: {}", e);
        }
    }
}

/// Prompt shown after a location command; blank if the sentinel never came
pub fn prompt_from(result: &ExchangeResult) -> String {
    if result.sentinel_seen {
        format!("{}> ", result.text.trim_end_matches(['\r', '\n']))
    } else {
        String::new()
    }
}
