//! Serial console data types and structures

use std::fmt;
use std::time::Duration;

/// Control byte (SI) the Amiga shell sends when a command's output has ended
pub const SENTINEL: u8 = 0x0F;

/// Tail of a freshly displayed shell prompt
pub const PROMPT_TERMINATOR: &[u8] = b"> ";

/// Line terminator appended to every outbound command
pub const COMMAND_TERMINATOR: char = '\r';

/// Default TCP port the emulator exposes its serial port on
pub const DEFAULT_PORT: u16 = 1234;

/// Default idle timeout for a user command
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Idle timeout used once the prompt has been seen
pub const DEFAULT_FAST_PATH_MS: u64 = 10;

/// Delay after activating the emulator window before talking to it
pub const DEFAULT_SETTLE_MS: u64 = 250;

/// Address of the emulator's serial console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form accepted by `TcpStream::connect`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A single command line together with its execution parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    activate: bool,
    timeout: Duration,
    quiet: bool,
}

impl Command {
    /// Build a command, rejecting embedded carriage returns and a zero timeout
    pub fn new(text: impl Into<String>, timeout_ms: u64) -> Result<Self, ConsoleError> {
        let text = text.into();
        if text.contains(COMMAND_TERMINATOR) {
            return Err(ConsoleError::InvalidCommand(text));
        }
        if timeout_ms == 0 {
            return Err(ConsoleError::InvalidTimeout);
        }

        Ok(Self {
            text,
            activate: false,
            timeout: Duration::from_millis(timeout_ms),
            quiet: false,
        })
    }

    /// Raise the emulator window before sending
    pub fn activate(mut self, activate: bool) -> Self {
        self.activate = activate;
        self
    }

    /// Accumulate output without emitting it live
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_activate(&self) -> bool {
        self.activate
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Bytes written to the console for this command
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.text.len() + 1);
        bytes.extend_from_slice(self.text.as_bytes());
        bytes.push(COMMAND_TERMINATOR as u8);
        bytes
    }
}

/// Outcome of one completed exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeResult {
    /// Response text with echo, sentinel and prompt removed
    pub text: String,
    /// Whether the end-of-output sentinel arrived
    pub sentinel_seen: bool,
    /// Whether the prompt terminator arrived after the sentinel
    pub prompt_seen: bool,
}

/// Running totals for a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub exchanges: u64,
    pub content_bytes: u64,
    pub bytes_received: u64,
}

/// Error types for console operations
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] std::io::Error),
    #[error("timeout must be greater than 0")]
    InvalidTimeout,
    #[error("command must not contain a carriage return: {0:?}")]
    InvalidCommand(String),
}

impl ConsoleError {
    /// Connection failures end the session; misuse errors never touched the wire
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectionLost(_))
    }
}
