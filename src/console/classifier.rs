//! Stream classifier for the serial console
//!
//! The Amiga shell answers with an unframed byte stream: first the echo of the
//! typed command, then the command's output, then a single SI control byte,
//! then a fresh prompt ending in `"> "`. [`StreamClassifier`] sorts every
//! received chunk into one of those buckets. It has no error branch; bytes it
//! does not recognise are either passed through as content or absorbed into the
//! prompt buffer.

use super::types::{PROMPT_TERMINATOR, SENTINEL};

/// Where the exchange is in the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    /// Output (and the command echo before it) is still arriving
    AwaitingSentinel,
    /// Output has ended, waiting for the prompt to be redisplayed
    AwaitingPromptTerminator,
}

/// What a single chunk turned out to contain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    /// Response text carried by the chunk
    pub content: Option<String>,
    /// The chunk carried pre-sentinel bytes (echo or output)
    pub activity: bool,
    /// The sentinel arrived in this chunk
    pub sentinel: bool,
    /// The prompt terminator was found for the first time in this chunk
    pub prompt: bool,
}

/// Per-exchange classification state
#[derive(Debug, Clone)]
pub struct StreamClassifier {
    state: ClassifierState,
    echo_len: usize,
    received: usize,
    prompt_buffer: Vec<u8>,
    prompt_seen: bool,
}

impl StreamClassifier {
    /// Create a classifier for a command of `echo_len` bytes
    pub fn new(echo_len: usize) -> Self {
        Self {
            state: ClassifierState::AwaitingSentinel,
            echo_len,
            received: 0,
            prompt_buffer: Vec::with_capacity(PROMPT_TERMINATOR.len() * 4),
            prompt_seen: false,
        }
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    pub fn sentinel_seen(&self) -> bool {
        self.state == ClassifierState::AwaitingPromptTerminator
    }

    pub fn prompt_seen(&self) -> bool {
        self.prompt_seen
    }

    /// Pre-sentinel bytes received so far, carriage returns included
    pub fn received(&self) -> usize {
        self.received
    }

    /// Classify one chunk as read from the socket
    pub fn feed(&mut self, chunk: &[u8]) -> Classified {
        let mut classified = Classified::default();
        if chunk.is_empty() {
            return classified;
        }

        match self.state {
            ClassifierState::AwaitingSentinel => {
                // Bytes ahead of a sentinel in the same read are still output.
                let (before, rest) = match chunk.iter().position(|&b| b == SENTINEL) {
                    Some(pos) => (&chunk[..pos], Some(&chunk[pos..])),
                    None => (chunk, None),
                };

                if !before.is_empty() {
                    classified.activity = true;
                    classified.content = self.take_output(before);
                }

                if let Some(rest) = rest {
                    self.state = ClassifierState::AwaitingPromptTerminator;
                    classified.sentinel = true;
                    classified.prompt = self.scan_prompt(&rest[1..]);
                }
            }
            ClassifierState::AwaitingPromptTerminator => {
                classified.prompt = self.scan_prompt(chunk);
            }
        }

        classified
    }

    /// Skip the command echo by byte count, then pass output through
    fn take_output(&mut self, bytes: &[u8]) -> Option<String> {
        let past_echo = self.received > self.echo_len;
        self.received += bytes.len();

        if !past_echo {
            return None;
        }

        let text = decode(bytes);
        if text.is_empty() { None } else { Some(text) }
    }

    /// Returns true only on the chunk that completes the terminator
    fn scan_prompt(&mut self, bytes: &[u8]) -> bool {
        if self.prompt_seen {
            return false;
        }

        self.prompt_buffer.extend_from_slice(bytes);
        let found = self
            .prompt_buffer
            .windows(PROMPT_TERMINATOR.len())
            .any(|window| window == PROMPT_TERMINATOR);

        if found {
            self.prompt_seen = true;
            self.prompt_buffer.clear();
        } else {
            // Only a partial terminator can straddle the next read.
            let keep = PROMPT_TERMINATOR.len() - 1;
            let excess = self.prompt_buffer.len().saturating_sub(keep);
            self.prompt_buffer.drain(..excess);
        }

        found
    }
}

/// Decode console bytes as Latin-1 (the Amiga character set), dropping CRs
fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|&&b| b != b'\r')
        .map(|&b| char::from(b))
        .collect()
}
