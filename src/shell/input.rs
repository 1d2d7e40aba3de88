//! Line input for the interactive shell
//!
//! Lines are read on their own task so the user can keep typing while a
//! command runs. A line that arrives while another one is still being
//! processed is dropped at the gate instead of being queued behind it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Single-flight gate shared by the reader task and the shell loop
#[derive(Debug, Clone, Default)]
pub struct SubmissionGate {
    busy: Arc<AtomicBool>,
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate; false if a submission is already in flight
    pub fn try_acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Lines accepted through a [`SubmissionGate`]
pub struct LineReader {
    line_rx: mpsc::UnboundedReceiver<String>,
    dropped: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl LineReader {
    /// Start reading `input` line by line on a background task
    pub fn spawn<R>(input: R, gate: SubmissionGate) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let dropped = Arc::new(AtomicU64::new(0));
        let task_dropped = dropped.clone();

        let task = tokio::spawn(async move {
            let mut lines = input.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if !gate.try_acquire() {
                            debug!("Dropping line submitted while busy: {:?}", line);
                            task_dropped.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Input stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            line_rx,
            dropped,
            task,
        }
    }

    /// Reader over the process's standard input
    pub fn stdin(gate: SubmissionGate) -> Self {
        Self::spawn(tokio::io::BufReader::new(tokio::io::stdin()), gate)
    }

    /// Next accepted line; `None` once input has ended.
    /// The caller owns the gate until it releases it.
    pub async fn next_line(&mut self) -> Option<String> {
        self.line_rx.recv().await
    }

    /// Lines discarded because a submission was in flight
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for LineReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[test]
    fn test_gate_is_single_flight() {
        let gate = SubmissionGate::new();
        assert!(gate.try_acquire());
        assert!(gate.is_busy());
        assert!(!gate.clone().try_acquire());
        gate.release();
        assert!(gate.try_acquire());
    }

    #[tokio::test]
    async fn test_lines_while_busy_are_dropped() {
        let (mut writer, reader) = tokio::io::duplex(256);
        let gate = SubmissionGate::new();
        let mut lines = LineReader::spawn(BufReader::new(reader), gate.clone());

        writer.write_all(b"dir\n").await.unwrap();
        assert_eq!(lines.next_line().await.as_deref(), Some("dir"));

        // Still busy with "dir".
        writer.write_all(b"list\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(lines.dropped(), 1);

        gate.release();
        writer.write_all(b"cd\n").await.unwrap();
        assert_eq!(lines.next_line().await.as_deref(), Some("cd"));

        gate.release();
        drop(writer);
        assert_eq!(lines.next_line().await, None);
    }

    #[tokio::test]
    async fn test_crlf_input() {
        let input = BufReader::new(&b"echo hi\r\n"[..]);
        let gate = SubmissionGate::new();
        let mut lines = LineReader::spawn(input, gate);
        assert_eq!(lines.next_line().await.as_deref(), Some("echo hi"));
    }

    #[test]
    fn test_empty_input_ends_immediately() {
        tokio_test::block_on(async {
            let gate = SubmissionGate::new();
            let mut lines = LineReader::spawn(BufReader::new(&b""[..]), gate.clone());
            assert_eq!(lines.next_line().await, None);
            assert_eq!(lines.dropped(), 0);
            assert!(!gate.is_busy());
        });
    }
}
