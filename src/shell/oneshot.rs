//! One-shot mode: run a single command and exit

use tokio::io::AsyncWrite;
use tracing::{debug, info};

use crate::config::Config;
use crate::console::{Command, ConsoleError, ExchangeResult, Session};

/// Run `command_line` once, streaming its output to `output`
pub async fn run_command<W>(
    session: &mut Session,
    config: &Config,
    command_line: &str,
    output: &mut W,
) -> Result<ExchangeResult, ConsoleError>
where
    W: AsyncWrite + Unpin,
{
    let command = Command::new(command_line, config.console.timeout_ms)?
        .activate(config.activation.activate);

    info!("Running {:?} on {}", command_line, session.target());
    let result = session.execute_command(&command, output).await?;
    debug!("Command finished: {:?}", session.stats());
    Ok(result)
}
