//! Exchange tests against a scripted console

use std::time::Duration;

use amishell::console::mock::{MockConsole, Script};
use amishell::console::{Command, ConsoleError, Session, Target};
use anyhow::Result;
use tokio::time::Instant;

#[tokio::test]
async fn test_dir_scenario_engages_fast_path() -> Result<()> {
    let console =
        MockConsole::start(vec![Script::shell_reply("dir", "file1\nfile2\n", "1.SYS:> ")]).await?;
    let mut session = Session::new(console.target());

    let start = Instant::now();
    let mut output = Vec::new();
    let result = session
        .execute_command(&Command::new("dir", 3000)?, &mut output)
        .await?;

    assert_eq!(result.text, "file1\nfile2\n");
    assert!(result.sentinel_seen);
    assert!(result.prompt_seen);
    assert_eq!(output, b"file1\nfile2\n");
    assert!(
        start.elapsed() < Duration::from_millis(2000),
        "prompt should cut the 3s idle wait short"
    );

    Ok(())
}

#[tokio::test]
async fn test_sentinel_and_trailer_never_reach_output() -> Result<()> {
    let script = Script::new()
        .read_command()
        .send("echo hi\r")
        .pause(20)
        .send("hi\n")
        .sentinel()
        .send("\r1.SYS:> ")
        .send("stray text after the prompt\n");
    let console = MockConsole::start(vec![script]).await?;
    let mut session = Session::new(console.target());

    let mut output = Vec::new();
    let result = session
        .execute_command(&Command::new("echo hi", 1000)?, &mut output)
        .await?;

    assert_eq!(result.text, "hi\n");
    assert!(!result.text.contains('\u{0f}'));
    assert_eq!(output, b"hi\n");

    Ok(())
}

#[tokio::test]
async fn test_silent_remote_resolves_after_timeout() -> Result<()> {
    let console = MockConsole::start(vec![Script::silent()]).await?;
    let mut session = Session::new(console.target());

    let start = Instant::now();
    let mut output = Vec::new();
    let result = session
        .execute_command(&Command::new("dir", 500)?, &mut output)
        .await?;
    let elapsed = start.elapsed();

    assert_eq!(result.text, "");
    assert!(!result.sentinel_seen);
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(2500));
    assert!(console.wait_closed(1, Duration::from_secs(1)).await);

    Ok(())
}

#[tokio::test]
async fn test_sentinel_without_prompt_waits_full_timeout() -> Result<()> {
    let script = Script::new()
        .read_command()
        .send("dir\r")
        .pause(20)
        .send("file1\n")
        .sentinel();
    let console = MockConsole::start(vec![script]).await?;
    let mut session = Session::new(console.target());

    let start = Instant::now();
    let mut output = Vec::new();
    let result = session
        .execute_command(&Command::new("dir", 400)?, &mut output)
        .await?;

    assert_eq!(result.text, "file1\n");
    assert!(result.sentinel_seen);
    assert!(!result.prompt_seen);
    assert!(start.elapsed() >= Duration::from_millis(400));

    Ok(())
}

#[tokio::test]
async fn test_each_command_uses_a_fresh_connection() -> Result<()> {
    let console = MockConsole::start(vec![
        Script::shell_reply("cd", "SYS:\n", "1.SYS:> "),
        Script::shell_reply("cd", "SYS:\n", "1.SYS:> "),
        Script::shell_reply("cd", "SYS:\n", "1.SYS:> "),
    ])
    .await?;
    let mut session = Session::new(console.target());

    for _ in 0..3 {
        let mut output = Vec::new();
        session
            .execute_command(&Command::new("cd", 1000)?.quiet(true), &mut output)
            .await?;
        assert!(output.is_empty());
    }

    assert_eq!(console.accepted_connections().await, 3);
    assert!(console.wait_closed(3, Duration::from_secs(1)).await);
    assert_eq!(session.stats().exchanges, 3);
    assert_eq!(session.stats().content_bytes, 3 * "SYS:\n".len() as u64);

    Ok(())
}

#[tokio::test]
async fn test_connection_refused_is_reported() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let mut session = Session::new(Target::new("127.0.0.1", port));
    let mut output = Vec::new();
    let err = session
        .execute_command(&Command::new("dir", 500)?, &mut output)
        .await
        .unwrap_err();

    assert!(matches!(err, ConsoleError::Connect { .. }));
    assert!(output.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_streamed_chunks_arrive_before_completion() -> Result<()> {
    let script = Script::new()
        .read_command()
        .send("list\r")
        .pause(20)
        .send("first\n")
        .pause(200)
        .send("second\n");
    let console = MockConsole::start(vec![script]).await?;
    let mut session = Session::new(console.target());

    let mut exchange = session.execute(&Command::new("list", 1000)?).await?;
    let start = Instant::now();
    let first = exchange.next_chunk().await?;
    assert_eq!(first.as_deref(), Some("first\n"));
    assert_eq!(exchange.text(), "first\n");
    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(!exchange.is_complete());

    let result = exchange.finish().await?;
    assert_eq!(result.text, "first\nsecond\n");

    Ok(())
}

#[tokio::test]
async fn test_reset_mid_exchange_is_an_error() -> Result<()> {
    let script = Script::new()
        .read_command()
        .send("list\r")
        .pause(20)
        .send("partial\n")
        .pause(20)
        .reset();
    let console = MockConsole::start(vec![script]).await?;
    let mut session = Session::new(console.target());

    let mut output = Vec::new();
    let err = session
        .execute_command(&Command::new("list", 1000)?, &mut output)
        .await
        .unwrap_err();

    assert!(matches!(err, ConsoleError::ConnectionLost(_)));
    assert!(err.is_connection_error());
    assert_eq!(session.stats().exchanges, 0);

    Ok(())
}
