//! Integration tests for the amishell binary

use std::io::Write;
use std::process::Stdio;

use amishell::console::mock::{MockConsole, Script};
use tokio::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_amishell");

fn amishell() -> Command {
    let mut command = Command::new(BIN);
    command
        .env_remove("RUST_LOG")
        .env("AMISHELL_LOG_LEVEL", "warn")
        .arg("--config-file")
        .arg("does-not-exist.toml")
        .stdin(Stdio::null());
    command
}

/// Test that the help command works
#[tokio::test]
async fn test_help_command() {
    let output = amishell()
        .arg("--help")
        .output()
        .await
        .expect("Failed to execute help command");

    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: amishell"), "Should show usage");
    assert!(stdout.contains("--activate"), "Should show activate flag");
    assert!(stdout.contains("--emulator"), "Should show emulator flag");
    assert!(stdout.contains("--port"), "Should show port flag");
    assert!(stdout.contains("--timeout"), "Should show timeout flag");
    assert!(stdout.contains("shell mode"), "Should explain shell mode");
}

/// Test that the version command works
#[tokio::test]
async fn test_version_command() {
    let output = amishell()
        .arg("--version")
        .output()
        .await
        .expect("Failed to execute version command");

    assert!(output.status.success(), "Version command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("amishell"), "Should show binary name");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "Should show version number"
    );
}

/// Test that an unknown option is rejected before anything is sent
#[tokio::test]
async fn test_unknown_option() {
    let console = MockConsole::start(vec![Script::shell_reply("dir", "C\n", "1.SYS:> ")])
        .await
        .unwrap();
    let port = console.target().port.to_string();

    for bad in [&["--bogus"][..], &["--timout", "100", "dir"][..]] {
        let output = amishell()
            .args(["-p", &port, "--host", "127.0.0.1"])
            .args(bad)
            .output()
            .await
            .expect("Failed to execute amishell");

        assert_eq!(output.status.code(), Some(2), "{:?} should be a usage error", bad);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("unexpected argument"), "{}", stderr);
    }

    assert_eq!(console.accepted_connections().await, 0);
    assert!(console.commands().await.is_empty());
}

/// Test that a one-shot command prints only the command's output
#[tokio::test]
async fn test_one_shot_command() {
    let console = MockConsole::start(vec![Script::shell_reply(
        "list sys:",
        "C (dir)\nS (dir)\n",
        "1.SYS:> ",
    )])
    .await
    .unwrap();

    let output = amishell()
        .args(["-p", &console.target().port.to_string(), "--host", "127.0.0.1"])
        .args(["list", "sys:"])
        .output()
        .await
        .expect("Failed to execute one-shot command");

    assert!(output.status.success(), "One-shot command should succeed");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "C (dir)\nS (dir)\n");
    assert_eq!(console.commands().await, vec!["list sys:".to_string()]);
}

/// Test that an unreachable console exits non-zero
#[tokio::test]
async fn test_connection_failure_exit_code() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let output = amishell()
        .args(["-p", &port.to_string(), "--host", "127.0.0.1", "-t", "100", "dir"])
        .output()
        .await
        .expect("Failed to execute amishell");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[Communication with Amiga emulator failed]"));
}

/// Test that end of input in shell mode exits cleanly
#[tokio::test]
async fn test_shell_mode_exits_on_eof() {
    let console = MockConsole::start(vec![Script::shell_reply("cd", "SYS:\n", "1.SYS:> ")])
        .await
        .unwrap();

    let output = amishell()
        .args(["-p", &console.target().port.to_string(), "--host", "127.0.0.1"])
        .output()
        .await
        .expect("Failed to execute amishell");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("SYS:> "));
    assert!(stdout.contains("[Terminated by user]"));
}

/// Test that an unusable config file still honours the environment
#[tokio::test]
async fn test_invalid_config_keeps_env_overrides() {
    let console = MockConsole::start(vec![Script::shell_reply("dir", "C\nS\n", "1.SYS:> ")])
        .await
        .unwrap();
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(config_file, "[console]\ntimeout_ms = 0").unwrap();

    let output = Command::new(BIN)
        .env_remove("RUST_LOG")
        .env("AMISHELL_LOG_LEVEL", "warn")
        .env("AMISHELL_HOST", "127.0.0.1")
        .env("AMISHELL_PORT", console.target().port.to_string())
        .arg("--config-file")
        .arg(config_file.path())
        .arg("dir")
        .stdin(Stdio::null())
        .output()
        .await
        .expect("Failed to execute amishell");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "C\nS\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config"), "{}", stderr);
    assert_eq!(console.commands().await, vec!["dir".to_string()]);
}
