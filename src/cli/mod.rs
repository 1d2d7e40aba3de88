//! Command Line Interface module
//!
//! Implements argument parsing for amishell.

use clap::Parser;

use crate::activation::Emulator;
use crate::config::Config;

#[derive(Parser, Debug, Clone)]
#[command(name = "amishell")]
#[command(about = "Executes commands in a running Amiga emulator.")]
#[command(
    long_about = "Executes commands in a running Amiga emulator through its serial port.\n\nSpecify no <COMMAND> to enter shell mode."
)]
#[command(version)]
pub struct Cli {
    /// Activate (send to front) the emulator window
    #[arg(short, long)]
    pub activate: bool,

    /// Emulator in use
    #[arg(short, long, value_enum)]
    pub emulator: Option<Emulator>,

    /// Port used by the emulator for serial communication [default: 1234]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host running the emulator [default: localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// Timeout in milliseconds [default: 500]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Configuration file path
    #[arg(long, default_value = "amishell.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Command to execute; the words are joined with spaces
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// One-shot command, if one was given
    pub fn command_line(&self) -> Option<String> {
        if self.command.is_empty() {
            None
        } else {
            Some(self.command.join(" "))
        }
    }

    /// Check if we're running in interactive mode
    pub fn is_interactive_mode(&self) -> bool {
        self.command.is_empty()
    }

    /// Adjust log level based on verbose flag
    pub fn effective_log_level(&self, config: &Config) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.log.level.clone())
        }
    }

    /// Layer flags given on the command line over the loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.console.port = port;
        }
        if let Some(host) = &self.host {
            config.console.host = host.clone();
        }
        if let Some(timeout) = self.timeout {
            config.console.timeout_ms = timeout;
        }
        if let Some(emulator) = self.emulator {
            config.activation.emulator = emulator;
        }
        if self.activate {
            config.activation.activate = true;
        }
    }
}
