//! Shell front ends
//!
//! The interactive loop and the one-shot runner, both built on a console
//! [`Session`] configured from [`Config`].

pub mod input;
pub mod interactive;
pub mod oneshot;

use std::time::Duration;

use crate::activation::WindowActivator;
use crate::config::Config;
use crate::console::{Session, Target};

pub use input::{LineReader, SubmissionGate};
pub use interactive::{InteractiveShell, ShellSettings, Submission};
pub use oneshot::run_command;

/// Build a console session from configuration
pub fn build_session(config: &Config) -> Session {
    let target = Target::new(config.console.host.clone(), config.console.port);
    let activator = WindowActivator::new(
        config.activation.emulator,
        config.activation.script_dir.clone(),
    );

    Session::new(target)
        .with_activator(activator)
        .with_settle_delay(Duration::from_millis(config.activation.settle_ms))
        .with_fast_path(Duration::from_millis(config.console.fast_path_ms))
}
