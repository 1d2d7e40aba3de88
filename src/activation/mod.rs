//! Emulator window activation with platform-specific backends.
//!
//! Linux/macOS: `scripts/activate.sh fs-uae`.
//! Windows: `cscript //nologo scripts\activate.vbs <executables>`.
//! Other platforms: no-op.
//!
//! Activation is fire-and-forget. The script runs on its own thread and a
//! failure is logged, never reported back to the exchange that asked for it.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Emulator hosting the Amiga shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Emulator {
    /// FS-UAE
    #[value(name = "fsuae")]
    FsUae,
    /// WinUAE
    #[value(name = "winuae")]
    WinUae,
}

impl Emulator {
    /// Process names the activation script looks for
    pub fn process_names(&self) -> &'static [&'static str] {
        const FS_UAE: &[&str] = &["fs-uae"];
        const FS_UAE_WINDOWS: &[&str] = &["fs-uae.exe"];
        const WINUAE_WINDOWS: &[&str] = &["winuae.exe", "winuae64.exe"];

        if cfg!(target_os = "windows") {
            match self {
                Emulator::FsUae => FS_UAE_WINDOWS,
                Emulator::WinUae => WINUAE_WINDOWS,
            }
        } else {
            // Only FS-UAE runs outside Windows.
            FS_UAE
        }
    }

    /// Parse the identifiers accepted on the command line and in the environment
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fsuae" | "fs-uae" => Some(Emulator::FsUae),
            "winuae" => Some(Emulator::WinUae),
            _ => None,
        }
    }
}

impl Default for Emulator {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Emulator::WinUae
        } else {
            Emulator::FsUae
        }
    }
}

impl fmt::Display for Emulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emulator::FsUae => write!(f, "fsuae"),
            Emulator::WinUae => write!(f, "winuae"),
        }
    }
}

/// Directory the activation scripts ship in, relative to the executable
pub fn default_script_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("..").join("scripts"))
}

/// Program and arguments that bring the emulator window to the front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationScript {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ActivationScript {
    /// Build the platform's activation invocation, if the platform has one
    pub fn for_platform(emulator: Emulator, script_dir: &Path) -> Option<Self> {
        let names = emulator.process_names().iter().map(|n| n.to_string());

        if cfg!(any(target_os = "linux", target_os = "macos")) {
            Some(Self {
                program: script_dir.join("activate.sh"),
                args: names.collect(),
            })
        } else if cfg!(target_os = "windows") {
            let mut args = vec![
                "//nologo".to_string(),
                script_dir.join("activate.vbs").display().to_string(),
            ];
            args.extend(names);
            Some(Self {
                program: PathBuf::from("cscript"),
                args,
            })
        } else {
            None
        }
    }
}

/// Lightweight wrapper around the platform activation backend.
#[derive(Debug, Clone)]
pub struct WindowActivator {
    backend: ActivationBackend,
}

impl WindowActivator {
    /// Activator for `emulator`, with scripts looked up in `script_dir`
    pub fn new(emulator: Emulator, script_dir: Option<PathBuf>) -> Self {
        let backend = script_dir
            .or_else(default_script_dir)
            .and_then(|dir| ActivationScript::for_platform(emulator, &dir))
            .map(ActivationBackend::Script)
            .unwrap_or(ActivationBackend::Noop);

        Self { backend }
    }

    /// Activator that does nothing, for sessions that never raise a window
    pub fn noop() -> Self {
        Self {
            backend: ActivationBackend::Noop,
        }
    }

    /// Invocation this activator would run
    pub fn script(&self) -> Option<&ActivationScript> {
        match &self.backend {
            ActivationBackend::Script(script) => Some(script),
            ActivationBackend::Noop => None,
        }
    }

    /// Fire-and-forget activation. Failures are logged but do not bubble up.
    pub fn activate(&self) {
        match &self.backend {
            ActivationBackend::Script(script) => {
                let script = script.clone();
                std::thread::spawn(move || {
                    if let Err(err) = run_activation_script(&script) {
                        tracing::warn!(?err, "Failed to activate emulator window");
                    }
                });
            }
            ActivationBackend::Noop => {
                tracing::debug!("Window activation is not supported on this platform");
            }
        }
    }
}

#[derive(Debug, Clone)]
enum ActivationBackend {
    Script(ActivationScript),
    Noop,
}

fn run_activation_script(script: &ActivationScript) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::process::{Command, Stdio};

    tracing::debug!(
        program = %script.program.display(),
        args = ?script.args,
        "Activating emulator window"
    );

    let output = Command::new(&script.program)
        .args(&script.args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to run {}", script.program.display()))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} exited with status {:?}: {}",
            script.program.display(),
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
