//! Native text-to-speech fallback.

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Platform speech synthesis used when generated audio cannot be played.
pub trait SpeechSynthesis: Send + Sync {
    /// Starts speaking `text`, replacing any utterance in progress.
    ///
    /// # Errors
    /// Returns an error for empty text or when the synthesizer cannot start.
    fn speak(&self, text: &str) -> Result<()>;

    /// Silences the current utterance, if any.
    fn cancel(&self);
}

/// Speaks through an external command such as macOS `say` or `espeak`.
///
/// The text is passed as the final argument. The child process is kept so a
/// later [`SpeechSynthesis::cancel`] can kill it.
pub struct NativeSpeech {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl NativeSpeech {
    /// Creates a synthesizer from a command line like `"espeak -s 160"`.
    ///
    /// # Errors
    /// Returns an error when `command_line` is blank.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .context("Native speech command is empty")?;
        Ok(Self {
            program,
            args: parts.collect(),
            child: Mutex::new(None),
        })
    }

    /// Returns the platform default speech command.
    pub fn default_command() -> &'static str {
        if cfg!(target_os = "macos") {
            "say"
        } else {
            "espeak"
        }
    }

    /// Returns `true` while the last spawned utterance is still running.
    pub fn is_speaking(&self) -> bool {
        let mut guard = self.child.lock().unwrap();
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Blocks until the current utterance ends.
    ///
    /// # Errors
    /// Returns an error if waiting on the child process fails.
    pub fn wait(&self) -> Result<()> {
        let child = self.child.lock().unwrap().take();
        if let Some(mut child) = child {
            child.wait().context("Failed to wait for speech command")?;
        }
        Ok(())
    }

    fn spawn(&self, text: &str) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start speech command `{}`", self.program))
    }
}

impl SpeechSynthesis for NativeSpeech {
    fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            anyhow::bail!("Cannot speak empty text");
        }
        self.cancel();
        let child = self.spawn(text)?;
        debug!(program = %self.program, pid = child.id(), "native speech started");
        *self.child.lock().unwrap() = Some(child);
        Ok(())
    }

    fn cancel(&self) {
        if let Some(mut child) = self.child.lock().unwrap().take() {
            if matches!(child.try_wait(), Ok(None)) {
                if let Err(err) = child.kill() {
                    warn!("Failed to cancel native speech: {}", err);
                }
            }
            let _ = child.wait();
        }
    }
}

impl Drop for NativeSpeech {
    fn drop(&mut self) {
        self.cancel();
    }
}
