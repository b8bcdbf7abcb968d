/// Replaying a captured payload through the host's HCI tooling
use std::process::Command;

use log::{debug, info};

use crate::capture::store::CaptureStore;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("no captured packet at index {index} (store holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("packet #{index} has no replay command")]
    NoCommand { index: usize },
    #[error("replay command is empty")]
    EmptyCommand,
    #[error("command exited with {status}: {diagnostics}")]
    ExecutionFailed { status: String, diagnostics: String },
    #[error("failed to launch {program}: {cause}")]
    LaunchError {
        program: String,
        #[source]
        cause: std::io::Error,
    },
}

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Process layer that runs replay commands to completion
pub trait ProcessRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<ProcessOutput>;
}

/// Runs commands on the host with `std::process::Command`
///
/// Blocks until the child exits. No timeout is applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<ProcessOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Re-issue the command stored for packet `index`
///
/// The command string is split on whitespace into program and arguments and
/// handed to `runner`. This drives real radio hardware.
///
/// # Arguments
/// * `store` - Session capture store
/// * `index` - Zero-based position of the packet in the store
/// * `runner` - Process layer executing the command
///
/// # Returns
/// Ok if the command exited with status 0, otherwise the failure reason
pub fn replay<R: ProcessRunner>(
    store: &CaptureStore,
    index: usize,
    runner: &R,
) -> Result<(), ReplayError> {
    let packet = store.get(index).ok_or(ReplayError::IndexOutOfRange {
        index,
        len: store.len(),
    })?;
    let command = packet
        .command
        .as_deref()
        .ok_or(ReplayError::NoCommand { index })?;

    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or(ReplayError::EmptyCommand)?;
    let args: Vec<&str> = parts.collect();

    info!(
        "Replaying packet #{}: {} ({})",
        index + 1,
        packet.name,
        packet.address
    );
    info!("Executing: {}", command);

    let output = runner
        .run(program, &args)
        .map_err(|cause| ReplayError::LaunchError {
            program: program.to_string(),
            cause,
        })?;

    if output.success {
        debug!("Replay output: {}", output.stdout.trim());
        return Ok(());
    }

    let status = match output.code {
        Some(code) => format!("exit code {}", code),
        None => "signal".to_string(),
    };
    let diagnostics = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };

    Err(ReplayError::ExecutionFailed {
        status,
        diagnostics,
    })
}
