//! Command execution with an injected environment.

use std::collections::HashMap;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Command is empty")]
    EmptyCommand,

    #[error("Could not parse command line: {0}")]
    Parse(String),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Split a command line into argv using POSIX shell quoting rules.
pub fn parse_command(raw: &str) -> Result<Vec<String>, RunnerError> {
    let argv = shlex::split(raw)
        .ok_or_else(|| RunnerError::Parse("unbalanced quotes or trailing escape".to_string()))?;
    if argv.is_empty() {
        return Err(RunnerError::EmptyCommand);
    }
    Ok(argv)
}

/// Run `argv` to completion with `injected_env` layered over the ambient
/// environment. Stdio is inherited.
///
/// Returns the child's exit code, or 1 when it was terminated by a signal.
pub async fn run_with_env(
    argv: &[String],
    injected_env: &HashMap<String, String>,
) -> Result<i32, RunnerError> {
    let (program, args) = argv.split_first().ok_or(RunnerError::EmptyCommand)?;

    tracing::debug!(program = %program, args = args.len(), "Spawning command");

    let status = Command::new(program)
        .args(args)
        .envs(injected_env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

    match status.code() {
        Some(code) => Ok(code),
        None => {
            tracing::warn!(
                program = %program,
                status = %status,
                "Command terminated without exit code"
            );
            Ok(1)
        }
    }
}
