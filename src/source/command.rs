use std::process::Stdio;

use color_eyre::eyre::{OptionExt, WrapErr, eyre};
use log::*;
use tokio::process::Command;

/// Build a command from a shell-style command line.
pub fn build_command(command_line: &str) -> color_eyre::Result<Command> {
    let strings = shlex::split(command_line).ok_or(eyre!("Bad command string"))?;
    let program = strings.first().ok_or_eyre("Empty command string")?;
    let mut c = Command::new(program);
    c.args(strings.iter().skip(1));
    // Keep number and time formats stable regardless of the user's locale.
    c.env("LANG", "en_US.UTF-8");
    c.stdin(Stdio::null());
    c.stdout(Stdio::piped());
    c.stderr(Stdio::piped());
    c.kill_on_drop(true);
    Ok(c)
}

/// Run a command line to completion and return its stdout.
///
/// A non-zero exit status or non-UTF-8 output is an error.
pub async fn run_command(command_line: &str) -> color_eyre::Result<String> {
    let mut cmd = build_command(command_line)?;
    trace!(target: "Source", "Running {:?}", cmd);
    let output = cmd
        .output()
        .await
        .wrap_err_with(|| format!("Failed to run {:?}", command_line))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(eyre!(
            "{:?} exited with {}: {}",
            command_line,
            output.status,
            stderr.trim()
        ));
    }
    String::from_utf8(output.stdout).wrap_err_with(|| format!("{:?} produced non-UTF-8 output", command_line))
}
