//! Remote shell command execution.

use log::{debug, info};
use std::borrow::Cow;

use crate::error::EngineError;
use crate::model::{CommandOptions, CommandResult};
use crate::transport::{ExecChannel, Session};

/// Wrap `command` so the remote shell receives it as one quoted argument.
///
/// `ls -la /tmp` becomes `bash -ic 'ls -la /tmp'`.
pub fn wrap_command(command: &str, options: &CommandOptions) -> String {
    let flags = if options.interactive { "-ic" } else { "-c" };
    let quoted = shell_escape::unix::escape(Cow::Borrowed(command));
    format!("{} {} {}", options.shell, flags, quoted)
}

/// Exit code reported for a command killed by `signal`: 128 plus the signal
/// number, as shells report it, or -1 for a name not listed in RFC 4254.
pub(crate) fn signal_exit_code(signal: &str) -> i32 {
    let number = match signal {
        "HUP" => 1,
        "INT" => 2,
        "QUIT" => 3,
        "ILL" => 4,
        "ABRT" => 6,
        "FPE" => 8,
        "KILL" => 9,
        "USR1" => 10,
        "SEGV" => 11,
        "USR2" => 12,
        "PIPE" => 13,
        "ALRM" => 14,
        "TERM" => 15,
        _ => return -1,
    };
    128 + number
}

/// Run a shell command on the remote host and collect its result.
///
/// Blocks until the command exits. A non-zero exit status is reported in
/// `CommandResult::exit_code`, not as an error, and so is a command killed
/// by a signal (see `signal_exit_code`). Output that is not valid UTF-8 is
/// decoded lossily.
///
/// # Errors
/// `CommandChannelError` if the exec channel cannot be opened or fails while
/// the command runs.
pub fn run_shell_command<S: Session>(
    session: &S,
    command: &str,
    options: &CommandOptions,
) -> Result<CommandResult, EngineError> {
    let channel_error = |source| EngineError::CommandChannelError {
        command: command.to_string(),
        source,
    };

    let wrapped = wrap_command(command, options);
    debug!("Executing remote command: {}", wrapped);

    let mut channel = session.open_exec_channel().map_err(channel_error)?;
    if options.pty {
        channel.request_pty().map_err(channel_error)?;
    }
    let output = channel.execute(&wrapped).map_err(channel_error)?;

    let exit_code = match output.signal.as_deref() {
        Some(signal) => {
            info!("Remote command killed by SIG{}", signal);
            signal_exit_code(signal)
        }
        None => {
            info!("Remote command exited with status {}", output.exit_code);
            output.exit_code
        }
    };

    Ok(CommandResult {
        exit_code,
        signal: output.signal,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
