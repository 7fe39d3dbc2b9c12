//! Running external programs with a timeout.

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Run `command` to completion, killing it after `timeout`.
///
/// Stdin and stdout are discarded; stderr is captured for the error
/// message. A non-zero exit, a spawn failure or a timeout is
/// [`Error::Process`].
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(program = %program, args = ?command.get_args().collect::<Vec<_>>(), "spawning");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Process {
            program: program.clone(),
            message: format!("failed to spawn: {}", e),
        })?;

    match child.wait_timeout(timeout)? {
        Some(status) => {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                // Best effort; the exit status is what matters.
                let _ = pipe.read_to_string(&mut stderr);
            }
            if status.success() {
                Ok(())
            } else {
                let code = status.code().unwrap_or(-1);
                Err(Error::Process {
                    program,
                    message: format!("exit code {}: {}", code, stderr.trim()),
                })
            }
        }
        None => {
            warn!(program = %program, ?timeout, "timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::Process {
                program,
                message: format!("timed out after {}s", timeout.as_secs()),
            })
        }
    }
}

/// Whether `program` can be spawned at all.
pub fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .and_then(|mut child| {
            match child.wait_timeout(Duration::from_secs(5))? {
                Some(_) => {}
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
            Ok(())
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program() {
        let err = run_with_timeout(
            &mut Command::new("reportdeck-no-such-program"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Process { ref program, .. } if program == "reportdeck-no-such-program"));
        assert!(!is_available("reportdeck-no-such-program"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_and_timeout() {
        assert!(run_with_timeout(&mut Command::new("true"), Duration::from_secs(5)).is_ok());

        let err = run_with_timeout(
            Command::new("sh").args(["-c", "echo boom >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exit code 3: boom"), "{}", err);

        let err = run_with_timeout(
            Command::new("sleep").arg("5"),
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
