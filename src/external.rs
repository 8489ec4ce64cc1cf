//! External command integration
//!
//! The rewrite and publish collaborators can be plugged in as shell
//! commands. Input goes in on stdin, the result comes back on stdout, and
//! the exit status says what kind of failure happened.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Exit status meaning "bad content" (EX_DATAERR)
pub const EXIT_BAD_CONTENT: i32 = 65;
/// Exit status meaning "rate limited, try later" (EX_TEMPFAIL)
pub const EXIT_RATE_LIMITED: i32 = 75;
/// Exit status meaning "credentials rejected" (EX_NOPERM)
pub const EXIT_UNAUTHORIZED: i32 = 77;

/// How a command run ended
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Exit 0 with trimmed stdout
    Success(String),
    /// Non-zero exit with its code (if any) and trimmed stderr
    Failed { code: Option<i32>, stderr: String },
}

/// Run `command` through `sh -c`, feeding `input` on stdin.
///
/// Stdin is written from its own thread while stdout and stderr drain, so
/// large input and output cannot fill both pipes at once.
pub fn run_command(command: &str, input: &str, env: &[(&str, &str)]) -> io::Result<CommandOutcome> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdin = child.stdin.take();
    let output = thread::scope(|scope| -> io::Result<_> {
        let writer = stdin.map(|mut stdin| {
            scope.spawn(move || match stdin.write_all(input.as_bytes()) {
                // A command that ignores its input may exit before reading it
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            })
        });
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            writer
                .join()
                .map_err(|_| io::Error::other("stdin writer panicked"))??;
        }
        Ok(output)
    })?;
    if output.status.success() {
        Ok(CommandOutcome::Success(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    } else {
        Ok(CommandOutcome::Failed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
