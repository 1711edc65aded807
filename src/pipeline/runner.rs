//! Subprocess execution with streamed output.

use super::CommandSpec;
use crate::error::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Stream a relayed line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Child standard output.
    Stdout,
    /// Child standard error.
    Stderr,
}

/// Run a command to completion, handing each output line to `on_line`.
///
/// Lines are delivered in arrival order on the calling thread. Invalid UTF-8
/// is replaced. A non-zero exit status, or termination by a signal, is an
/// error.
pub fn run_streaming<F>(spec: &CommandSpec, mut on_line: F) -> Result<()>
where
    F: FnMut(OutputStream, &str),
{
    debug!("Spawning: {spec}");

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::ProcessSpawn {
            program: spec.program_name(),
            source: e,
        })?;

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, OutputStream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, OutputStream::Stderr, tx.clone()));
    }
    drop(tx);

    for (stream, line) in rx {
        on_line(stream, &line);
    }
    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait()?;
    debug!("{} exited with {status}", spec.program_name());

    if status.success() {
        Ok(())
    } else {
        Err(Error::NonZeroExit {
            program: spec.program_name(),
            code: status.code(),
        })
    }
}

fn spawn_reader<R>(
    source: R,
    stream: OutputStream,
    tx: Sender<(OutputStream, String)>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_streams_stdout_and_stderr() {
        let mut lines = Vec::new();
        run_streaming(&sh("echo one; echo two >&2; echo three"), |stream, line| {
            lines.push((stream, line.to_string()));
        })
        .unwrap();

        let stdout = lines
            .iter()
            .filter(|(s, _)| *s == OutputStream::Stdout)
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>();
        assert_eq!(stdout, ["one", "three"]);
        assert!(lines.contains(&(OutputStream::Stderr, "two".to_string())));
    }

    #[test]
    fn test_non_zero_exit_is_error() {
        let result = run_streaming(&sh("echo failing; exit 3"), |_, _| {});
        assert!(matches!(
            result,
            Err(Error::NonZeroExit { code: Some(3), .. })
        ));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let spec = CommandSpec::new("/nonexistent/mimosa-script");
        let result = run_streaming(&spec, |_, _| {});
        assert!(matches!(result, Err(Error::ProcessSpawn { .. })));
    }

    #[test]
    fn test_env_is_passed() {
        let mut spec = sh("echo \"$MIMOSA_TEST_VALUE\"");
        spec.env
            .insert("MIMOSA_TEST_VALUE".to_string(), "lesion".to_string());

        let mut out = Vec::new();
        run_streaming(&spec, |_, line| out.push(line.to_string())).unwrap();
        assert_eq!(out, ["lesion"]);
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut out = Vec::new();
        run_streaming(&sh("printf 'a\\nb'"), |_, line| out.push(line.to_string())).unwrap();
        assert_eq!(out, ["a", "b"]);
    }
}
