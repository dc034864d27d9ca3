extern crate libc;
extern crate tokio;

use std::{
    error::Error as StdError, fmt, io, process::Stdio, result::Result as StdResult, time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, Command},
    time::{timeout, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Code(i32),
    Signal(i32),
    TimedOut,
}

/// What the child did. Nonzero exits, signals and stderr content are data
/// for the layers above; only a failure to launch or capture is an error.
#[derive(Debug)]
pub struct ProcessResult {
    pub exit: ExitKind,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}
impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit == ExitKind::Code(0)
    }
}

#[derive(Debug)]
pub struct Error {
    program: String,
    kind: Kind,
}
#[derive(Debug)]
enum Kind {
    Spawn(io::Error),
    Capture(io::Error),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Spawn(e) => write!(f, "failed to launch {}: {}", self.program, e),
            Kind::Capture(e) => write!(f, "failed to collect output of {}: {}", self.program, e),
        }
    }
}
impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            Kind::Spawn(e) | Kind::Capture(e) => Some(e),
        }
    }
}
impl Error {
    fn spawn(program: &str, source: io::Error) -> Self {
        Error {
            program: program.to_string(),
            kind: Kind::Spawn(source),
        }
    }
    fn capture(program: &str, source: io::Error) -> Self {
        Error {
            program: program.to_string(),
            kind: Kind::Capture(source),
        }
    }
}

pub type Result<T> = StdResult<T, Error>;

fn status_kind(status: std::process::ExitStatus) -> ExitKind {
    match status.code() {
        Some(code) => ExitKind::Code(code),
        #[cfg(unix)]
        None => {
            use std::os::unix::process::ExitStatusExt;
            ExitKind::Signal(status.signal().unwrap_or(0))
        }
        #[cfg(not(unix))]
        None => ExitKind::Code(-1),
    }
}

/// The child is its own process group leader, so a timeout takes the whole
/// tree down, not just the immediate child.
async fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
    }
    let _ = child.kill().await;
}

/// Runs `program` with `input` on stdin, captures stdout/stderr in full
/// (byte-for-byte, non-UTF8 included) and enforces the wall-clock limit.
pub async fn run(
    program: &str,
    args: &[String],
    input: &[u8],
    time_limit: Duration,
) -> Result<ProcessResult> {
    let start = Instant::now();
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    let mut child = command.spawn().map_err(|e| Error::spawn(program, e))?;

    let mut stdin = child.stdin.take().unwrap();
    let input = input.to_vec();
    let feeder = tokio::spawn(async move {
        // the child may exit without draining its input; a broken pipe here
        // is not a failure
        let _ = stdin.write_all(&input).await;
        let _ = stdin.shutdown().await;
    });
    let mut stdout_pipe = child.stdout.take().unwrap();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let mut stderr_pipe = child.stderr.take().unwrap();
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let exit = match timeout(time_limit, child.wait()).await {
        Ok(Ok(status)) => status_kind(status),
        Ok(Err(e)) => return Err(Error::capture(program, e)),
        Err(_) => {
            kill_group(&mut child).await;
            ExitKind::TimedOut
        }
    };
    let _ = feeder.await;
    let stdout = stdout_task
        .await
        .map_err(|e| Error::capture(program, io::Error::new(io::ErrorKind::Other, e)))?
        .map_err(|e| Error::capture(program, e))?;
    let stderr = stderr_task
        .await
        .map_err(|e| Error::capture(program, io::Error::new(io::ErrorKind::Other, e)))?
        .map_err(|e| Error::capture(program, e))?;
    Ok(ProcessResult {
        exit,
        stdout,
        stderr,
        duration: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> (&'static str, Vec<String>) {
        ("sh", vec![String::from("-c"), script.to_string()])
    }
    const SECOND: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn captures_streams_and_exit_code() {
        let (program, args) = sh("printf out; printf err >&2; exit 3");
        let result = run(program, &args, b"", SECOND).await.unwrap();
        assert_eq!(result.exit, ExitKind::Code(3));
        assert_eq!(result.stdout, b"out");
        assert_eq!(result.stderr, b"err");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn stdin_is_fed_and_closed() {
        let result = run("cat", &[], b"1 2", SECOND).await.unwrap();
        assert_eq!(result.exit, ExitKind::Code(0));
        assert_eq!(result.stdout, b"1 2");
    }

    #[tokio::test]
    async fn empty_input_and_output_are_valid() {
        let result = run("cat", &[], b"", SECOND).await.unwrap();
        assert!(result.success());
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn binary_output_is_preserved() {
        let (program, args) = sh(r"printf '\377\000\n'");
        let result = run(program, &args, b"", SECOND).await.unwrap();
        assert_eq!(result.stdout, [0xff, 0x00, b'\n']);
    }

    #[tokio::test]
    async fn killed_by_signal_is_classified() {
        let (program, args) = sh("kill -KILL $$");
        let result = run(program, &args, b"", SECOND).await.unwrap();
        assert_eq!(result.exit, ExitKind::Signal(libc::SIGKILL));
    }

    #[tokio::test]
    async fn wall_clock_limit_kills_the_tree() {
        let (program, args) = sh("sleep 30");
        let start = std::time::Instant::now();
        let result = run(program, &args, b"", Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(result.exit, ExitKind::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_binary_is_a_distinct_error() {
        let err = run("/no/such/binary", &[], b"", SECOND).await.unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }
}
