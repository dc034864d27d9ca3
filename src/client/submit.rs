extern crate log;
extern crate tokio;

use crate::{
    api::{self, Remote},
    cache::{Cache, Lookup},
    cancel::CancelToken,
    config,
    notify::Notifier,
    types::{Problem, Submission, Verdict},
    verify::{Status, Verifier},
};
use log::{debug, warn};
use std::{
    error::Error as StdError, fmt, io, path::Path, result::Result as StdResult, sync::Arc,
    time::Duration,
};
use tokio::time::{sleep_until, Instant};

/// Progress of one submission attempt as reported to the notifier. `Done`
/// is delivered exactly once per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Verifying,
    Uploading,
    Polling { submission_id: String },
    Done { verdict: Verdict },
}

/// The single user-visible reason an attempt aborted. No attempt is ever
/// dropped silently.
#[derive(Debug)]
pub enum Error {
    Verification { failed: usize, compile: bool },
    Read(io::Error),
    Upload(api::Error),
    Poll(api::Error),
    Cancelled,
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Verification { compile: true, .. } => {
                f.write_str("testcases failed: the solution does not compile")
            }
            Error::Verification { failed, .. } => {
                write!(f, "testcases failed: {} testcase(s) rejected the solution", failed)
            }
            Error::Read(e) => write!(f, "cannot read source file: {}", e),
            Error::Upload(e) => write!(f, "upload failed: {}", e),
            Error::Poll(e) => write!(f, "verdict tracking aborted: {}", e),
            Error::Cancelled => f.write_str("submission attempt cancelled"),
        }
    }
}
impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Read(e) => Some(e),
            Error::Upload(e) | Error::Poll(e) => Some(e),
            Error::Verification { .. } | Error::Cancelled => None,
        }
    }
}

pub type Result<T> = StdResult<T, Error>;

/// One submission attempt: verify locally, upload, poll until the verdict
/// is terminal. Attempts for the same problem are not coalesced; callers
/// serialize if they want to.
pub struct Lifecycle<R> {
    remote: Arc<R>,
    cache: Cache,
    verifier: Verifier,
    notifier: Arc<dyn Notifier>,
    cancel: CancelToken,
    poll_delay: Duration,
}

impl<R: Remote + Send + Sync + 'static> Lifecycle<R> {
    pub fn new(remote: R, cache: Cache, verifier: Verifier, notifier: Arc<dyn Notifier>) -> Self {
        Lifecycle {
            remote: Arc::new(remote),
            cache,
            verifier,
            notifier,
            cancel: CancelToken::new(),
            poll_delay: config::submission::POLL_DELAY,
        }
    }
    pub fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = poll_delay;
        self
    }
    /// Cancelling stops future poll ticks; it does not abort an in-flight
    /// network call.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn submit(
        &self,
        problem: &Problem,
        source: &Path,
        compiler_id: &str,
    ) -> Result<Verdict> {
        self.notifier.submission_update(&SubmissionStatus::Verifying);
        let report = self.verifier.run_all(problem, source).await;
        if !report.accepted() {
            // nothing was sent to the judge
            let failed = report
                .outcomes
                .iter()
                .filter(|o| o.status != Status::Passed)
                .count();
            return Err(Error::Verification {
                failed,
                compile: !report.compile.is_empty(),
            });
        }
        self.notifier.submission_update(&SubmissionStatus::Uploading);
        let bytes = tokio::fs::read(source).await.map_err(Error::Read)?;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("main"));
        let submission_id = self
            .remote
            .upload(&problem.problem_id, compiler_id, &file_name, bytes)
            .await
            .map_err(Error::Upload)?;
        debug!("submission {} uploaded, polling for verdict", submission_id);
        self.notifier.submission_update(&SubmissionStatus::Polling {
            submission_id: submission_id.clone(),
        });
        self.poll(&submission_id).await
    }

    async fn poll(&self, submission_id: &str) -> Result<Verdict> {
        let key = format!("getSubmission({})", submission_id);
        let mut next = Instant::now();
        loop {
            tokio::select! {
                _ = sleep_until(next) => {}
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            }
            next += self.poll_delay;
            let remote = self.remote.clone();
            let id = submission_id.to_string();
            let lookup: Lookup<Submission> = self
                .cache
                .get(&key, move || async move { remote.submission(&id).await });
            match lookup.refreshed().await {
                Ok(submission) => {
                    if submission.verdict.is_terminal() {
                        self.notifier.submission_update(&SubmissionStatus::Done {
                            verdict: submission.verdict,
                        });
                        return Ok(submission.verdict);
                    }
                    debug!("submission {} still pending", submission_id);
                }
                Err(e) if e.kind() == api::Kind::Unauthorized => return Err(Error::Poll(e)),
                // each tick is independent; the next one retries
                Err(e) => warn!("verdict poll failed, retrying next tick: {}", e),
            }
        }
    }
}
