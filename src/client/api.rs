pub mod error;
mod retry;
pub mod session;

pub use error::{Error, Kind, Result};
pub use session::Session;

use crate::types::Submission;
use async_trait::async_trait;

/// The slice of the judge service the submission lifecycle depends on:
/// upload a solution, observe a submission by id.
#[async_trait]
pub trait Remote: Send + Sync {
    async fn upload(
        &self,
        problem_id: &str,
        compiler_id: &str,
        file_name: &str,
        source: Vec<u8>,
    ) -> Result<String>;
    async fn submission(&self, submission_id: &str) -> Result<Submission>;
}

#[async_trait]
impl Remote for Session {
    async fn upload(
        &self,
        problem_id: &str,
        compiler_id: &str,
        file_name: &str,
        source: Vec<u8>,
    ) -> Result<String> {
        self.submit(problem_id, compiler_id, file_name, source).await
    }
    async fn submission(&self, submission_id: &str) -> Result<Submission> {
        self.get_submission(submission_id).await
    }
}
