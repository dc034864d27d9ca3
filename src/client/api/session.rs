extern crate reqwest;
extern crate serde;

use super::{
    error::{Error, Kind, Result},
    retry::async_retry,
};
use crate::{
    config::session::VERBOSE,
    types::{AbstractProblem, Credentials, Profile, Submission, Testcase, Verdict},
};
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};

const USER_AGENT: &str = concat!("oj-client/", env!("CARGO_PKG_VERSION"));

/// Explicit session value: the only holder of the HTTP client and the auth
/// token. Signing in or out is a pure transition producing a new `Session`,
/// never a mutation of shared state.
#[derive(Clone)]
pub struct Session {
    client: Client,
    base: String,
    token: Option<String>,
}

/// Every judge response is wrapped in `{"data": ..., "error": ...}`;
/// anything else is a protocol violation.
#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TokenData {
    token: String,
}
#[derive(Deserialize)]
struct StatementData {
    html: String,
}
#[derive(Deserialize)]
struct TestcaseData {
    name: String,
    input_b64: String,
    correct_b64: String,
}
#[derive(Deserialize)]
struct SubmitData {
    submission_id: String,
}
#[derive(Deserialize)]
struct SubmissionData {
    submission_id: String,
    problem_id: String,
    compiler_id: String,
    #[serde(default)]
    verdict: Option<String>,
    submitted_at: String,
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        let summary = body.lines().next().unwrap_or_default().to_string();
        return Err(Error::from_status(status, summary));
    }
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| Error::protocol(format!("bad envelope: {}", e)))?;
    if let Some(message) = envelope.error {
        return Err(Error::new(Kind::Input, message));
    }
    envelope
        .data
        .ok_or_else(|| Error::protocol("envelope carries neither data nor error"))
}

impl Session {
    pub fn new(base: &str) -> Self {
        Session {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .cookie_store(true)
                .connection_verbose(VERBOSE)
                .build()
                .unwrap(),
            base: base.trim_end_matches('/').to_string(),
            token: None,
        }
    }
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(Error::network)?;
        let status = response.status();
        let body = response.text().await.map_err(Error::network)?;
        decode_body(status, &body)
    }
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        async_retry(|| Self::send(self.authed(self.client.get(&url)))).await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let url = self.url("/auth/login");
        let data: TokenData = async_retry(|| {
            Self::send(self.client.post(&url).json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            })))
        })
        .await?;
        Ok(Session {
            client: self.client.clone(),
            base: self.base.clone(),
            token: Some(data.token),
        })
    }
    pub async fn logout(&self) -> Result<Session> {
        if self.is_authenticated() {
            let url = self.url("/auth/logout");
            let _: serde_json::Value =
                async_retry(|| Self::send(self.authed(self.client.post(&url)))).await?;
        }
        Ok(Session {
            client: self.client.clone(),
            base: self.base.clone(),
            token: None,
        })
    }

    pub async fn get_profile(&self) -> Result<Profile> {
        self.get_json("/profile").await
    }
    pub async fn get_abstract_problem(&self, problem_nm: &str) -> Result<AbstractProblem> {
        self.get_json(&format!("/problems/{}", problem_nm)).await
    }
    pub async fn get_statement(&self, problem_id: &str) -> Result<String> {
        let data: StatementData = self
            .get_json(&format!("/problems/{}/statement", problem_id))
            .await?;
        Ok(data.html)
    }
    pub async fn get_testcases(&self, problem_id: &str) -> Result<Vec<Testcase>> {
        let raw: Vec<TestcaseData> = self
            .get_json(&format!("/problems/{}/testcases", problem_id))
            .await?;
        raw.into_iter()
            .map(|case| {
                Ok(Testcase {
                    input: base64::decode(case.input_b64.as_bytes()).map_err(|e| {
                        Error::protocol(format!("testcase {} input: {}", case.name, e))
                    })?,
                    expected: base64::decode(case.correct_b64.as_bytes()).map_err(|e| {
                        Error::protocol(format!("testcase {} output: {}", case.name, e))
                    })?,
                    name: case.name,
                })
            })
            .collect()
    }

    pub async fn submit(
        &self,
        problem_id: &str,
        compiler_id: &str,
        file_name: &str,
        source: Vec<u8>,
    ) -> Result<String> {
        let url = self.url("/submissions");
        let data: SubmitData = async_retry(|| {
            let form = multipart::Form::new()
                .text("problem_id", problem_id.to_string())
                .text("compiler_id", compiler_id.to_string())
                .part(
                    "source",
                    multipart::Part::bytes(source.clone()).file_name(file_name.to_string()),
                );
            Self::send(self.authed(self.client.post(&url)).multipart(form))
        })
        .await?;
        Ok(data.submission_id)
    }
    pub async fn get_submission(&self, submission_id: &str) -> Result<Submission> {
        let data: SubmissionData = self
            .get_json(&format!("/submissions/{}", submission_id))
            .await?;
        let verdict = match data.verdict {
            None => Verdict::Pending,
            Some(code) => Verdict::from_code(&code)
                .ok_or_else(|| Error::protocol(format!("unknown verdict code {:?}", code)))?,
        };
        Ok(Submission {
            submission_id: data.submission_id,
            problem_id: data.problem_id,
            compiler_id: data.compiler_id,
            verdict,
            submitted_at: data.submitted_at,
        })
    }
}
