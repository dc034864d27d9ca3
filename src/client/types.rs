extern crate serde;

use serde::{Deserialize, Serialize};
use std::{fmt, io, path::Path};

/// Testcase payloads travel base64-encoded; byte fields keep that form on
/// the wire and in the persisted cache while being plain bytes in memory.
pub(crate) mod b64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64::encode(bytes))
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(de)?;
        base64::decode(text.as_bytes()).map_err(de::Error::custom)
    }
}

/// Execution contract of a problem: I/O shape plus the compilers the judge
/// accepts for it. Only the "std" kind has a local run contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Handler {
    pub handler: String,
    pub source_modifier: String,
    pub compilers: Vec<String>,
}
impl Handler {
    pub fn supports_local_run(&self) -> bool {
        self.handler == "std"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub problem_nm: String,
    pub problem_id: String,
    pub title: String,
    #[serde(default)]
    pub handler: Option<Handler>,
    #[serde(default)]
    pub testcases: Option<Vec<Testcase>>,
    #[serde(default)]
    pub statement: Option<String>,
}
impl PartialEq for Problem {
    fn eq(&self, other: &Self) -> bool {
        self.problem_id == other.problem_id
    }
}
impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.problem_id, self.title)
    }
}

/// Judge-side grouping of language-specific variants under one problem_nm.
/// Variant ids follow the `<problem_nm>_<language>` convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbstractProblem {
    pub problem_nm: String,
    pub problems: Vec<Problem>,
}
impl AbstractProblem {
    pub fn variant(&self, language: &str) -> Option<&Problem> {
        let wanted = format!("{}_{}", self.problem_nm, language);
        self.problems.iter().find(|p| p.problem_id == wanted)
    }
    /// Explicit fallback: the preferred variant if present, else the first
    /// one the judge lists.
    pub fn variant_or_first(&self, language: &str) -> Option<&Problem> {
        self.variant(language).or_else(|| self.problems.first())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Testcase {
    pub name: String,
    #[serde(with = "b64")]
    pub input: Vec<u8>,
    #[serde(with = "b64")]
    pub expected: Vec<u8>,
}

/// Same shape as a judge testcase minus the expected output; sourced from a
/// local file instead of the remote service.
#[derive(Debug, Clone)]
pub struct CustomTestcase {
    pub name: String,
    pub input: Vec<u8>,
}
impl CustomTestcase {
    pub fn from_file(path: &Path) -> io::Result<Self> {
        Ok(CustomTestcase {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| String::from("custom")),
            input: std::fs::read(path)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompileError,
    RuntimeError,
    InternalError,
}
impl Verdict {
    /// Pending is the only non-terminal state; a submission's verdict never
    /// reverts to it.
    pub fn is_terminal(self) -> bool {
        self != Verdict::Pending
    }
    pub fn from_code(code: &str) -> Option<Verdict> {
        Some(match code {
            "PND" => Verdict::Pending,
            "AC" => Verdict::Accepted,
            "WA" => Verdict::WrongAnswer,
            "TLE" => Verdict::TimeLimitExceeded,
            "CE" => Verdict::CompileError,
            "RE" => Verdict::RuntimeError,
            "IE" => Verdict::InternalError,
            _ => return None,
        })
    }
}
impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Pending => "pending",
            Verdict::Accepted => "accepted",
            Verdict::WrongAnswer => "wrong answer",
            Verdict::TimeLimitExceeded => "time limit exceeded",
            Verdict::CompileError => "compile error",
            Verdict::RuntimeError => "runtime error",
            Verdict::InternalError => "internal judge error",
        })
    }
}

/// Remote-owned record: created on upload, mutated only by the polling
/// loop, never deleted client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub submission_id: String,
    pub problem_id: String,
    pub compiler_id: String,
    pub verdict: Verdict,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}
