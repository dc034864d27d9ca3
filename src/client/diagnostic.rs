extern crate regex;

use crate::runner::{ExitKind, ProcessResult};
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Compile,
    Runtime,
    Timeout,
    Signal,
    /// Synthesized by the verifier for problems whose execution contract
    /// has no local equivalent; never produced by the classifier itself.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: Kind,
    /// 1-based source line; 0 means file level.
    pub line: u32,
    pub message: String,
}
impl Diagnostic {
    pub fn file_level<T: Into<String>>(kind: Kind, message: T) -> Self {
        Diagnostic {
            kind,
            line: 0,
            message: message.into(),
        }
    }
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// Turns a process result into diagnostics. Source locations are mined from
/// stderr with the `<path>:<line>[:<col>]: <message>` shape common to
/// compiler and interpreter output.
pub struct Classifier {
    location: Regex,
}

impl Classifier {
    pub fn new() -> Self {
        Classifier {
            location: Regex::new(r"^([^:\s][^:]*):(\d+)(?::(\d+))?:\s*(.+)$").unwrap(),
        }
    }

    pub fn classify(&self, result: &ProcessResult, phase: Phase) -> Vec<Diagnostic> {
        let kind = match phase {
            Phase::Compile => Kind::Compile,
            Phase::Run => Kind::Runtime,
        };
        match result.exit {
            ExitKind::TimedOut => vec![Diagnostic::file_level(
                Kind::Timeout,
                format!(
                    "wall-clock limit exceeded after {:.1}s",
                    result.duration.as_secs_f64()
                ),
            )],
            ExitKind::Signal(signal) => vec![Diagnostic::file_level(
                Kind::Signal,
                format!("process terminated by signal {}", signal),
            )],
            ExitKind::Code(0) => Vec::new(),
            ExitKind::Code(code) => {
                let stderr = String::from_utf8_lossy(&result.stderr);
                let mut out = Vec::new();
                for line in stderr.lines() {
                    if let Some(cap) = self.location.captures(line) {
                        out.push(Diagnostic {
                            kind,
                            line: cap[2].parse().unwrap_or(0),
                            message: cap[4].to_string(),
                        });
                    }
                }
                if out.is_empty() {
                    // nothing located: attribute the whole failure at file level
                    let message = match stderr.lines().find(|l| !l.trim().is_empty()) {
                        Some(first) => format!("exited with code {}: {}", code, first.trim()),
                        None => format!("exited with code {}", code),
                    };
                    out.push(Diagnostic::file_level(kind, message));
                }
                out
            }
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
