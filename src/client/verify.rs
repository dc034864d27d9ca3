extern crate log;
extern crate tempfile;
extern crate tokio;

use crate::{
    config,
    diagnostic::{Classifier, Diagnostic, Kind, Phase},
    lang::{self, Language},
    notify::Notifier,
    runner,
    types::{CustomTestcase, Problem, Testcase},
};
use log::debug;
use std::{fmt, path::Path, sync::Arc, time::Duration};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Passed,
    Failed,
}
impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Running => "running",
            Status::Passed => "passed",
            Status::Failed => "failed",
        })
    }
}

#[derive(Debug)]
pub struct TestcaseOutcome {
    pub index: usize,
    pub name: String,
    pub status: Status,
    pub output: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The full pass/fail matrix of one verification run. `compile` holds the
/// diagnostics that prevented any testcase from running: compile errors, an
/// unresolvable language, or an execution contract without a local
/// equivalent.
#[derive(Debug)]
pub struct Report {
    pub compile: Vec<Diagnostic>,
    pub outcomes: Vec<TestcaseOutcome>,
}
impl Report {
    pub fn accepted(&self) -> bool {
        self.compile.is_empty() && self.outcomes.iter().all(|o| o.status == Status::Passed)
    }
    fn aborted(compile: Vec<Diagnostic>) -> Self {
        Report {
            compile,
            outcomes: Vec::new(),
        }
    }
}

struct Prepared {
    dir: TempDir,
    language: Language,
    main: String,
}

/// Runs a solution against a problem's testcases, sequentially and in
/// stored order, emitting `Running -> Passed|Failed` per testcase through
/// the notifier. Execution failures become `Failed` outcomes with
/// diagnostics; they never escape as errors.
pub struct Verifier {
    languages: Vec<Language>,
    notifier: Arc<dyn Notifier>,
    time_limit: Duration,
    compile_time_limit: Duration,
    classifier: Classifier,
}

impl Verifier {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Verifier {
            languages: lang::LANGUAGES.to_vec(),
            notifier,
            time_limit: config::runner::TIME_LIMIT,
            compile_time_limit: config::runner::COMPILE_TIME_LIMIT,
            classifier: Classifier::new(),
        }
    }
    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub async fn run_all(&self, problem: &Problem, source: &Path) -> Report {
        let prepared = match self.prepare(problem, source).await {
            Ok(prepared) => prepared,
            Err(diagnostics) => return Report::aborted(diagnostics),
        };
        let empty = Vec::new();
        let testcases = problem.testcases.as_ref().unwrap_or(&empty);
        let mut outcomes = Vec::with_capacity(testcases.len());
        for (index, testcase) in testcases.iter().enumerate() {
            // keep going on failures so the caller sees the full matrix
            outcomes.push(self.run_prepared(&prepared, index, testcase).await);
        }
        Report {
            compile: Vec::new(),
            outcomes,
        }
    }

    pub async fn run_one(&self, problem: &Problem, source: &Path, index: usize) -> Report {
        let prepared = match self.prepare(problem, source).await {
            Ok(prepared) => prepared,
            Err(diagnostics) => return Report::aborted(diagnostics),
        };
        let empty = Vec::new();
        let testcases = problem.testcases.as_ref().unwrap_or(&empty);
        let outcomes = match testcases.get(index) {
            Some(testcase) => vec![self.run_prepared(&prepared, index, testcase).await],
            None => Vec::new(),
        };
        Report {
            compile: Vec::new(),
            outcomes,
        }
    }

    /// Runs a locally-sourced input with no expected output; `Ok` carries
    /// the program's stdout, `Err` the diagnostics of a failed run.
    pub async fn run_custom(
        &self,
        problem: &Problem,
        source: &Path,
        custom: &CustomTestcase,
    ) -> Result<Vec<u8>, Vec<Diagnostic>> {
        let prepared = self.prepare(problem, source).await?;
        let (program, args) = prepared
            .language
            .run_command(prepared.dir.path(), &prepared.main);
        match runner::run(&program, &args, &custom.input, self.time_limit).await {
            Ok(result) => {
                let diagnostics = self.classifier.classify(&result, Phase::Run);
                if result.success() {
                    Ok(result.stdout)
                } else {
                    Err(diagnostics)
                }
            }
            Err(e) => Err(vec![Diagnostic::file_level(Kind::Runtime, e.to_string())]),
        }
    }

    async fn prepare(&self, problem: &Problem, source: &Path) -> Result<Prepared, Vec<Diagnostic>> {
        if let Some(handler) = &problem.handler {
            if !handler.supports_local_run() {
                return Err(vec![Diagnostic::file_level(
                    Kind::Unsupported,
                    format!(
                        "local testcase running is not supported for {:?} problems",
                        handler.handler
                    ),
                )]);
            }
        }
        let language = match lang::resolve(&self.languages, source, problem.handler.as_ref()) {
            Some(language) => *language,
            None => {
                return Err(vec![Diagnostic::file_level(
                    Kind::Unsupported,
                    format!("no language adapter for {}", source.display()),
                )])
            }
        };
        let dir = TempDir::new().map_err(|e| {
            vec![Diagnostic::file_level(
                Kind::Runtime,
                format!("cannot create working directory: {}", e),
            )]
        })?;
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(language.extensions[0]);
        let main = format!("main.{}", extension);
        tokio::fs::copy(source, dir.path().join(&main))
            .await
            .map_err(|e| {
                vec![Diagnostic::file_level(
                    Kind::Runtime,
                    format!("cannot stage {}: {}", source.display(), e),
                )]
            })?;
        if let Some((program, args)) = language.compile_command(dir.path(), &main) {
            debug!("building {} as {}", source.display(), language.name);
            match runner::run(&program, &args, b"", self.compile_time_limit).await {
                Ok(result) => {
                    let diagnostics = self.classifier.classify(&result, Phase::Compile);
                    if !diagnostics.is_empty() {
                        return Err(diagnostics);
                    }
                }
                Err(e) => {
                    return Err(vec![Diagnostic::file_level(Kind::Compile, e.to_string())])
                }
            }
        }
        Ok(Prepared {
            dir,
            language,
            main,
        })
    }

    async fn run_prepared(
        &self,
        prepared: &Prepared,
        index: usize,
        testcase: &Testcase,
    ) -> TestcaseOutcome {
        self.notifier.testcase_update(index, Status::Running, &[]);
        let (program, args) = prepared
            .language
            .run_command(prepared.dir.path(), &prepared.main);
        let (status, output, diagnostics) =
            match runner::run(&program, &args, &testcase.input, self.time_limit).await {
                Ok(result) => {
                    let diagnostics = self.classifier.classify(&result, Phase::Run);
                    // byte-exact comparison decides; a timed-out run never passes
                    let passed = result.exit != crate::runner::ExitKind::TimedOut
                        && result.stdout == testcase.expected;
                    (
                        if passed { Status::Passed } else { Status::Failed },
                        result.stdout,
                        diagnostics,
                    )
                }
                Err(e) => (
                    Status::Failed,
                    Vec::new(),
                    vec![Diagnostic::file_level(Kind::Runtime, e.to_string())],
                ),
            };
        self.notifier.testcase_update(index, status, &output);
        TestcaseOutcome {
            index,
            name: testcase.name.clone(),
            status,
            output,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{submit::SubmissionStatus, types::Handler};
    use std::sync::Mutex;

    struct Recording {
        events: Mutex<Vec<(usize, Status)>>,
    }
    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Recording {
                events: Mutex::new(Vec::new()),
            })
        }
    }
    impl Notifier for Recording {
        fn testcase_update(&self, index: usize, status: Status, _output: &[u8]) {
            self.events.lock().unwrap().push((index, status));
        }
        fn submission_update(&self, _status: &SubmissionStatus) {}
    }

    fn testcase(name: &str, input: &[u8], expected: &[u8]) -> Testcase {
        Testcase {
            name: name.to_string(),
            input: input.to_vec(),
            expected: expected.to_vec(),
        }
    }

    fn problem(testcases: Vec<Testcase>) -> Problem {
        Problem {
            problem_nm: String::from("P10000"),
            problem_id: String::from("P10000_en"),
            title: String::from("Sum of two"),
            handler: Some(Handler {
                handler: String::from("std"),
                source_modifier: String::from("main"),
                compilers: vec![String::from("Bash")],
            }),
            testcases: Some(testcases),
            statement: None,
        }
    }

    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("solution.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    const SUM: &str = "read a b\necho $((a+b))\n";

    #[tokio::test]
    async fn sum_with_newline_passes() {
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), SUM);
        let verifier = Verifier::new(Arc::new(()));
        let report = verifier
            .run_all(&problem(vec![testcase("s1", b"1 2\n", b"3\n")]), &source)
            .await;
        assert!(report.compile.is_empty());
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].status, Status::Passed);
        assert!(report.accepted());
    }

    #[tokio::test]
    async fn comparison_is_byte_exact() {
        // expected output lacks the trailing newline the program prints
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), SUM);
        let verifier = Verifier::new(Arc::new(()));
        let report = verifier
            .run_all(&problem(vec![testcase("s1", b"1 2\n", b"3")]), &source)
            .await;
        assert_eq!(report.outcomes[0].status, Status::Failed);
        assert_eq!(report.outcomes[0].output, b"3\n");
        assert!(!report.accepted());
    }

    #[tokio::test]
    async fn failures_do_not_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), SUM);
        let verifier = Verifier::new(Arc::new(()));
        let report = verifier
            .run_all(
                &problem(vec![
                    testcase("s1", b"1 2\n", b"wrong"),
                    testcase("s2", b"2 3\n", b"5\n"),
                ]),
                &source,
            )
            .await;
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, Status::Failed);
        assert_eq!(report.outcomes[1].status, Status::Passed);
        assert!(!report.accepted());
    }

    #[tokio::test]
    async fn compile_failure_aborts_every_testcase() {
        const BROKEN: Language = Language {
            name: "Broken",
            extensions: &["zz"],
            compilers: &[],
            compile: Some("sh -c false"),
            run: "sh {main}",
        };
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("solution.zz");
        std::fs::write(&source, "whatever").unwrap();
        let recording = Recording::new();
        let verifier =
            Verifier::new(recording.clone()).with_languages(vec![BROKEN]);
        let report = verifier
            .run_all(&problem(vec![testcase("s1", b"", b"")]), &source)
            .await;
        assert_eq!(report.compile.len(), 1);
        assert_eq!(report.compile[0].kind, Kind::Compile);
        assert!(report.outcomes.is_empty());
        assert!(!report.accepted());
        // no testcase was ever started
        assert!(recording.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unfamiliar_handler_hard_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), SUM);
        let mut graphic = problem(vec![testcase("s1", b"", b"")]);
        graphic.handler = Some(Handler {
            handler: String::from("graphic"),
            source_modifier: String::from("main"),
            compilers: vec![String::from("Bash")],
        });
        let verifier = Verifier::new(Arc::new(()));
        let report = verifier.run_all(&graphic, &source).await;
        assert_eq!(report.compile.len(), 1);
        assert_eq!(report.compile[0].kind, Kind::Unsupported);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn timeout_is_a_failure_with_one_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), "sleep 30\n");
        let verifier = Verifier::new(Arc::new(())).with_time_limit(Duration::from_millis(200));
        let report = verifier
            .run_all(&problem(vec![testcase("s1", b"", b"")]), &source)
            .await;
        assert_eq!(report.outcomes[0].status, Status::Failed);
        let timeouts: Vec<_> = report.outcomes[0]
            .diagnostics
            .iter()
            .filter(|d| d.kind == Kind::Timeout)
            .collect();
        assert_eq!(timeouts.len(), 1);
    }

    #[tokio::test]
    async fn progress_is_monotonic_per_testcase() {
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), SUM);
        let recording = Recording::new();
        let verifier = Verifier::new(recording.clone());
        verifier
            .run_all(
                &problem(vec![
                    testcase("s1", b"1 2\n", b"3\n"),
                    testcase("s2", b"1 2\n", b"4\n"),
                ]),
                &source,
            )
            .await;
        let events = recording.events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[
                (0, Status::Running),
                (0, Status::Passed),
                (1, Status::Running),
                (1, Status::Failed),
            ]
        );
    }

    #[tokio::test]
    async fn run_one_targets_a_single_testcase() {
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), SUM);
        let verifier = Verifier::new(Arc::new(()));
        let report = verifier
            .run_one(
                &problem(vec![
                    testcase("s1", b"1 2\n", b"3\n"),
                    testcase("s2", b"4 5\n", b"9\n"),
                ]),
                &source,
                1,
            )
            .await;
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].index, 1);
        assert_eq!(report.outcomes[0].status, Status::Passed);
    }

    #[tokio::test]
    async fn custom_testcase_returns_raw_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = script(dir.path(), SUM);
        let verifier = Verifier::new(Arc::new(()));
        let output = verifier
            .run_custom(
                &problem(Vec::new()),
                &source,
                &CustomTestcase {
                    name: String::from("mine"),
                    input: b"20 22\n".to_vec(),
                },
            )
            .await
            .unwrap();
        assert_eq!(output, b"42\n");
    }
}
