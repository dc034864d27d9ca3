extern crate termcolor;

use crate::{
    read::{read_line, read_source, read_usize},
    write::write_result,
};
use oj_client::{
    api::Session,
    cache::Cache,
    notify::Notifier,
    submit::{Lifecycle, SubmissionStatus},
    types::{CustomTestcase, Problem, Submission, Testcase},
    verify::{Report, Status, Verifier},
};
use std::{io::Write, sync::Arc};
use termcolor::{Color, ColorChoice, StandardStream, WriteColor};

/// The "UI collaborator": renders core progress callbacks onto the
/// terminal. Owns its own stream because notifications arrive while the
/// command loop holds the main one.
struct CliNotifier;
impl Notifier for CliNotifier {
    #[allow(unused_must_use)]
    fn testcase_update(&self, index: usize, status: Status, output: &[u8]) {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        match status {
            Status::Running => write_progress!(&mut stdout, "Running", "testcase {}", index + 1),
            Status::Passed => write_ok!(&mut stdout, "Passed", "testcase {}", index + 1),
            Status::Failed => write_error!(
                &mut stdout,
                "Failed",
                "testcase {} ({} bytes of output)",
                index + 1,
                output.len()
            ),
        }
        stdout.reset();
    }
    #[allow(unused_must_use)]
    fn submission_update(&self, status: &SubmissionStatus) {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        match status {
            SubmissionStatus::Verifying => {
                write_progress!(&mut stdout, "Submit", "verifying against local testcases")
            }
            SubmissionStatus::Uploading => {
                write_progress!(&mut stdout, "Submit", "uploading solution")
            }
            SubmissionStatus::Polling { submission_id } => {
                write_progress!(&mut stdout, "Submit", "waiting for verdict of {}", submission_id)
            }
            SubmissionStatus::Done { verdict } => {
                write_info!(&mut stdout, "Verdict", "{}", verdict)
            }
        }
        stdout.reset();
    }
}

#[allow(unused_must_use)]
async fn ensure_testcases(
    stdout: &mut StandardStream,
    session: &Session,
    cache: &Cache,
    problem: &mut Problem,
) -> bool {
    if problem.testcases.is_some() {
        return true;
    }
    let fetch_session = session.clone();
    let problem_id = problem.problem_id.clone();
    let lookup = cache.get::<Vec<Testcase>, _, _>(
        &format!("getTestcases({})", problem.problem_id),
        move || async move { fetch_session.get_testcases(&problem_id).await },
    );
    match lookup.value().await {
        Ok(testcases) => {
            write_info!(stdout, "Info", "Loaded {} testcases", testcases.len());
            problem.testcases = Some(testcases);
            true
        }
        Err(e) => {
            write_error!(stdout, "Error", "testcases: {}", e);
            false
        }
    }
}

#[allow(unused_must_use)]
fn print_report(stdout: &mut StandardStream, report: &Report) {
    for diagnostic in &report.compile {
        write_error!(stdout, "Compile", "{}", diagnostic);
    }
    for outcome in &report.outcomes {
        for diagnostic in &outcome.diagnostics {
            write_info!(stdout, "Detail", "{}: {}", outcome.name, diagnostic);
        }
    }
    let passed = report
        .outcomes
        .iter()
        .filter(|o| o.status == Status::Passed)
        .count();
    if report.accepted() {
        write_ok!(
            stdout,
            "Success",
            "{}/{} testcases passed",
            passed,
            report.outcomes.len()
        );
    } else {
        write_error!(
            stdout,
            "Fail",
            "{}/{} testcases passed",
            passed,
            report.outcomes.len()
        );
    }
}

#[allow(unused_must_use)]
async fn list_testcases(
    stdout: &mut StandardStream,
    session: &Session,
    cache: &Cache,
    problem: &mut Problem,
) {
    if !ensure_testcases(stdout, session, cache, problem).await {
        return;
    }
    for (index, testcase) in problem.testcases.as_deref().unwrap_or(&[]).iter().enumerate() {
        write_info!(
            stdout,
            "Testcase",
            "{}: {} ({} bytes in, {} bytes out)",
            index,
            testcase.name,
            testcase.input.len(),
            testcase.expected.len()
        );
    }
}

async fn run_all(
    stdout: &mut StandardStream,
    session: &Session,
    cache: &Cache,
    problem: &mut Problem,
) {
    let source = read_source(stdout, b"Source file: ");
    if !ensure_testcases(stdout, session, cache, problem).await {
        return;
    }
    let verifier = Verifier::new(Arc::new(CliNotifier));
    let report = verifier.run_all(problem, &source).await;
    print_report(stdout, &report);
}

#[allow(unused_must_use)]
async fn run_one(
    stdout: &mut StandardStream,
    session: &Session,
    cache: &Cache,
    problem: &mut Problem,
) {
    let source = read_source(stdout, b"Source file: ");
    if !ensure_testcases(stdout, session, cache, problem).await {
        return;
    }
    let count = problem.testcases.as_deref().unwrap_or(&[]).len();
    if count == 0 {
        write_error!(stdout, "Error", "Problem has no testcases");
        return;
    }
    let index = read_usize(stdout, b"Testcase: ", 0, count);
    let verifier = Verifier::new(Arc::new(CliNotifier));
    let report = verifier.run_one(problem, &source, index).await;
    print_report(stdout, &report);
}

#[allow(unused_must_use)]
async fn run_custom(stdout: &mut StandardStream, problem: &Problem) {
    let source = read_source(stdout, b"Source file: ");
    let input = read_source(stdout, b"Input file: ");
    let testcase = match CustomTestcase::from_file(&input) {
        Ok(v) => v,
        Err(e) => {
            write_error!(stdout, "Error", "Error open {}: {}", input.display(), e);
            return;
        }
    };
    let verifier = Verifier::new(Arc::new(CliNotifier));
    match verifier.run_custom(problem, &source, &testcase).await {
        Ok(output) => {
            write_ok!(stdout, "Output", "{} bytes", output.len());
            stdout.write(&output);
            stdout.flush();
        }
        Err(diagnostics) => {
            for diagnostic in diagnostics {
                write_error!(stdout, "Failed", "{}", diagnostic);
            }
        }
    }
}

#[allow(unused_must_use)]
async fn statement(
    stdout: &mut StandardStream,
    session: &Session,
    cache: &Cache,
    problem: &Problem,
) {
    let target = read_line(stdout, b"Write statement to: ");
    let fetch_session = session.clone();
    let problem_id = problem.problem_id.clone();
    let lookup = cache.get::<String, _, _>(
        &format!("getStatement({})", problem.problem_id),
        move || async move { fetch_session.get_statement(&problem_id).await },
    );
    match lookup.value().await {
        Ok(html) => write_result(stdout, std::fs::write(&target, html), "Statement written"),
        Err(e) => write_error!(stdout, "Error", "{}", e),
    }
}

#[allow(unused_must_use)]
async fn submit(
    stdout: &mut StandardStream,
    session: &Session,
    cache: &Cache,
    problem: &mut Problem,
) {
    let source = read_source(stdout, b"Source file: ");
    let compiler_id = read_line(stdout, b"Compiler id: ");
    if !ensure_testcases(stdout, session, cache, problem).await {
        return;
    }
    let notifier: Arc<dyn Notifier> = Arc::new(CliNotifier);
    let lifecycle = Lifecycle::new(
        session.clone(),
        cache.clone(),
        Verifier::new(notifier.clone()),
        notifier,
    );
    match lifecycle.submit(problem, &source, &compiler_id).await {
        Ok(verdict) => write_ok!(stdout, "Verdict", "{}", verdict),
        Err(e) => write_error!(stdout, "Error", "{}", e),
    }
}

#[allow(unused_must_use)]
async fn status(stdout: &mut StandardStream, session: &Session, cache: &Cache) {
    let submission_id = read_line(stdout, b"Submission id: ");
    let fetch_session = session.clone();
    let id = submission_id.clone();
    let lookup = cache.get::<Submission, _, _>(
        &format!("getSubmission({})", submission_id),
        move || async move { fetch_session.get_submission(&id).await },
    );
    match lookup.refreshed().await {
        Ok(submission) => write_info!(
            stdout,
            "Status",
            "{} -> {}",
            submission.submission_id,
            submission.verdict
        ),
        Err(e) => write_error!(stdout, "Error", "{}", e),
    }
}

#[allow(unused_must_use)]
pub async fn problem_loop(
    stdout: &mut StandardStream,
    session: &Session,
    cache: &Cache,
    mut problem: Problem,
) {
    write_info!(stdout, "Info", "Selected problem {}", problem);
    stdout.reset();
    let prompt = format!("oj-client [{}]> ", problem.problem_id);
    loop {
        match read_line(stdout, prompt.as_bytes()).trim() {
            "testcases" => list_testcases(stdout, session, cache, &mut problem).await,
            "run" => run_all(stdout, session, cache, &mut problem).await,
            "run_one" => run_one(stdout, session, cache, &mut problem).await,
            "custom" => run_custom(stdout, &problem).await,
            "statement" => statement(stdout, session, cache, &problem).await,
            "submit" => submit(stdout, session, cache, &mut problem).await,
            "status" => status(stdout, session, cache).await,
            "unselect" => {
                write_info!(stdout, "Info", "Unselected problem");
                break;
            }
            unknown => write_error!(stdout, "Error", r#"problem: unknown command "{}""#, unknown),
        }
        stdout.reset();
    }
    stdout.reset();
}
