use oj_client::{
    types::{Handler, Problem, Testcase},
    verify::{Status, Verifier},
};
use std::sync::Arc;

fn testcase(name: &str, input: &[u8], expected: &[u8]) -> Testcase {
    Testcase {
        name: name.to_string(),
        input: input.to_vec(),
        expected: expected.to_vec(),
    }
}

fn sum_problem(testcases: Vec<Testcase>) -> Problem {
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

#[tokio::test]
async fn shell_solution_is_judged_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("sum.sh");
    std::fs::write(&source, "read a b\necho $((a+b))\n").unwrap();
    let problem = sum_problem(vec![
        testcase("sample-1", b"1 2\n", b"3\n"),
        testcase("sample-2", b"10 32\n", b"42\n"),
    ]);

    let verifier = Verifier::new(Arc::new(()));
    let report = verifier.run_all(&problem, &source).await;

    assert!(report.compile.is_empty());
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes.iter().all(|o| o.status == Status::Passed));
    assert!(report.accepted());
}

#[tokio::test]
async fn output_mismatch_is_reported_per_testcase() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("sum.sh");
    // prints without the trailing newline the expected output carries
    std::fs::write(&source, "read a b\nprintf %d $((a+b))\n").unwrap();
    let problem = sum_problem(vec![
        testcase("sample-1", b"1 2\n", b"3\n"),
        testcase("sample-2", b"10 32\n", b"42"),
    ]);

    let verifier = Verifier::new(Arc::new(()));
    let report = verifier.run_all(&problem, &source).await;

    assert_eq!(report.outcomes[0].status, Status::Failed);
    assert_eq!(report.outcomes[0].output, b"3");
    assert_eq!(report.outcomes[1].status, Status::Passed);
    assert!(!report.accepted());
}
