extern crate clap;
extern crate pretty_env_logger;
extern crate termcolor;
extern crate tokio;

use clap::{crate_description, crate_name, App, Arg};
use oj_client::{
    api::Session,
    cache::{store::Store, Cache},
    config,
    types::AbstractProblem,
};
use pretty_env_logger::init_timed;
use std::{fs::File, io::Write};
use termcolor::{Color, ColorChoice, StandardStream, WriteColor};

#[macro_use]
mod color;
mod command {
    pub mod problem;
    pub mod session;
}
mod read;
mod write;

use command::{
    problem::problem_loop,
    session::{login, logout, profile},
};
use read::{read_line, read_reader};

#[allow(unused_must_use)]
async fn select(stdout: &mut StandardStream, session: &Session, cache: &Cache) {
    let problem_nm = read_line(stdout, b"Problem: ");
    let language = read_line(stdout, b"Language id: ");
    let fetch_session = session.clone();
    let nm = problem_nm.clone();
    let lookup = cache.get::<AbstractProblem, _, _>(
        &format!("getAbstractProblem({})", problem_nm),
        move || async move { fetch_session.get_abstract_problem(&nm).await },
    );
    match lookup.value().await {
        Ok(abstract_problem) => match abstract_problem.variant(&language) {
            Some(problem) => problem_loop(stdout, session, cache, problem.clone()).await,
            // no silent fallback: say which variant is actually used
            None => match abstract_problem.variant_or_first(&language) {
                Some(problem) => {
                    write_info!(
                        stdout,
                        "Info",
                        "No {} variant of {}; using {}",
                        language,
                        problem_nm,
                        problem.problem_id
                    );
                    stdout.reset();
                    problem_loop(stdout, session, cache, problem.clone()).await
                }
                None => write_error!(stdout, "Error", "{} has no variants", problem_nm),
            },
        },
        Err(e) => write_error!(stdout, "Error", "{}", e),
    }
}

#[allow(unused_must_use)]
#[tokio::main]
async fn main() {
    init_timed();
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let app = App::new(crate_name!())
        .about(crate_description!())
        .version(get_version!("version"))
        .long_version(get_version!("long_version"))
        .arg(
            Arg::new("judge")
                .help("Base URL of the judge API")
                .required(true),
        )
        .arg(
            Arg::new("store")
                .help("Path to the persisted cache file")
                .long("store")
                .takes_value(true)
                .default_value(config::store::DEFAULT_PATH),
        )
        .arg(
            Arg::new("credentials")
                .help("Path to a YAML credentials file to sign in with")
                .long("credentials")
                .takes_value(true),
        )
        .get_matches();
    let store = match Store::open(app.value_of("store").unwrap()) {
        Ok(v) => v,
        Err(e) => {
            write_error!(&mut stdout, "Error", "{}", e);
            return;
        }
    };
    let cache = Cache::open(
        store,
        Box::new(|| {
            let mut stdout = StandardStream::stdout(ColorChoice::Auto);
            write_error!(
                &mut stdout,
                "Error",
                "The judge invalidated this session; please login again"
            );
            stdout.reset();
        }),
    );
    let mut session = Session::new(app.value_of("judge").unwrap());
    if let Some(path) = app.value_of("credentials") {
        match File::open(path) {
            Ok(v) => {
                if let Some(signed_in) = login(&mut stdout, &session, v).await {
                    session = signed_in;
                }
            }
            Err(e) => write_error!(&mut stdout, "Error", "Error open {}: {}", path, e),
        }
        stdout.reset();
    }
    loop {
        match read_line(&mut stdout, b"oj-client> ").trim() {
            "select" => select(&mut stdout, &session, &cache).await,
            "login" => {
                let rdr = read_reader(&mut stdout);
                if let Some(signed_in) = login(&mut stdout, &session, rdr).await {
                    session = signed_in;
                }
            }
            "logout" => {
                if let Some(signed_out) = logout(&mut stdout, &session).await {
                    session = signed_out;
                }
            }
            "profile" => profile(&mut stdout, &session, &cache).await,
            "exit" => break,
            unknown => write_error!(
                &mut stdout,
                "Error",
                r#"oj-client: unknown command "{}""#,
                unknown
            ),
        }
        stdout.reset();
    }
    if session.is_authenticated() {
        logout(&mut stdout, &session).await;
    }
    stdout.reset();
}
