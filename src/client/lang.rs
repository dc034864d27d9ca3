use crate::types::Handler;
use std::path::Path;

/// Name of the built binary inside the working directory for compiled
/// languages.
pub const EXE: &str = "program";

/// A local toolchain adapter. Command templates expand `{main}` to the
/// source file path and `{exe}` to the built binary path; both are
/// configuration inputs, not core state.
#[derive(Debug, Clone, Copy)]
pub struct Language {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub compilers: &'static [&'static str],
    pub compile: Option<&'static str>,
    pub run: &'static str,
}

pub const CPP: Language = Language {
    name: "C++",
    extensions: &["cc", "cpp", "cxx"],
    compilers: &["G++", "G++17", "P1++"],
    compile: Some("g++ -O2 -std=c++17 -o {exe} {main}"),
    run: "{exe}",
};
pub const PYTHON: Language = Language {
    name: "Python",
    extensions: &["py"],
    compilers: &["Python3"],
    compile: None,
    run: "python3 {main}",
};
pub const SHELL: Language = Language {
    name: "Shell",
    extensions: &["sh"],
    compilers: &["Bash"],
    compile: None,
    run: "sh {main}",
};

pub const LANGUAGES: &[Language] = &[CPP, PYTHON, SHELL];

fn expand(template: &str, dir: &Path, main: &str) -> (String, Vec<String>) {
    let main_path = dir.join(main).to_string_lossy().into_owned();
    let exe_path = dir.join(EXE).to_string_lossy().into_owned();
    let line = template.replace("{main}", &main_path).replace("{exe}", &exe_path);
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap();
    (program, parts.collect())
}

impl Language {
    pub fn compile_command(&self, dir: &Path, main: &str) -> Option<(String, Vec<String>)> {
        self.compile.map(|template| expand(template, dir, main))
    }
    pub fn run_command(&self, dir: &Path, main: &str) -> (String, Vec<String>) {
        expand(self.run, dir, main)
    }
}

pub fn from_extension<'a>(table: &'a [Language], source: &Path) -> Option<&'a Language> {
    let extension = source.extension()?.to_str()?;
    table
        .iter()
        .find(|language| {
            language
                .extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(extension))
        })
}

pub fn from_compiler<'a>(table: &'a [Language], compiler_id: &str) -> Option<&'a Language> {
    table
        .iter()
        .find(|language| language.compilers.iter().any(|c| *c == compiler_id))
}

/// Source extension wins; the handler's accepted compiler ids are the
/// fallback for extensionless or unknown files.
pub fn resolve<'a>(
    table: &'a [Language],
    source: &Path,
    handler: Option<&Handler>,
) -> Option<&'a Language> {
    from_extension(table, source).or_else(|| {
        handler.and_then(|h| {
            h.compilers
                .iter()
                .find_map(|compiler_id| from_compiler(table, compiler_id))
        })
    })
}
