extern crate termcolor;

use std::{
    fs::File,
    io::{stdin, Read, Write},
    path::PathBuf,
};
use termcolor::{Color, StandardStream, WriteColor};

#[allow(unused_must_use)]
pub fn read_line_to(stdout: &mut StandardStream, prompt: &[u8], dest: &mut String) {
    dest.clear();
    loop {
        stdout.write(prompt);
        stdout.flush();
        match stdin().read_line(dest) {
            Ok(_) => {
                dest.truncate(dest.trim_end().len());
                return;
            }
            Err(e) => write_error!(stdout, "Error", "Read: {}", e.to_string()),
        }
        stdout.reset();
    }
}
pub fn read_line(stdout: &mut StandardStream, prompt: &[u8]) -> String {
    let mut ret = String::new();
    read_line_to(stdout, prompt, &mut ret);
    ret
}

#[allow(unused_must_use)]
pub fn read_usize(stdout: &mut StandardStream, prompt: &[u8], min: usize, max: usize) -> usize {
    let mut buf = String::new();
    loop {
        read_line_to(stdout, prompt, &mut buf);
        match buf.parse::<usize>() {
            Ok(v) => {
                if v < min || v >= max {
                    write_error!(
                        stdout,
                        "Error",
                        "parse: Value {} out of range. Expected value in [{}, {})",
                        v,
                        min,
                        max
                    );
                } else {
                    return v;
                }
            }
            Err(e) => write_error!(stdout, "Error", "parse: {}", e.to_string()),
        };
        stdout.reset();
    }
}

/// Prompts until the answer names an existing file.
#[allow(unused_must_use)]
pub fn read_source(stdout: &mut StandardStream, prompt: &[u8]) -> PathBuf {
    let mut path = String::new();
    loop {
        read_line_to(stdout, prompt, &mut path);
        let candidate = PathBuf::from(&path);
        if candidate.is_file() {
            return candidate;
        }
        write_error!(stdout, "Error", "{} is not a readable file", path);
        stdout.reset();
    }
}

#[allow(unused_must_use)]
pub fn read_reader(stdout: &mut StandardStream) -> impl Read {
    loop {
        let path = read_line(stdout, b"File path: ");
        match File::open(&path) {
            Ok(v) => break v,
            Err(e) => write_error!(stdout, "Error", "Error open {}: {}", path, e),
        }
        stdout.reset();
    }
}
