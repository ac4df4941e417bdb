use std::{env, fs, process::ExitCode};

use skink::{Interpreter, Object};

const USAGE: &str = "usage: skink [--max-steps N] (<file.js> | -e <expression>)";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut max_steps: Option<u64> = None;
    let mut source: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--max-steps" => {
                let Some(n) = args.get(i + 1).and_then(|n| n.parse().ok()) else {
                    eprintln!("{USAGE}");
                    return ExitCode::FAILURE;
                };
                max_steps = Some(n);
                i += 2;
            }
            "-e" => {
                let Some(expr) = args.get(i + 1) else {
                    eprintln!("{USAGE}");
                    return ExitCode::FAILURE;
                };
                source = Some(expr.clone());
                i += 2;
            }
            path => {
                match fs::read_to_string(path) {
                    Ok(code) => source = Some(code),
                    Err(err) => {
                        eprintln!("error reading {path}: {err}");
                        return ExitCode::FAILURE;
                    }
                }
                i += 1;
            }
        }
    }
    let Some(source) = source else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let mut interp = match Interpreter::new(&source) {
        Ok(interp) => interp,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    // The interpreter has no intrinsic timeout; the step budget is the
    // host-side limit.
    let mut steps = 0u64;
    loop {
        match interp.step() {
            Ok(true) => {
                if interp.paused() {
                    eprintln!("error: program paused on an async call with no host to resume it");
                    return ExitCode::FAILURE;
                }
                steps += 1;
                if let Some(limit) = max_steps
                    && steps >= limit
                {
                    eprintln!("error: exceeded {limit} steps");
                    return ExitCode::FAILURE;
                }
            }
            Ok(false) => break,
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
    }

    match interp.value() {
        Object::Undefined => {}
        value => println!("{value}"),
    }
    ExitCode::SUCCESS
}
