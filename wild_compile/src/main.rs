use std::{fs, path::PathBuf, process::ExitCode, time::Instant};

use clap::Parser;
use wild_compile::{
    interpret::Interpreter,
    run,
    types::{Flow, Value},
    Fault,
};
use wild_syntax::{
    lex::{Collector, Lexer},
    parse,
};

const TEMPLATE: &str = include_str!("template.wild");

#[derive(Parser)]
#[command(name = "wild", version, about = "The wild scripting language")]
struct Cli {
    /// Print the parsed program, per-statement results, and timing
    #[arg(long)]
    debug: bool,
    /// With --debug, also print the token stream
    #[arg(long)]
    tokens: bool,
    /// Script to run, or `init` to scaffold a starter main.wild
    file: String,
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let cli = Cli::parse();
    if cli.file == "init" {
        return init_script();
    }
    let path = match resolve_path(&cli.file) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let source = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let mut interpreter = Interpreter::new();
    if let Some(dir) = path.parent() {
        interpreter.base_dir = dir.to_path_buf();
    }
    if cli.debug {
        run_debug(&source, &mut interpreter, cli.tokens)
    } else {
        run_script(&source, &mut interpreter)
    }
}

/// A bare name gets the `.wild` extension appended; any other
/// extension is rejected.
fn resolve_path(file: &str) -> Result<PathBuf, String> {
    let mut path = PathBuf::from(file);
    match path.extension() {
        None => {
            path.set_extension("wild");
            Ok(path)
        }
        Some(ext) if ext == "wild" => Ok(path),
        Some(_) => Err(format!("{file} is not a wild script")),
    }
}

fn run_script(source: &str, interpreter: &mut Interpreter) -> ExitCode {
    match run(source, interpreter) {
        Ok(_) => ExitCode::SUCCESS,
        Err(fault) => {
            report(fault);
            ExitCode::FAILURE
        }
    }
}

fn report(fault: Fault) {
    match fault {
        Fault::Syntax(errors) => {
            for e in errors {
                eprintln!("{e}");
            }
        }
        Fault::Runtime(e) => eprintln!("{e}"),
    }
}

/// Statement-by-statement execution with the canonical program, each
/// statement's value, and the elapsed time printed along the way.
fn run_debug(source: &str, interpreter: &mut Interpreter, tokens: bool) -> ExitCode {
    let start = Instant::now();
    let collector = Collector::collect(Lexer::new(source));
    if tokens {
        for token in collector.tokens() {
            println!("{token:?}");
        }
    }
    if let Err(errors) = collector.check() {
        return report_syntax(errors);
    }
    let program = match parse::Parser::new(collector.tokens()).parse_all() {
        Ok(p) => p,
        Err(errors) => return report_syntax(errors),
    };
    println!("{program}");
    let mut value = Value::Nil;
    for (i, stmt) in program.stmts.iter().enumerate() {
        match interpreter.eval_top_stmt(stmt) {
            Ok(Flow::Export(v)) => {
                println!("{i} >> {v}");
                value = v;
                break;
            }
            Ok(Flow::Value(v)) => {
                println!("{i} >> {v}");
                value = v;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }
    println!("{value}");
    println!("program ends in {} us", start.elapsed().as_micros());
    ExitCode::SUCCESS
}

fn report_syntax(errors: Vec<wild_syntax::error::SyntaxError>) -> ExitCode {
    for e in errors {
        eprintln!("{e}");
    }
    ExitCode::FAILURE
}

fn init_script() -> ExitCode {
    let target = PathBuf::from("main.wild");
    if target.exists() {
        eprintln!("main.wild already exists");
        return ExitCode::FAILURE;
    }
    match fs::write(&target, TEMPLATE) {
        Ok(()) => {
            println!("created main.wild");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("cannot write main.wild: {e}");
            ExitCode::FAILURE
        }
    }
}
