//! The wild runtime: a tree-walking evaluator over the AST produced
//! by `wild_syntax`, with a prototype-based object model, a native
//! standard library, and file-based modules.

pub mod environment;
pub mod error;
pub mod interpret;
pub mod meta;
pub mod module;
pub mod stdlib;
pub mod types;

use log::trace;
use wild_syntax::{
    error::SyntaxError,
    lex::{Collector, Lexer},
    parse::Parser,
};

use crate::{error::RuntimeError, interpret::Interpreter, types::Value};

#[derive(Debug)]
pub enum Fault {
    Syntax(Vec<SyntaxError>),
    Runtime(RuntimeError),
}

/// Runs a source string through the whole pipeline and returns the
/// program value.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<Value, Fault> {
    trace!("Lexing source ({} bytes)", source.len());
    let collector = Collector::collect(Lexer::new(source));
    collector.check().map_err(Fault::Syntax)?;
    trace!("Parsing {} tokens", collector.tokens().len());
    let program = Parser::new(collector.tokens())
        .parse_all()
        .map_err(Fault::Syntax)?;
    trace!("Evaluating {program}");
    interpreter
        .eval_program(&program)
        .map_err(Fault::Runtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn runs_a_program_end_to_end() {
        let mut interpreter = Interpreter::new();
        let got = run("let x = 2; x * 21;", &mut interpreter).unwrap();
        assert_eq!(got, Value::Number(42.0));
    }

    #[test]
    fn interpreter_state_persists_across_runs() {
        let mut interpreter = Interpreter::new();
        run("let x = 1;", &mut interpreter).unwrap();
        let got = run("x + 1;", &mut interpreter).unwrap();
        assert_eq!(got, Value::Number(2.0));
    }

    #[test]
    fn syntax_errors_are_collected() {
        let mut interpreter = Interpreter::new();
        let Err(Fault::Syntax(errors)) = run("let 1 = 2; let 3 = 4;", &mut interpreter) else {
            panic!("expected syntax errors");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn runtime_errors_surface() {
        let mut interpreter = Interpreter::new();
        assert!(matches!(
            run("1 / 0;", &mut interpreter),
            Err(Fault::Runtime(_))
        ));
    }
}
