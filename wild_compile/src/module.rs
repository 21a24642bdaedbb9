//! Module loading for `import a.b.c`: the dotted path maps to
//! `a/b/c.wild` under the interpreter's base directory, the file runs
//! in a fresh top-level environment, and its program value is cached
//! so repeated imports share one instance.

use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use log::debug;
use wild_syntax::{
    error::SyntaxError,
    lex::{Collector, Lexer},
    parse::Parser,
};

use crate::{
    environment::Env,
    error::{ErrorKind, RuntimeError},
    interpret::Interpreter,
    stdlib,
    types::Value,
};

pub fn load(interp: &mut Interpreter, segments: &[String]) -> Result<Value, RuntimeError> {
    let mut rel: PathBuf = segments.iter().collect();
    rel.set_extension("wild");
    let path = interp.base_dir.join(rel);
    if let Some(cached) = interp.modules.get(&path) {
        debug!("Module {} already loaded", path.display());
        return Ok(cached.clone());
    }
    if !interp.loading.insert(path.clone()) {
        return Err(ErrorKind::ImportCycle(path.display().to_string()).into());
    }
    let result = eval_module(interp, &path);
    interp.loading.remove(&path);
    let value = result?;
    interp.modules.insert(path, value.clone());
    Ok(value)
}

fn eval_module(interp: &mut Interpreter, path: &Path) -> Result<Value, RuntimeError> {
    debug!("Loading module {}", path.display());
    let source = fs::read_to_string(path).map_err(|e| ErrorKind::ImportFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let syntax_err = |errors: Vec<SyntaxError>| ErrorKind::ImportSyntax {
        path: path.display().to_string(),
        message: errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    };
    let collector = Collector::collect(Lexer::new(&source));
    collector.check().map_err(syntax_err)?;
    let program = Parser::new(collector.tokens())
        .parse_all()
        .map_err(syntax_err)?;
    // Modules see the standard library but nothing from the importer
    let root = Env::new();
    stdlib::init(&mut root.borrow_mut());
    let saved = Rc::clone(&interp.env);
    interp.env = root;
    let result = interp.eval_program(&program);
    interp.env = saved;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("wild-module-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn eval_in(dir: &Path, source: &str) -> Result<Value, RuntimeError> {
        let collector = Collector::collect(Lexer::new(source));
        collector.check().unwrap();
        let program = Parser::new(collector.tokens()).parse_all().unwrap();
        let mut interp = Interpreter::new();
        interp.base_dir = dir.to_path_buf();
        interp.eval_program(&program)
    }

    #[test]
    fn import_binds_the_exported_value() {
        let dir = scratch_dir("export");
        fs::write(
            dir.join("math.wild"),
            "fn double(n) { return n * 2; }\nexport {double = double};",
        )
        .unwrap();
        let got = eval_in(&dir, "import math; math.double(21);").unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(got, Value::Number(42.0));
    }

    #[test]
    fn modules_are_cached_by_path() {
        let dir = scratch_dir("cache");
        fs::write(dir.join("shared.wild"), "export {\"hits\": 0};").unwrap();
        let source = "
            import shared;
            let a = shared;
            import shared;
            a == shared;
        ";
        let got = eval_in(&dir, source).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(got, Value::Boolean(true));
    }

    #[test]
    fn dotted_paths_map_to_directories() {
        let dir = scratch_dir("nested");
        fs::create_dir_all(dir.join("util")).unwrap();
        fs::write(dir.join("util/text.wild"), "export \"ready\";").unwrap();
        let got = eval_in(&dir, "import util.text; text;").unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(got, Value::Str("ready".to_string()));
    }

    #[test]
    fn circular_imports_are_errors() {
        let dir = scratch_dir("cycle");
        fs::write(dir.join("a.wild"), "import b; export 1;").unwrap();
        fs::write(dir.join("b.wild"), "import a; export 2;").unwrap();
        let err = eval_in(&dir, "import a;").unwrap_err();
        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(err.kind, ErrorKind::ImportCycle(_)));
    }

    #[test]
    fn missing_modules_are_errors() {
        let dir = scratch_dir("missing");
        let err = eval_in(&dir, "import nowhere;").unwrap_err();
        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(err.kind, ErrorKind::ImportFailed { .. }));
    }

    #[test]
    fn module_syntax_errors_are_reported() {
        let dir = scratch_dir("syntax");
        fs::write(dir.join("broken.wild"), "let = ;").unwrap();
        let err = eval_in(&dir, "import broken;").unwrap_err();
        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(err.kind, ErrorKind::ImportSyntax { .. }));
    }

    #[test]
    fn modules_do_not_see_importer_bindings() {
        let dir = scratch_dir("isolated");
        fs::write(dir.join("peek.wild"), "export secret;").unwrap();
        let err = eval_in(&dir, "let secret = 1; import peek;").unwrap_err();
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(err.kind, ErrorKind::UndefinedVar("secret".to_string()));
    }
}
