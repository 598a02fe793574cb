//! Top-level interpreter.
//!
//! The [`Interpreter`] owns a [`SymbolTable`] and decides what each input
//! line is before handing it to the converter and evaluator:
//!
//! - `name = expr` assigns a global variable and yields the value.
//! - `name(p, q) = expr` defines a user function and yields `true`.
//! - anything else is an expression.
//!
//! A single trailing `;` is ignored.  Failures are returned and also kept
//! as [`Interpreter::last_error`] for callers that run with errors
//! suppressed.

use tracing::debug;

use super::{
    error::{Error, Result},
    eval::{Evaluator, HostFunction, Limits},
    expr::convert,
    symbols::SymbolTable,
    token::Program,
    value::Value,
};

/// Shape of an input line.
#[derive(Debug, PartialEq)]
enum Form<'s> {
    Assign { name: &'s str, expr: &'s str },
    Define { name: &'s str, params: Vec<String>, body: &'s str },
    Expr(&'s str),
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Byte offset of the first `=` that is not part of `==`, `=~`, `!=`, `<=`
/// or `>=`.
fn assignment_eq(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b'='
            && !matches!(bytes.get(i + 1), Some(b'=' | b'~'))
            && !(i > 0 && matches!(bytes[i - 1], b'=' | b'!' | b'<' | b'>'))
    })
}

fn classify(input: &str) -> Form<'_> {
    let Some(eq) = assignment_eq(input) else {
        return Form::Expr(input);
    };
    let lhs = input[..eq].trim();
    let rhs = input[eq + 1..].trim();

    if is_word(lhs) {
        return Form::Assign { name: lhs, expr: rhs };
    }
    let signature = lhs
        .strip_suffix(')')
        .and_then(|head| head.split_once('('))
        .filter(|(name, _)| is_word(name.trim_end()));
    match signature {
        Some((name, list)) => {
            let params = if list.trim().is_empty() {
                Vec::new()
            } else {
                list.split(',').map(|p| p.trim().to_owned()).collect()
            };
            Form::Define {
                name: name.trim_end(),
                params,
                body: rhs,
            }
        }
        None => Form::Expr(input),
    }
}

#[derive(Debug, Default)]
pub struct Interpreter {
    symbols: SymbolTable,
    limits: Limits,
    suppress_errors: bool,
    last_error: Option<Error>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// When set, failures are still returned and recorded but not logged.
    pub fn set_suppress_errors(&mut self, suppress: bool) {
        self.suppress_errors = suppress;
    }

    pub fn suppress_errors(&self) -> bool {
        self.suppress_errors
    }

    /// The failure of the most recent [`evaluate`](Self::evaluate), if it
    /// failed.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Evaluate one input line: an assignment, a function definition or an
    /// expression.
    pub fn evaluate(&mut self, input: &str) -> Result<Value> {
        let trimmed = input.trim();
        let line = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
        let result = self.dispatch(line);
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                if !self.suppress_errors {
                    debug!(expression = line, error = %e, "evaluation failed");
                }
                self.last_error = Some(e.clone());
            }
        }
        result
    }

    fn dispatch(&mut self, line: &str) -> Result<Value> {
        match classify(line) {
            Form::Assign { name, expr } => {
                let value = self.eval_expr(expr)?;
                self.symbols.assign(name, value.clone())?;
                debug!(variable = name, value = %value, "assigned");
                Ok(value)
            }
            Form::Define { name, params, body } => {
                self.symbols.define_function(name, &params, body)?;
                Ok(Value::Bool(true))
            }
            Form::Expr(expr) => self.eval_expr(expr),
        }
    }

    fn eval_expr(&mut self, expr: &str) -> Result<Value> {
        let program = self.compile(expr)?;
        self.run(&program)
    }

    /// Convert an expression to its postfix program without running it.
    pub fn compile(&self, expr: &str) -> Result<Program> {
        let program = convert(expr, &self.symbols)?;
        debug!(expression = expr, program = %program, "converted");
        Ok(program)
    }

    /// Run a program against the current symbol table.
    pub fn run(&mut self, program: &Program) -> Result<Value> {
        Evaluator::new(&mut self.symbols, self.limits).run(program)
    }

    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        self.symbols.assign(name, value)
    }

    pub fn define_function(&mut self, name: &str, params: &[String], body: &str) -> Result<()> {
        self.symbols.define_function(name, params, body)
    }

    /// Register `callable` as a host function taking exactly `arity`
    /// arguments.
    pub fn register_host_function<F>(&mut self, name: &str, arity: usize, callable: F) -> Result<()>
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.symbols
            .register_host_function(name, HostFunction::new(arity, callable))
    }

    /// Bound variables sorted by name, excluding `e` and `pi`.
    pub fn vars(&self) -> Vec<(String, Value)> {
        self.symbols.variables()
    }

    /// User functions sorted by name, with their parameter lists.
    pub fn functions(&self) -> Vec<(String, Vec<String>)> {
        self.symbols.functions()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::error::ErrorCategory;

    fn eval(interp: &mut Interpreter, src: &str) -> Value {
        match interp.evaluate(src) {
            Ok(v) => v,
            Err(e) => panic!("{src:?} failed: {e}"),
        }
    }

    fn eval1(src: &str) -> Value {
        eval(&mut Interpreter::new(), src)
    }

    fn num(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn classify_forms() {
        assert_eq!(classify("a = 1"), Form::Assign { name: "a", expr: "1" });
        assert_eq!(
            classify("f(x, y) = x+y"),
            Form::Define {
                name: "f",
                params: vec!["x".into(), "y".into()],
                body: "x+y"
            }
        );
        assert_eq!(
            classify("k() = 1"),
            Form::Define {
                name: "k",
                params: vec![],
                body: "1"
            }
        );
        assert_eq!(classify("a == 1"), Form::Expr("a == 1"));
        assert_eq!(classify("a != 1"), Form::Expr("a != 1"));
        assert_eq!(classify("a <= 1"), Form::Expr("a <= 1"));
        assert_eq!(classify("s =~ /x/"), Form::Expr("s =~ /x/"));
        assert_eq!(classify("\"a=b\" + c"), Form::Expr("\"a=b\" + c"));
    }

    #[test]
    fn precedence() {
        assert_eq!(eval1("2+3*4"), num(14.0));
        assert_eq!(eval1("(2+3)*4"), num(20.0));
        assert_eq!(eval1("2^3^2"), num(512.0));
        assert_eq!(eval1("-2^2"), num(-4.0));
    }

    #[test]
    fn assignment_then_use() {
        let mut interp = Interpreter::new();
        assert_eq!(eval(&mut interp, "a=5"), num(5.0));
        assert_eq!(eval(&mut interp, "a+1"), num(6.0));
        assert_eq!(eval(&mut interp, "b = a * 2;"), num(10.0));
        assert_eq!(
            interp.evaluate("pi = 3"),
            Err(Error::ReservedConstant("pi".into()))
        );
        assert!(interp.evaluate("e=1").is_err());
        assert_eq!(eval(&mut interp, "pi"), num(std::f64::consts::PI));
    }

    #[test]
    fn function_definition_and_call() {
        let mut interp = Interpreter::new();
        assert_eq!(eval(&mut interp, "f(x,y)=x^2+y^2-2*x*y+1"), Value::Bool(true));
        assert_eq!(eval(&mut interp, "f(3,4)"), num(2.0));
        let err = interp.evaluate("f(3)").unwrap_err();
        assert!(err.to_string().contains("1 given, 2 expected"));
        assert_eq!(interp.evaluate("sin(x) = x"), Err(Error::BuiltinRedefinition("sin".into())));
        assert!(matches!(interp.evaluate("f = 1"), Err(Error::AssignToFunction(_))));
    }

    #[test]
    fn strings() {
        assert_eq!(eval1("\"a\"+\"b\""), Value::from("ab"));
        assert_eq!(eval1("2+3"), num(5.0));
        assert_eq!(eval1("'n=' + 4"), Value::from("n=4"));
    }

    #[test]
    fn pattern_captures() {
        let mut interp = Interpreter::new();
        assert_eq!(eval(&mut interp, r#""Foo,Bar" =~ /^([fo]+),(bar)$/i"#), num(1.0));
        assert_eq!(eval(&mut interp, "$1"), Value::from("Foo"));
        assert_eq!(eval(&mut interp, "$2"), Value::from("Bar"));
        assert_eq!(eval(&mut interp, "\"zzz\" =~ /(a)/"), num(0.0));
        assert_eq!(eval(&mut interp, "$1"), Value::from("Foo"));
    }

    #[test]
    fn captures_inside_functions_are_global() {
        let mut interp = Interpreter::new();
        eval(&mut interp, "grab(s) = s =~ /(\\d+)/");
        assert_eq!(eval(&mut interp, "grab(\"abc123\") && $1 * 2"), num(246.0));
    }

    #[test]
    fn logical_value_preserving() {
        assert_eq!(eval1("0&&5"), num(0.0));
        assert_eq!(eval1("1&&2"), num(2.0));
        assert_eq!(eval1("0||7"), num(7.0));
        assert_eq!(eval1("\"\" || \"x\""), Value::from("x"));
    }

    #[test]
    fn logical_operators_do_not_short_circuit() {
        let mut interp = Interpreter::new();
        eval(&mut interp, "1 || \"hit\" =~ /(h)it/");
        assert_eq!(eval(&mut interp, "$1"), Value::from("h"));
    }

    #[test]
    fn division_by_zero() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.evaluate("5/0"), Err(Error::DivisionByZero));
        assert_eq!(interp.evaluate("5%0"), Err(Error::DivisionByZero));
        assert_eq!(interp.last_error(), Some(&Error::DivisionByZero));
    }

    #[test]
    fn last_error_cleared_on_success() {
        let mut interp = Interpreter::new();
        interp.set_suppress_errors(true);
        assert!(interp.evaluate("nope").is_err());
        assert_eq!(
            interp.last_error(),
            Some(&Error::UndefinedVariable("nope".into()))
        );
        eval(&mut interp, "1");
        assert_eq!(interp.last_error(), None);
    }

    #[test]
    fn idempotent_reads() {
        let mut interp = Interpreter::new();
        eval(&mut interp, "x = 3");
        eval(&mut interp, "sq(v) = v*v");
        let first = eval(&mut interp, "sq(x) + [1,2,3][x-1] * pi");
        let second = eval(&mut interp, "sq(x) + [1,2,3][x-1] * pi");
        assert_eq!(first, second);
    }

    #[test]
    fn compile_and_run_round_trip() {
        let mut interp = Interpreter::new();
        eval(&mut interp, "g(a, b) = a - b");
        let program = interp.compile("g(10, 2) * 3").unwrap();
        assert_eq!(program.to_string(), "10 2 g(2) 3 *");
        assert_eq!(program.stack_depth(), 1);
        assert_eq!(interp.run(&program), Ok(num(24.0)));
    }

    #[test]
    fn structured_values() {
        assert_eq!(eval1(r#"{"a": [10, 20]}["a"][1]"#), num(20.0));
        assert_eq!(eval1("[1,2] == [1,2]"), Value::Bool(true));
        assert_eq!(eval1("[1,2][5]"), Value::Null);
        assert_eq!(
            Interpreter::new().evaluate("5[0]"),
            Err(Error::InvalidSelector)
        );
        assert!(matches!(
            Interpreter::new().evaluate("[1,]"),
            Err(Error::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn host_functions() {
        let mut interp = Interpreter::new();
        interp
            .register_host_function("clamp", 3, |args| {
                let n: Vec<f64> = args.iter().filter_map(Value::as_number).collect();
                match n.as_slice() {
                    [x, lo, hi] => Ok(Value::Number(x.clamp(*lo, *hi))),
                    _ => Err("clamp expects numbers".into()),
                }
            })
            .unwrap();
        assert_eq!(eval(&mut interp, "clamp(15, 0, 10)"), num(10.0));
        assert!(matches!(
            interp.evaluate("clamp(\"x\", 0, 1)"),
            Err(Error::HostFunction { .. })
        ));
    }

    #[test]
    fn host_arity_change_fails_at_call() {
        let mut interp = Interpreter::new();
        interp
            .register_host_function("h", 2, |args| Ok(args[0].clone()))
            .unwrap();
        eval(&mut interp, "f(x) = h(x, 1)");
        assert_eq!(eval(&mut interp, "f(5)"), num(5.0));

        interp
            .register_host_function("h", 1, |args| Ok(args[0].clone()))
            .unwrap();
        let err = interp.evaluate("f(5)").unwrap_err();
        assert_eq!(
            err,
            Error::ArgumentCount {
                name: "h".into(),
                given: 2,
                expected: 1,
            }
        );
        assert_eq!(err.category(), ErrorCategory::Semantic);
    }

    #[test]
    fn deeply_nested_input_is_handled() {
        let n = 20_000;
        let mut interp = Interpreter::new();
        interp.set_suppress_errors(true);
        eval(&mut interp, "a = [0]");

        let selectors = format!("{}0{}", "a[".repeat(n), "]".repeat(n));
        assert_eq!(interp.evaluate(&selectors), Ok(num(0.0)));

        let groups = format!("{}2{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(interp.evaluate(&groups), Ok(num(2.0)));

        let negations = format!("{}3", "-".repeat(n));
        assert_eq!(interp.evaluate(&negations), Ok(num(3.0)));

        let unclosed = format!("{}0", "a[".repeat(n));
        assert!(matches!(
            interp.evaluate(&unclosed),
            Err(Error::MalformedIndex(_))
        ));
        let literal = "[".repeat(n);
        assert!(interp.evaluate(&literal).is_err());
    }

    #[test]
    fn recursion_and_step_limits() {
        let mut interp = Interpreter::with_limits(Limits {
            max_depth: 5,
            max_steps: 1_000,
        });
        eval(&mut interp, "g(x) = x");
        eval(&mut interp, "f(x) = g(x)");
        eval(&mut interp, "g(x) = f(x)");
        assert_eq!(interp.evaluate("f(1)"), Err(Error::RecursionLimit(5)));

        interp.set_limits(Limits {
            max_depth: 5,
            max_steps: 4,
        });
        assert_eq!(interp.evaluate("1+2+3"), Err(Error::StepLimit(4)));
    }

    #[test]
    fn error_categories() {
        let mut interp = Interpreter::new();
        let syntax = interp.evaluate("(1").unwrap_err();
        assert_eq!(syntax.category(), ErrorCategory::Syntax);
        let semantic = interp.evaluate("undefined_thing").unwrap_err();
        assert_eq!(semantic.category(), ErrorCategory::Semantic);
    }

    #[test]
    fn introspection() {
        let mut interp = Interpreter::new();
        eval(&mut interp, "b = 2");
        eval(&mut interp, "a = 1");
        eval(&mut interp, "h(p, q) = p");
        eval(&mut interp, "\"x\" =~ /x/");
        let names: Vec<String> = interp.vars().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["$0", "a", "b"]);
        assert_eq!(
            interp.functions(),
            vec![("h".to_owned(), vec!["p".to_owned(), "q".to_owned()])]
        );
    }
}
