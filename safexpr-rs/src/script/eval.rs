//! Postfix evaluator.
//!
//! A stack machine that consumes a [`Program`] left to right.  Operands are
//! pushed; operators, index markers and function markers pop their inputs
//! and push one result.  A user function call re-enters the evaluator with
//! the bound parameters as a local overlay on top of the shared
//! [`EvalContext`], so captures written inside a nested call are visible to
//! the caller as soon as the call returns.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::pattern::Pattern;
use super::{
    builtins::Builtin,
    error::{Error, Result},
    token::{Op, Program, Token},
    value::Value,
};

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Dependency-injection interface used by the converter and the evaluator.
///
/// A [`SymbolTable`](super::symbols::SymbolTable) implements this trait to
/// give both stages access to global variables and functions.
pub trait EvalContext {
    /// Look up a global variable.
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Bind `$index` to a capture group's text.
    fn set_capture(&mut self, index: usize, text: &str);

    /// Resolve a function name: builtin, then user, then host.
    fn function(&self, name: &str) -> Option<Function>;
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// A host-supplied callable.
pub type HostFn = Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

/// A registered host function: fixed arity plus the callable.
#[derive(Clone)]
pub struct HostFunction {
    arity: usize,
    callable: HostFn,
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunction")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl HostFunction {
    pub fn new<F>(arity: usize, callable: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            arity,
            callable: Arc::new(callable),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, args: &[Value]) -> std::result::Result<Value, String> {
        (self.callable)(args)
    }
}

/// A function defined by an expression.  Non-parameter names in `body` were
/// replaced by their values when the function was defined.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub params: Vec<String>,
    pub body: Program,
}

/// Anything callable with `name(args)`.
#[derive(Debug, Clone)]
pub enum Function {
    Builtin(Builtin),
    User(Arc<UserFunction>),
    Host(HostFunction),
}

impl Function {
    /// Number of arguments a call must supply.
    pub fn arity(&self) -> usize {
        match self {
            Function::Builtin(_) => 1,
            Function::User(f) => f.params.len(),
            Function::Host(h) => h.arity(),
        }
    }
}

// ── Limits ────────────────────────────────────────────────────────────────────

/// Bounds on the work a single top-level evaluation may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting of user-function calls.
    pub max_depth: usize,
    /// Maximum number of tokens processed, nested calls included.
    pub max_steps: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 200,
            max_steps: 1_000_000,
        }
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Operand-stack entry.  Regex literals stay compiled patterns until `=~`
/// consumes them.
#[derive(Debug)]
enum Operand {
    Value(Value),
    Pattern(Pattern),
}

pub struct Evaluator<'c> {
    ctx: &'c mut dyn EvalContext,
    limits: Limits,
    depth: usize,
    steps: usize,
}

impl<'c> Evaluator<'c> {
    pub fn new(ctx: &'c mut dyn EvalContext, limits: Limits) -> Self {
        Self {
            ctx,
            limits,
            depth: 0,
            steps: 0,
        }
    }

    /// Evaluate a top-level program (empty local overlay).
    pub fn run(&mut self, program: &Program) -> Result<Value> {
        self.eval(program, &HashMap::new())
    }

    fn eval(&mut self, program: &Program, locals: &HashMap<String, Value>) -> Result<Value> {
        let mut stack: Vec<Operand> = Vec::with_capacity(program.len());

        for token in program.tokens() {
            self.steps += 1;
            if self.steps > self.limits.max_steps {
                return Err(Error::StepLimit(self.limits.max_steps));
            }

            let operand = match token {
                Token::Number(x) => Operand::Value(Value::Number(*x)),
                Token::Str(s) => Operand::Value(Value::Str(s.clone())),
                Token::Json(raw) => Operand::Value(Value::parse_literal(raw)?),
                Token::Value(v) => Operand::Value(v.clone()),
                Token::Var(name) => {
                    let value = locals
                        .get(name)
                        .cloned()
                        .or_else(|| self.ctx.get_var(name))
                        .ok_or_else(|| Error::UndefinedVariable(name.clone()))?;
                    Operand::Value(value)
                }
                Token::Capture(name) => Operand::Value(
                    self.ctx
                        .get_var(name)
                        .ok_or_else(|| Error::UndefinedVariable(name.clone()))?,
                ),
                Token::Regex { pattern, flags } => Operand::Pattern(Pattern::new(pattern, flags)?),
                Token::Op(Op::Match) => {
                    let pattern = match pop(&mut stack, "=~")? {
                        Operand::Pattern(p) => p,
                        Operand::Value(Value::Str(s)) => Pattern::parse_delimited(&s)?,
                        Operand::Value(other) => {
                            return Err(Error::InvalidRegex(format!(
                                "expected a regex, found {}",
                                other.type_name()
                            )))
                        }
                    };
                    let subject = pop_value(&mut stack, "=~")?.as_text();
                    Operand::Value(self.match_pattern(&pattern, &subject))
                }
                Token::Op(op) if op.is_unary() => {
                    let v = pop_value(&mut stack, op.symbol())?;
                    Operand::Value(match op {
                        Op::Not => v.logical_not(),
                        _ => v.arith_neg()?,
                    })
                }
                Token::Op(op) => {
                    let rhs = pop_value(&mut stack, op.symbol())?;
                    let lhs = pop_value(&mut stack, op.symbol())?;
                    Operand::Value(apply_binary(*op, lhs, rhs)?)
                }
                Token::Index => {
                    let key = pop_value(&mut stack, "[")?;
                    let container = pop_value(&mut stack, "[")?;
                    Operand::Value(container.select(&key)?)
                }
                Token::Call { name, argc } => {
                    Operand::Value(self.call(name, *argc, &mut stack)?)
                }
            };
            stack.push(operand);
        }

        let depth = stack.len();
        match (stack.pop(), depth) {
            (Some(Operand::Value(v)), 1) => Ok(v),
            (Some(Operand::Pattern(_)), 1) => Err(Error::type_mismatch("result", "regex")),
            _ => Err(Error::Internal(format!(
                "evaluation ended with {depth} values on the stack"
            ))),
        }
    }

    fn call(&mut self, name: &str, argc: usize, stack: &mut Vec<Operand>) -> Result<Value> {
        let function = self
            .ctx
            .function(name)
            .ok_or_else(|| Error::UndefinedFunction(name.to_owned()))?;

        // The function may have been redefined since the program was built.
        let expected = function.arity();
        if argc != expected {
            return Err(Error::ArgumentCount {
                name: name.to_owned(),
                given: argc,
                expected,
            });
        }

        match function {
            Function::Builtin(builtin) => builtin.call(&pop_value(stack, name)?),
            Function::User(f) => {
                if self.depth >= self.limits.max_depth {
                    return Err(Error::RecursionLimit(self.limits.max_depth));
                }
                let args = pop_args(stack, argc, name)?;
                let locals: HashMap<String, Value> =
                    f.params.iter().cloned().zip(args).collect();
                trace!(function = name, depth = self.depth, "invoking user function");
                self.depth += 1;
                let result = self.eval(&f.body, &locals);
                self.depth -= 1;
                result
            }
            Function::Host(host) => {
                let args = pop_args(stack, argc, name)?;
                trace!(function = name, "invoking host function");
                host.call(&args).map_err(|message| Error::HostFunction {
                    name: name.to_owned(),
                    message,
                })
            }
        }
    }

    /// Run `pattern` against `subject`; on success bind `$0..$n`.
    fn match_pattern(&mut self, pattern: &Pattern, subject: &str) -> Value {
        match pattern.find(subject) {
            Some(caps) => {
                for (i, text) in caps.texts().enumerate() {
                    self.ctx.set_capture(i, text);
                }
                Value::Number(1.0)
            }
            None => Value::Number(0.0),
        }
    }
}

fn pop(stack: &mut Vec<Operand>, op: &str) -> Result<Operand> {
    stack
        .pop()
        .ok_or_else(|| Error::Internal(format!("missing operand for '{op}'")))
}

fn pop_value(stack: &mut Vec<Operand>, op: &str) -> Result<Value> {
    match pop(stack, op)? {
        Operand::Value(v) => Ok(v),
        Operand::Pattern(_) => Err(Error::type_mismatch(op, "regex")),
    }
}

/// Remove the top `n` operands, returned in call order.
fn pop_args(stack: &mut Vec<Operand>, n: usize, name: &str) -> Result<Vec<Value>> {
    if stack.len() < n {
        return Err(Error::Internal(format!(
            "missing operand while binding arguments of '{name}'"
        )));
    }
    let start = stack.len() - n;
    stack
        .drain(start..)
        .map(|operand| match operand {
            Operand::Value(v) => Ok(v),
            Operand::Pattern(_) => Err(Error::type_mismatch(name, "regex")),
        })
        .collect()
}

fn apply_binary(op: Op, lhs: Value, rhs: Value) -> Result<Value> {
    let ordered = |accept: fn(Ordering) -> bool| -> Result<Value> {
        Ok(Value::Bool(
            lhs.compare(&rhs, op.symbol())?.is_some_and(accept),
        ))
    };
    match op {
        Op::Add => lhs.arith_add(&rhs),
        Op::Sub => lhs.arith_sub(&rhs),
        Op::Mul => lhs.arith_mul(&rhs),
        Op::Div => lhs.arith_div(&rhs),
        Op::Rem => lhs.arith_rem(&rhs),
        Op::Pow => lhs.arith_pow(&rhs),
        Op::Eq => Ok(Value::Bool(lhs.loose_eq(&rhs))),
        Op::Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
        Op::Lt => ordered(|o| o == Ordering::Less),
        Op::Le => ordered(|o| o != Ordering::Greater),
        Op::Gt => ordered(|o| o == Ordering::Greater),
        Op::Ge => ordered(|o| o != Ordering::Less),
        // Both operands are already evaluated; only the result is selected.
        Op::And => Ok(if lhs.is_truthy() { rhs } else { lhs }),
        Op::Or => Ok(if lhs.is_truthy() { lhs } else { rhs }),
        Op::Match | Op::Neg | Op::Not => Err(Error::Internal(format!(
            "'{op}' is not a binary operator"
        ))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::builtins::is_builtin;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    #[derive(Default)]
    struct TestCtx {
        vars: HashMap<String, Value>,
        functions: HashMap<String, Function>,
    }

    impl TestCtx {
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }

        fn with_fn(mut self, name: &str, f: Function) -> Self {
            self.functions.insert(name.into(), f);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn get_var(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }
        fn set_capture(&mut self, index: usize, text: &str) {
            self.vars.insert(format!("${index}"), Value::from(text));
        }
        fn function(&self, name: &str) -> Option<Function> {
            if is_builtin(name) {
                return Builtin::from_name(name).map(Function::Builtin);
            }
            self.functions.get(name).cloned()
        }
    }

    fn run_ctx(tokens: Vec<Token>, ctx: &mut TestCtx) -> Result<Value> {
        Evaluator::new(ctx, Limits::default()).run(&Program::new(tokens))
    }

    fn run(tokens: Vec<Token>) -> Result<Value> {
        run_ctx(tokens, &mut TestCtx::default())
    }

    fn n(x: f64) -> Token {
        Token::Number(x)
    }

    fn op(o: Op) -> Token {
        Token::Op(o)
    }

    fn user(params: &[&str], body: Vec<Token>) -> Function {
        Function::User(Arc::new(UserFunction {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Program::new(body),
        }))
    }

    #[test]
    fn arithmetic() {
        // 2 3 4 * + → 14
        assert_eq!(
            run(vec![n(2.0), n(3.0), n(4.0), op(Op::Mul), op(Op::Add)]),
            Ok(Value::Number(14.0))
        );
        // 2 3 2 ^ ^ → 512
        assert_eq!(
            run(vec![n(2.0), n(3.0), n(2.0), op(Op::Pow), op(Op::Pow)]),
            Ok(Value::Number(512.0))
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(run(vec![n(2.0), n(2.0), op(Op::Pow), op(Op::Neg)]), Ok(Value::Number(-4.0)));
        assert_eq!(run(vec![n(0.0), op(Op::Not)]), Ok(Value::Bool(true)));
    }

    #[test]
    fn comparisons_yield_booleans() {
        assert_eq!(run(vec![n(2.0), n(3.0), op(Op::Lt)]), Ok(Value::Bool(true)));
        assert_eq!(run(vec![n(3.0), n(3.0), op(Op::Ge)]), Ok(Value::Bool(true)));
        assert_eq!(run(vec![n(3.0), n(3.0), op(Op::Ne)]), Ok(Value::Bool(false)));
        assert_eq!(
            run(vec![n(f64::NAN), n(1.0), op(Op::Le)]),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn logical_ops_preserve_operands() {
        assert_eq!(run(vec![n(0.0), n(5.0), op(Op::And)]), Ok(Value::Number(0.0)));
        assert_eq!(run(vec![n(1.0), n(2.0), op(Op::And)]), Ok(Value::Number(2.0)));
        assert_eq!(run(vec![n(0.0), n(7.0), op(Op::Or)]), Ok(Value::Number(7.0)));
        assert_eq!(run(vec![n(3.0), n(7.0), op(Op::Or)]), Ok(Value::Number(3.0)));
    }

    #[test]
    fn logical_ops_evaluate_both_sides() {
        // 0 && ("abc" =~ /(b)/) still binds $1.
        let mut ctx = TestCtx::default();
        let result = run_ctx(
            vec![
                n(0.0),
                Token::Str("abc".into()),
                Token::Regex {
                    pattern: "(b)".into(),
                    flags: String::new(),
                },
                op(Op::Match),
                op(Op::And),
            ],
            &mut ctx,
        );
        assert_eq!(result, Ok(Value::Number(0.0)));
        assert_eq!(ctx.vars.get("$1"), Some(&Value::from("b")));
    }

    #[test]
    fn match_binds_captures() {
        let mut ctx = TestCtx::default();
        let result = run_ctx(
            vec![
                Token::Str("Foo,Bar".into()),
                Token::Regex {
                    pattern: "^([fo]+),(bar)$".into(),
                    flags: "i".into(),
                },
                op(Op::Match),
            ],
            &mut ctx,
        );
        assert_eq!(result, Ok(Value::Number(1.0)));
        assert_eq!(ctx.vars.get("$0"), Some(&Value::from("Foo,Bar")));
        assert_eq!(ctx.vars.get("$1"), Some(&Value::from("Foo")));
        assert_eq!(ctx.vars.get("$2"), Some(&Value::from("Bar")));
    }

    #[test]
    fn failed_match_leaves_captures() {
        let mut ctx = TestCtx::default().with("$1", Value::from("old"));
        let result = run_ctx(
            vec![
                Token::Str("xyz".into()),
                Token::Regex {
                    pattern: "(a)".into(),
                    flags: String::new(),
                },
                op(Op::Match),
            ],
            &mut ctx,
        );
        assert_eq!(result, Ok(Value::Number(0.0)));
        assert_eq!(ctx.vars.get("$1"), Some(&Value::from("old")));
    }

    #[test]
    fn match_accepts_delimited_string() {
        let result = run(vec![
            Token::Str("ABC".into()),
            Token::Str("/b/i".into()),
            op(Op::Match),
        ]);
        assert_eq!(result, Ok(Value::Number(1.0)));
    }

    #[test]
    fn invalid_regex() {
        let result = run(vec![
            Token::Str("a".into()),
            Token::Regex {
                pattern: "(".into(),
                flags: String::new(),
            },
            op(Op::Match),
        ]);
        assert!(matches!(result, Err(Error::InvalidRegex(_))));
        let result = run(vec![Token::Str("a".into()), n(1.0), op(Op::Match)]);
        assert!(matches!(result, Err(Error::InvalidRegex(_))));
    }

    #[test]
    fn regex_outside_match_is_type_error() {
        let result = run(vec![
            Token::Regex {
                pattern: "a".into(),
                flags: String::new(),
            },
            n(1.0),
            op(Op::Add),
        ]);
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn variables_and_overlay() {
        let mut ctx = TestCtx::default().with("x", Value::Number(7.0));
        assert_eq!(
            run_ctx(vec![Token::Var("x".into()), n(1.0), op(Op::Add)], &mut ctx),
            Ok(Value::Number(8.0))
        );
        assert_eq!(
            run(vec![Token::Var("nope".into())]),
            Err(Error::UndefinedVariable("nope".into()))
        );
    }

    #[test]
    fn json_literal_and_index() {
        let result = run(vec![
            Token::Json(r#"{"a": [1, 2, 3]}"#.into()),
            Token::Str("a".into()),
            Token::Index,
            n(2.0),
            Token::Index,
        ]);
        assert_eq!(result, Ok(Value::Number(3.0)));
        assert!(matches!(
            run(vec![Token::Json("[1,".into())]),
            Err(Error::InvalidLiteral { .. })
        ));
        assert_eq!(
            run(vec![n(5.0), n(0.0), Token::Index]),
            Err(Error::InvalidSelector)
        );
    }

    #[test]
    fn builtin_call() {
        let result = run(vec![
            n(16.0),
            Token::Call {
                name: "sqrt".into(),
                argc: 1,
            },
        ]);
        assert_eq!(result, Ok(Value::Number(4.0)));
    }

    #[test]
    fn user_function_call() {
        // f(x, y) = x - y
        let f = user(
            &["x", "y"],
            vec![Token::Var("x".into()), Token::Var("y".into()), op(Op::Sub)],
        );
        let mut ctx = TestCtx::default().with_fn("f", f);
        let call = Token::Call {
            name: "f".into(),
            argc: 2,
        };
        assert_eq!(
            run_ctx(vec![n(10.0), n(4.0), call], &mut ctx),
            Ok(Value::Number(6.0))
        );
    }

    #[test]
    fn parameters_shadow_globals() {
        let f = user(&["x"], vec![Token::Var("x".into())]);
        let mut ctx = TestCtx::default()
            .with("x", Value::Number(100.0))
            .with_fn("f", f);
        let call = Token::Call {
            name: "f".into(),
            argc: 1,
        };
        assert_eq!(run_ctx(vec![n(1.0), call], &mut ctx), Ok(Value::Number(1.0)));
    }

    #[test]
    fn user_function_arity_checked_at_call() {
        let f = user(&["x", "y"], vec![Token::Var("x".into())]);
        let mut ctx = TestCtx::default().with_fn("f", f);
        let call = Token::Call {
            name: "f".into(),
            argc: 1,
        };
        let err = run_ctx(vec![n(1.0), call], &mut ctx).unwrap_err();
        assert!(err.to_string().contains("1 given, 2 expected"));
    }

    #[test]
    fn host_and_builtin_arity_checked_at_call() {
        let host = HostFunction::new(1, |args| Ok(args[0].clone()));
        let mut ctx = TestCtx::default().with_fn("h", Function::Host(host));
        let call = Token::Call {
            name: "h".into(),
            argc: 2,
        };
        assert_eq!(
            run_ctx(vec![n(1.0), n(2.0), call], &mut ctx),
            Err(Error::ArgumentCount {
                name: "h".into(),
                given: 2,
                expected: 1,
            })
        );
        let call = Token::Call {
            name: "sqrt".into(),
            argc: 2,
        };
        assert!(matches!(
            run_ctx(vec![n(4.0), n(9.0), call], &mut ctx),
            Err(Error::ArgumentCount { given: 2, expected: 1, .. })
        ));
    }

    #[test]
    fn unbounded_recursion_is_stopped() {
        // loop(x) = loop(x)
        let f = user(
            &["x"],
            vec![
                Token::Var("x".into()),
                Token::Call {
                    name: "loop".into(),
                    argc: 1,
                },
            ],
        );
        let mut ctx = TestCtx::default().with_fn("loop", f);
        let call = Token::Call {
            name: "loop".into(),
            argc: 1,
        };
        assert_eq!(
            run_ctx(vec![n(1.0), call], &mut ctx),
            Err(Error::RecursionLimit(Limits::default().max_depth))
        );
    }

    #[test]
    fn step_limit() {
        let mut ctx = TestCtx::default();
        let limits = Limits {
            max_depth: 10,
            max_steps: 3,
        };
        let program = Program::new(vec![n(1.0), n(2.0), op(Op::Add), n(3.0), op(Op::Add)]);
        assert_eq!(
            Evaluator::new(&mut ctx, limits).run(&program),
            Err(Error::StepLimit(3))
        );
    }

    #[test]
    fn host_function_call() {
        let host = HostFunction::new(2, |args| {
            Ok(Value::Number(
                args[0].as_number().unwrap_or(0.0) * 10.0 + args[1].as_number().unwrap_or(0.0),
            ))
        });
        let failing = HostFunction::new(0, |_| Err("nope".to_owned()));
        let mut ctx = TestCtx::default()
            .with_fn("join", Function::Host(host))
            .with_fn("fail", Function::Host(failing));
        let call = Token::Call {
            name: "join".into(),
            argc: 2,
        };
        assert_eq!(
            run_ctx(vec![n(1.0), n(2.0), call], &mut ctx),
            Ok(Value::Number(12.0))
        );
        let call = Token::Call {
            name: "fail".into(),
            argc: 0,
        };
        assert_eq!(
            run_ctx(vec![call], &mut ctx),
            Err(Error::HostFunction {
                name: "fail".into(),
                message: "nope".into()
            })
        );
    }

    #[test]
    fn leftover_operands_are_internal_errors() {
        let err = run(vec![n(1.0), n(2.0)]).unwrap_err();
        assert_eq!(err.category(), crate::script::error::ErrorCategory::Internal);
        let err = run(vec![op(Op::Add)]).unwrap_err();
        assert_eq!(err.category(), crate::script::error::ErrorCategory::Internal);
        let err = run(vec![]).unwrap_err();
        assert_eq!(err.category(), crate::script::error::ErrorCategory::Internal);
    }

    #[test]
    fn missing_argument_is_internal_error() {
        let f = user(&["x", "y"], vec![Token::Var("x".into())]);
        let mut ctx = TestCtx::default().with_fn("f", f);
        let call = Token::Call {
            name: "f".into(),
            argc: 2,
        };
        let err = run_ctx(vec![n(1.0), call], &mut ctx).unwrap_err();
        assert_eq!(err.category(), crate::script::error::ErrorCategory::Internal);
    }

    #[test]
    fn undefined_function() {
        let call = Token::Call {
            name: "nope".into(),
            argc: 0,
        };
        assert_eq!(run(vec![call]), Err(Error::UndefinedFunction("nope".into())));
    }
}
