//! Expression lexer and infix-to-postfix converter.
//!
//! A single left-to-right pass classifies lexemes and runs the shunting-yard
//! algorithm over them, producing a [`Program`].  Lexing is context
//! sensitive; the state that decides how the next character is read lives in
//! [`Scan`]:
//!
//! - `-` and `!` are unary when an operand is expected.
//! - `/` starts a regex literal only right after `=~`.
//! - `[` after a completed operand opens an index selector, which sits on
//!   the operator stack like a parenthesis until its `]`; anywhere else `[`
//!   opens an array literal.
//! - A name immediately followed by `(` is a call only if the context knows
//!   the function; otherwise the parenthesis multiplies the variable.
//! - An operand, call or `(` directly after a completed operand is joined to
//!   it with an implicit `*`.

use super::{
    error::{Error, Result},
    eval::EvalContext,
    token::{Op, Program, Token},
    value::Value,
};

/// What the scanner accepts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// Start of an operand: literal, name, `(`, or a unary operator.
    Operand,
    /// Right after `name(`; like `Operand` but also admits `)`.
    FirstArgument,
    /// An operand was just completed.
    Operator,
}

#[derive(Debug, Clone, Copy)]
struct Scan {
    expect: Expect,
    /// Set by `=~`, cleared once its right operand is consumed.
    in_pattern: bool,
    /// Operator that left the scanner expecting an operand.
    last_op: Option<Op>,
}

/// Operator-stack entry.
#[derive(Debug)]
enum Frame {
    Op(Op),
    Group,
    Call { name: String, commas: usize },
    /// Open `[` of an index selector, at byte offset `open`.
    Index { open: usize },
}

/// Convert `src` into a postfix program, consulting `ctx` to tell function
/// calls apart from variables.
pub fn convert(src: &str, ctx: &dyn EvalContext) -> Result<Program> {
    Converter::new(src, ctx).run()
}

/// Spelling of an operator as it appears in source text.
fn source_symbol(op: Op) -> &'static str {
    match op {
        Op::Neg => "-",
        other => other.symbol(),
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword(name: &str) -> Option<Value> {
    match name {
        "null" => Some(Value::Null),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

struct Converter<'a> {
    ctx: &'a dyn EvalContext,
    src: &'a str,
    pos: usize,
    scan: Scan,
    output: Vec<Token>,
    stack: Vec<Frame>,
}

impl<'a> Converter<'a> {
    fn new(src: &'a str, ctx: &'a dyn EvalContext) -> Self {
        Converter {
            ctx,
            src,
            pos: 0,
            scan: Scan {
                expect: Expect::Operand,
                in_pattern: false,
                last_op: None,
            },
            output: Vec::new(),
            stack: Vec::new(),
        }
    }

    // ── Cursor ────────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
    }

    fn expecting_operator(&self) -> bool {
        self.scan.expect == Expect::Operator
    }

    // ── Driver ────────────────────────────────────────────────────────────────

    fn run(mut self) -> Result<Program> {
        loop {
            self.skip_while(char::is_whitespace);
            let Some(c) = self.peek() else { break };
            match c {
                '"' | '\'' => {
                    let s = self.read_string(c)?;
                    self.operand(Token::Str(s))?;
                }
                '[' if self.expecting_operator() => self.open_index(),
                '[' | '{' if !self.expecting_operator() => {
                    let raw = self.read_literal()?;
                    self.operand(Token::Json(raw))?;
                }
                '{' => return Err(Error::Unexpected("'{'".into())),
                ']' | '}' => self.close_index(c)?,
                '/' if self.scan.in_pattern && !self.expecting_operator() => {
                    let regex = self.read_regex()?;
                    self.operand(regex)?;
                }
                '0'..='9' => {
                    let x = self.read_number()?;
                    self.operand(Token::Number(x))?;
                }
                '.' if self.peek_second().is_some_and(|d| d.is_ascii_digit()) => {
                    let x = self.read_number()?;
                    self.operand(Token::Number(x))?;
                }
                'a'..='z' => self.identifier()?,
                '$' => self.capture()?,
                '(' => self.open_group(),
                ')' => self.close_group()?,
                ',' => self.comma()?,
                _ => self.operator(c)?,
            }
        }
        self.finish()
    }

    fn finish(mut self) -> Result<Program> {
        if !self.expecting_operator() {
            if self.output.is_empty() && self.stack.is_empty() {
                return Err(Error::EmptyExpression);
            }
            let fallback = match self.stack.iter().rev().find(|f| !matches!(f, Frame::Op(_))) {
                Some(Frame::Index { open }) => self.malformed_index(*open),
                _ => Error::UnbalancedParen,
            };
            return Err(self.missing_operand_or(fallback));
        }
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Op(op) => self.output.push(Token::Op(op)),
                Frame::Index { open } => return Err(self.malformed_index(open)),
                Frame::Group | Frame::Call { .. } => return Err(Error::UnbalancedParen),
            }
        }
        Ok(Program::new(self.output))
    }

    /// Error for a construct that needed an operand: blame the dangling
    /// operator if there is one.
    fn missing_operand_or(&self, fallback: Error) -> Error {
        match self.scan.last_op {
            Some(op) => Error::MissingOperand(source_symbol(op)),
            None => fallback,
        }
    }

    fn malformed_index(&self, open: usize) -> Error {
        Error::MalformedIndex(self.src[open..self.pos].to_owned())
    }

    fn settle(&mut self) {
        self.scan = Scan {
            expect: Expect::Operator,
            in_pattern: false,
            last_op: None,
        };
    }

    // ── Shunting-yard steps ───────────────────────────────────────────────────

    fn operand(&mut self, token: Token) -> Result<()> {
        if self.expecting_operator() {
            match token {
                Token::Number(_) | Token::Var(_) | Token::Capture(_) | Token::Value(_) => {
                    self.binary(Op::Mul)
                }
                other => return Err(Error::Unexpected(format!("token {other}"))),
            }
        }
        self.output.push(token);
        self.settle();
        Ok(())
    }

    fn binary(&mut self, op: Op) {
        while let Some(&Frame::Op(top)) = self.stack.last() {
            if !top.yields_to(op) {
                break;
            }
            self.stack.pop();
            self.output.push(Token::Op(top));
        }
        self.stack.push(Frame::Op(op));
        self.scan.expect = Expect::Operand;
        self.scan.last_op = Some(op);
        self.scan.in_pattern = op == Op::Match;
    }

    fn operator(&mut self, c: char) -> Result<()> {
        let (op, len) = match (c, self.peek_second()) {
            ('&', Some('&')) => (Op::And, 2),
            ('|', Some('|')) => (Op::Or, 2),
            ('>', Some('=')) => (Op::Ge, 2),
            ('<', Some('=')) => (Op::Le, 2),
            ('=', Some('=')) => (Op::Eq, 2),
            ('=', Some('~')) => (Op::Match, 2),
            ('!', Some('=')) => (Op::Ne, 2),
            ('>', _) => (Op::Gt, 1),
            ('<', _) => (Op::Lt, 1),
            ('+', _) => (Op::Add, 1),
            ('-', _) => (Op::Sub, 1),
            ('*', _) => (Op::Mul, 1),
            ('/', _) => (Op::Div, 1),
            ('%', _) => (Op::Rem, 1),
            ('^', _) => (Op::Pow, 1),
            ('!', _) => (Op::Not, 1),
            ('=', _) => return Err(Error::Unexpected("'='".into())),
            _ => return Err(Error::IllegalChar(c)),
        };
        self.pos += len;

        if self.expecting_operator() {
            if op.is_unary() {
                return Err(Error::Unexpected(format!("operator '{op}'")));
            }
            self.binary(op);
            return Ok(());
        }

        let unary = match op {
            Op::Sub => Op::Neg,
            Op::Not => Op::Not,
            other => return Err(Error::Unexpected(format!("operator '{other}'"))),
        };
        // Nothing to the left can bind tighter, so push without popping.
        self.stack.push(Frame::Op(unary));
        self.scan.expect = Expect::Operand;
        self.scan.last_op = Some(unary);
        Ok(())
    }

    fn open_group(&mut self) {
        if self.expecting_operator() {
            self.binary(Op::Mul);
        }
        self.advance();
        self.stack.push(Frame::Group);
        self.scan.expect = Expect::Operand;
        self.scan.last_op = None;
    }

    fn close_group(&mut self) -> Result<()> {
        self.advance();
        match self.scan.expect {
            Expect::FirstArgument => {
                return match self.stack.pop() {
                    Some(Frame::Call { name, .. }) => self.finish_call(name, 0),
                    _ => Err(Error::Internal("argument list without a call".into())),
                };
            }
            Expect::Operand => {
                return Err(self.missing_operand_or(Error::Unexpected("')'".into())));
            }
            Expect::Operator => {}
        }
        loop {
            match self.stack.pop() {
                Some(Frame::Op(op)) => self.output.push(Token::Op(op)),
                Some(Frame::Group) => {
                    self.settle();
                    return Ok(());
                }
                Some(Frame::Call { name, commas }) => return self.finish_call(name, commas + 1),
                Some(Frame::Index { open }) => return Err(self.malformed_index(open)),
                None => return Err(Error::UnbalancedParen),
            }
        }
    }

    /// `operand[`: the selector converts in line, ahead of the index marker
    /// that its `]` emits.
    fn open_index(&mut self) {
        self.stack.push(Frame::Index { open: self.pos });
        self.advance();
        self.scan = Scan {
            expect: Expect::Operand,
            in_pattern: false,
            last_op: None,
        };
    }

    fn close_index(&mut self, c: char) -> Result<()> {
        self.advance();
        if !self.expecting_operator() {
            let fallback = match self.stack.last() {
                Some(Frame::Index { open }) => self.malformed_index(*open),
                _ => Error::Unexpected(format!("'{c}'")),
            };
            return Err(self.missing_operand_or(fallback));
        }
        loop {
            match self.stack.pop() {
                Some(Frame::Op(op)) => self.output.push(Token::Op(op)),
                Some(Frame::Index { .. }) if c == ']' => {
                    self.output.push(Token::Index);
                    self.settle();
                    return Ok(());
                }
                Some(Frame::Index { open }) => return Err(self.malformed_index(open)),
                Some(Frame::Group | Frame::Call { .. }) => return Err(Error::UnbalancedParen),
                None => return Err(Error::Unexpected(format!("'{c}'"))),
            }
        }
    }

    fn comma(&mut self) -> Result<()> {
        self.advance();
        if !self.expecting_operator() {
            return Err(self.missing_operand_or(Error::Unexpected("','".into())));
        }
        loop {
            match self.stack.last_mut() {
                Some(Frame::Op(op)) => {
                    let op = *op;
                    self.stack.pop();
                    self.output.push(Token::Op(op));
                }
                Some(Frame::Call { commas, .. }) => {
                    *commas += 1;
                    break;
                }
                Some(Frame::Group | Frame::Index { .. }) | None => {
                    return Err(Error::Unexpected("','".into()))
                }
            }
        }
        self.scan.expect = Expect::Operand;
        self.scan.last_op = None;
        Ok(())
    }

    fn finish_call(&mut self, name: String, argc: usize) -> Result<()> {
        let function = self
            .ctx
            .function(&name)
            .ok_or_else(|| Error::UndefinedFunction(name.clone()))?;
        let expected = function.arity();
        if argc != expected {
            return Err(Error::ArgumentCount {
                name,
                given: argc,
                expected,
            });
        }
        self.output.push(Token::Call { name, argc });
        self.settle();
        Ok(())
    }

    // ── Lexemes ───────────────────────────────────────────────────────────────

    fn identifier(&mut self) -> Result<()> {
        let src = self.src;
        let start = self.pos;
        self.advance();
        self.skip_while(is_word);
        let name = &src[start..self.pos];

        if let Some(literal) = keyword(name) {
            return self.operand(Token::Value(literal));
        }
        if self.peek() == Some('(') && self.ctx.function(name).is_some() {
            if self.expecting_operator() {
                self.binary(Op::Mul);
            }
            self.advance();
            self.stack.push(Frame::Call {
                name: name.to_owned(),
                commas: 0,
            });
            self.scan = Scan {
                expect: Expect::FirstArgument,
                in_pattern: false,
                last_op: None,
            };
            return Ok(());
        }
        self.operand(Token::Var(name.to_owned()))
    }

    fn capture(&mut self) -> Result<()> {
        let src = self.src;
        let start = self.pos;
        self.advance();
        self.skip_while(is_word);
        if self.pos == start + 1 {
            return Err(Error::IllegalChar('$'));
        }
        self.operand(Token::Capture(src[start..self.pos].to_owned()))
    }

    fn read_number(&mut self) -> Result<f64> {
        let src = self.src;
        let start = self.pos;
        self.skip_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            self.advance();
            self.skip_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let bytes = src.as_bytes();
            let mut ahead = self.pos + 1;
            if matches!(bytes.get(ahead), Some(b'+' | b'-')) {
                ahead += 1;
            }
            if bytes.get(ahead).is_some_and(u8::is_ascii_digit) {
                self.pos = ahead;
                self.skip_while(|c| c.is_ascii_digit());
            }
        }
        let text = &src[start..self.pos];
        text.parse()
            .map_err(|_| Error::Unexpected(format!("number '{text}'")))
    }

    fn read_string(&mut self, quote: char) -> Result<String> {
        self.advance();
        let mut s = String::new();
        loop {
            match self.advance().ok_or(Error::Unterminated("string"))? {
                '\\' => {
                    let escaped = self.advance().ok_or(Error::Unterminated("string"))?;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c if c == quote => return Ok(s),
                c => s.push(c),
            }
        }
    }

    /// `/pattern/flags`; `\/` in the body stands for a literal slash.
    fn read_regex(&mut self) -> Result<Token> {
        self.advance();
        let mut pattern = String::new();
        loop {
            match self.advance().ok_or(Error::Unterminated("regex"))? {
                '\\' if self.peek() == Some('/') => {
                    self.advance();
                    pattern.push('/');
                }
                '\\' => {
                    pattern.push('\\');
                    if let Some(c) = self.advance() {
                        pattern.push(c);
                    }
                }
                '/' => break,
                c => pattern.push(c),
            }
        }
        let src = self.src;
        let start = self.pos;
        self.skip_while(|c| c.is_ascii_alphabetic());
        Ok(Token::Regex {
            pattern,
            flags: src[start..self.pos].to_owned(),
        })
    }

    /// Byte offset just past the bracket that closes the one at the cursor.
    /// Brackets inside quoted strings are not counted.
    fn balanced_end(&self) -> Option<usize> {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        for (i, c) in self.src[self.pos..].char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '[' | '{' => depth += 1,
                ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(self.pos + i + c.len_utf8());
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn read_literal(&mut self) -> Result<String> {
        let end = self
            .balanced_end()
            .ok_or(Error::Unterminated("array or object literal"))?;
        let raw = self.src[self.pos..end].to_owned();
        self.pos = end;
        Ok(raw)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
