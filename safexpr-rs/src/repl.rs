//! Line-oriented front end.
//!
//! Each input line is either a command (`/vars`, `/funcs`, `/quit`) or
//! something for [`Interpreter::evaluate`].  Results go to `out`; failures
//! go to `err` as `error: <message>`, in red when `color` is set.

use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;
use crossterm::tty::IsTty;

use crate::script::{Interpreter, Value};

/// Output sinks and presentation switches for a session.
pub struct Session<O, E> {
    pub out: O,
    pub err: E,
    /// Print a prompt before each line.
    pub prompt: bool,
    /// Color error messages.
    pub color: bool,
}

impl Session<io::Stdout, io::Stderr> {
    /// Session on the process streams; prompt and color follow whether
    /// stdin and stderr are terminals.
    pub fn stdio() -> Self {
        Session {
            out: io::stdout(),
            err: io::stderr(),
            prompt: io::stdin().is_tty(),
            color: io::stderr().is_tty(),
        }
    }
}

/// What the caller should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Strings are quoted in listings so `"1"` and `1` stay distinguishable.
fn listing(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}

impl<O: Write, E: Write> Session<O, E> {
    /// Handle one line.  Returns whether it succeeded along with the flow.
    pub fn line(&mut self, interp: &mut Interpreter, line: &str) -> io::Result<(bool, Flow)> {
        let line = line.trim();
        if line.is_empty() {
            return Ok((true, Flow::Continue));
        }
        match line {
            "/quit" => return Ok((true, Flow::Quit)),
            "/vars" => {
                for (name, value) in interp.vars() {
                    writeln!(self.out, "{name} = {}", listing(&value))?;
                }
                return Ok((true, Flow::Continue));
            }
            "/funcs" => {
                for (name, params) in interp.functions() {
                    writeln!(self.out, "{name}({})", params.join(", "))?;
                }
                return Ok((true, Flow::Continue));
            }
            _ => {}
        }
        if line.starts_with('/') {
            self.error(&format!("unknown command '{line}'"))?;
            return Ok((false, Flow::Continue));
        }
        match interp.evaluate(line) {
            Ok(value) => {
                writeln!(self.out, "{value}")?;
                Ok((true, Flow::Continue))
            }
            Err(e) => {
                self.error(&e.to_string())?;
                Ok((false, Flow::Continue))
            }
        }
    }

    fn error(&mut self, message: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.err, "{} {message}", "error:".red().bold())
        } else {
            writeln!(self.err, "error: {message}")
        }
    }

    /// Read lines until end of input or `/quit`.  Returns the number of
    /// lines that failed.
    pub fn run<R: BufRead>(&mut self, interp: &mut Interpreter, input: R) -> io::Result<usize> {
        let mut failures = 0;
        let mut lines = input.lines();
        loop {
            if self.prompt {
                write!(self.out, "> ")?;
                self.out.flush()?;
            }
            let Some(line) = lines.next() else { break };
            let (ok, flow) = self.line(interp, &line?)?;
            if !ok {
                failures += 1;
            }
            if flow == Flow::Quit {
                break;
            }
        }
        Ok(failures)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
