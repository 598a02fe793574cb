use std::io::{self, Write};
use std::process::ExitCode;

use crossterm::tty::IsTty;
use safexpr::cli::{self, ConfigFile};
use safexpr::config::Config;
use safexpr::repl::{Flow, Session};
use safexpr::script::Interpreter;
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(debug: bool) {
    // RUST_LOG wins; otherwise warnings only, or everything with -d.
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_tty())
        .with_target(false)
        .without_time()
        .init();
}

fn load_config(interp: &mut Interpreter, choice: ConfigFile) {
    let path = match choice {
        ConfigFile::Skip => return,
        ConfigFile::Explicit(path) => path,
        ConfigFile::Search => match cli::find_user_config() {
            Some(path) => path,
            None => return,
        },
    };
    match Config::load_file(&path) {
        Ok((config, errors)) => {
            let failures = config.apply(interp);
            for e in errors.iter().chain(&failures) {
                eprintln!("safexpr: {}: {e}", path.display());
            }
        }
        Err(e) => eprintln!("safexpr: warning: {}: {e}", path.display()),
    }
}

/// Evaluate command-line expressions in order; returns the failure count.
fn run_exprs<O: Write, E: Write>(
    session: &mut Session<O, E>,
    interp: &mut Interpreter,
    exprs: &[String],
) -> io::Result<usize> {
    let mut failures = 0;
    for expr in exprs {
        let (ok, flow) = session.line(interp, expr)?;
        if !ok {
            failures += 1;
        }
        if flow == Flow::Quit {
            break;
        }
    }
    Ok(failures)
}

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("safexpr: {e}");
            eprintln!("Usage: safexpr [-qd] [-f[<file>]] [-c<expr>]... [<expr>...]");
            return ExitCode::from(2);
        }
    };

    init_logging(args.debug);

    let mut interp = Interpreter::new();
    load_config(&mut interp, args.config);
    if args.quiet {
        interp.set_suppress_errors(true);
    }

    let mut session = Session::stdio();
    let result = if args.exprs.is_empty() {
        session.run(&mut interp, std::io::stdin().lock())
    } else {
        run_exprs(&mut session, &mut interp, &args.exprs)
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("safexpr: {e}");
            ExitCode::FAILURE
        }
    }
}
