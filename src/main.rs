use std::{
    hash::{DefaultHasher, Hash, Hasher},
    io::{BufRead, IsTerminal},
};

use clap::Parser;
use reckon::{
    interpreter::context::{RoundMode, check_base},
    setup::{self, Options, Session, commands},
};
use rustyline::{DefaultEditor, error::ReadlineError};

/// reckon is a command-line calculator over arbitrary-precision numbers,
/// strings, timestamps and durations, with a runtime-extensible grammar.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Add an expression
    #[arg(short = 'x', long = "expr", value_name = "EXPR")]
    expressions: Vec<String>,

    /// Set precision (bits)
    #[arg(short, long, env = "RECKON_PREC")]
    prec: Option<u32>,

    /// Set rounding mode (N, Z, U, D, A, F, NA)
    #[arg(short, long, env = "RECKON_RMODE")]
    rmode: Option<String>,

    /// Set output precision (number of digits)
    #[arg(short = 'n', long, env = "RECKON_DIGITS")]
    digits: Option<usize>,

    /// Set output base
    #[arg(short = 'b', long, env = "RECKON_OBASE")]
    obase: Option<i32>,

    /// Set input base
    #[arg(short = 'B', long, env = "RECKON_IBASE")]
    ibase: Option<i32>,

    /// Set output and input base
    #[arg(long, env = "RECKON_BASE")]
    base: Option<i32>,

    /// Set juxtaposition operator precedence (-1, 0, 1 or off)
    #[arg(short = 'j', long, env = "RECKON_JUXTA", allow_hyphen_values = true)]
    juxta: Option<String>,

    /// Set date output format
    #[arg(short = 'd', long, env = "RECKON_DATE_OFMT")]
    date_ofmt: Option<String>,

    /// Set random seed (number)
    #[arg(short = 'z', long, env = "RECKON_SEED")]
    seed: Option<u32>,

    /// Set random seed (string)
    #[arg(short = 'Z', long)]
    seedstr: Option<String>,

    /// Start in binary (bitwise) mode
    #[arg(long)]
    binary: bool,

    /// Enable interactive mode
    #[arg(short, long, env = "RECKON_INTERACTIVE")]
    interactive: bool,

    /// List available operators/functions/variables
    #[arg(short, long, value_name = "PATTERN", num_args = 0..=1, default_missing_value = ".*")]
    list: Option<String>,

    /// Expressions
    #[arg(value_name = "EXPR")]
    trailing: Vec<String>,
}

fn main() {
    let args = Args::parse();
    let options = resolve_options(&args);
    let mut session = Session::new(&options);

    if let Some(pattern) = &args.list {
        match commands::render_listing(session.engine(), &session.context.borrow(), pattern) {
            Ok(listing) => println!("{listing}"),
            Err(error) => fail(&error.to_string()),
        }
        return;
    }

    let stdin = std::io::stdin();
    let piped = !stdin.is_terminal();
    if piped {
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => evaluate_line(&mut session, &line),
                Err(error) => fail(&error.to_string()),
            }
        }
    }

    let expressions: Vec<&String> = args.expressions.iter().chain(args.trailing.iter()).collect();
    if expressions.is_empty() && !options.interactive && !piped {
        fail("No expression specified");
    }
    for expression in expressions {
        evaluate_line(&mut session, expression);
    }

    if options.interactive {
        interact(&mut session);
    }
}

/// Folds command-line arguments and environment fallbacks into the session
/// options, validating ranges up front.
fn resolve_options(args: &Args) -> Options {
    let mut options = Options::default();

    if let Some(precision) = args.prec {
        if precision < rug::float::prec_min() || precision > rug::float::prec_max() {
            fail(&format!("Precision out of range: {precision}"));
        }
        options.precision = precision;
    }
    if let Some(name) = &args.rmode {
        match RoundMode::parse(name) {
            Ok(mode) => options.rounding = mode,
            Err(error) => fail(&error.to_string()),
        }
    }
    if let Some(digits) = args.digits {
        options.digits = digits;
    }

    if let Some(base) = args.base {
        options.input_base = base;
        options.output_base = base;
    }
    if let Some(base) = args.obase {
        options.output_base = base;
    }
    if let Some(base) = args.ibase {
        options.input_base = base;
    }
    for base in [options.input_base, options.output_base] {
        if let Err(error) = check_base(base) {
            fail(&error.to_string());
        }
    }

    if let Some(juxta) = &args.juxta {
        options.juxtaposition = match juxta.as_str() {
            "off" | "none" => None,
            value => match value.parse::<i32>() {
                Ok(offset) => Some(offset.signum()),
                Err(_) => fail(&format!("Invalid juxtaposition precedence: {value}")),
            },
        };
    }

    if let Some(format) = &args.date_ofmt {
        if let Err(error) = commands::check_date_format(format) {
            fail(&error.to_string());
        }
        options.date_format.clone_from(format);
    }

    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    if let Some(text) = &args.seedstr {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let hashed = hasher.finish() as u32;
        options.seed = hashed;
    }

    options.binary = args.binary;
    options.interactive = args.interactive;
    options
}

/// Evaluates one input line statement by statement, printing results to
/// stdout and diagnostics to stderr. Errors abort only their own statement.
fn evaluate_line(session: &mut Session, line: &str) {
    for statement in setup::split_statements(line) {
        if statement.trim().is_empty() {
            continue;
        }

        match session.evaluate_statement(&statement) {
            Ok(value) => println!("{}", value.render(&session.context.borrow())),
            Err(error) => eprintln!("*** Error: {error}"),
        }

        let unbound = session.take_unbound();
        if !unbound.is_empty() {
            eprintln!("*** Warning: Uninitialized variable(s): {}", unbound.join(", "));
        }
    }
}

/// The interactive loop: expressions evaluate, `/name` lines dispatch to
/// the command layer, and every non-empty line lands in the edit history.
fn interact(session: &mut Session) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => fail(&error.to_string()),
    };

    while !session.quit {
        match editor.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);

                if let Some(command) = input.strip_prefix('/') {
                    match commands::execute(session, command) {
                        Ok(Some(output)) => println!("{output}"),
                        Ok(None) => {},
                        Err(error) => eprintln!("*** Command error: {error}"),
                    }
                    if session.clear_line_history {
                        let _ = editor.clear_history();
                        session.clear_line_history = false;
                    }
                } else {
                    evaluate_line(session, input);
                }
            },
            Err(ReadlineError::Interrupted) => {},
            Err(ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("*** Error: {error}");
                break;
            },
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("*** Error: {message}");
    std::process::exit(1);
}
