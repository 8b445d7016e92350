use std::hash::{DefaultHasher, Hash, Hasher};

use regex::Regex;

use crate::{
    error::{Error, RuntimeError},
    interpreter::{
        context::{MathContext, RoundMode, check_base},
        registry::{Engine, UNLIMITED_ARGUMENTS},
    },
    setup::Session,
};

/// Executes one interactive command line (without its leading `/`).
///
/// Setters invoked with no argument report the current value instead.
/// Returns the text to print, if any.
///
/// # Errors
/// Returns `RuntimeError::UnknownCommand` for unrecognized names and
/// command-specific errors for unusable arguments.
pub fn execute(session: &mut Session, input: &str) -> Result<Option<String>, Error> {
    let input = input.trim();
    let (name, rest) = match input.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest),
        None => (input, ""),
    };
    let args = split_arguments(rest);

    match name {
        "prec" => precision(session, &args),
        "rmode" => rounding_mode(session, &args),
        "rmodes" => Ok(Some(rounding_modes())),
        "digits" => digits(session, &args),
        "obase" => base(session, &args, false, true),
        "ibase" => base(session, &args, true, false),
        "base" => combined_base(session, &args),
        "jpo" => juxtaposition(session, &args),
        "date_ofmt" => date_format(session, &args),
        "seed" => seed(session, &args),
        "seedstr" => seed_string(session, &args),
        "ans" => answers(session, &args),
        "clear" => clear(session, &args),
        "switch" => switch(session, &args),
        "list" => {
            let pattern = args.first().map_or(".*", String::as_str);
            Ok(Some(render_listing(session.engine(), &session.context.borrow(), pattern)?))
        },
        "exit" => {
            session.quit = true;
            Ok(None)
        },
        _ => Err(RuntimeError::UnknownCommand { name: name.to_string() }.into()),
    }
}

fn precision(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let Some(arg) = args.first() else {
        return Ok(Some(session.context.borrow().precision.to_string()));
    };

    let value: u32 = arg.parse()
                        .map_err(|_| RuntimeError::CommandUsage { usage: String::from("/prec [bits]") })?;
    if value < rug::float::prec_min() || value > rug::float::prec_max() {
        return Err(RuntimeError::PrecisionOutOfRange { value }.into());
    }

    session.context.borrow_mut().precision = value;
    Ok(None)
}

fn rounding_mode(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let Some(arg) = args.first() else {
        let mode = session.context.borrow().rounding;
        return Ok(Some(format!("{} ({})", mode.name(), mode.description())));
    };

    session.context.borrow_mut().rounding = RoundMode::parse(arg)?;
    Ok(None)
}

fn rounding_modes() -> String {
    let modes = [RoundMode::Nearest,
                 RoundMode::TowardZero,
                 RoundMode::Up,
                 RoundMode::Down,
                 RoundMode::AwayZero,
                 RoundMode::Faithful,
                 RoundMode::NearestAway];
    modes.iter()
         .map(|mode| format!("{:<4}- {}", mode.name(), mode.description()))
         .collect::<Vec<_>>()
         .join("\n")
}

fn digits(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let Some(arg) = args.first() else {
        return Ok(Some(session.context.borrow().digits.to_string()));
    };

    let value: usize = arg.parse()
                          .map_err(|_| RuntimeError::CommandUsage { usage: String::from("/digits [count]") })?;
    session.context.borrow_mut().digits = value;
    Ok(None)
}

fn base(session: &mut Session,
        args: &[String],
        input: bool,
        output: bool)
        -> Result<Option<String>, Error> {
    let Some(arg) = args.first() else {
        let context = session.context.borrow();
        let current = if input { context.input_base } else { context.output_base };
        return Ok(Some(current.to_string()));
    };

    let value: i32 = arg.parse()
                        .map_err(|_| RuntimeError::CommandUsage { usage: String::from("/obase|/ibase [base]") })?;
    check_base(value)?;

    let mut context = session.context.borrow_mut();
    if input {
        context.input_base = value;
    }
    if output {
        context.output_base = value;
    }
    Ok(None)
}

/// `/base` reports or sets both bases: one argument sets both, two set the
/// output base then the input base.
fn combined_base(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    match args.len() {
        0 => {
            let context = session.context.borrow();
            Ok(Some(format!("{}, {}", context.output_base, context.input_base)))
        },
        1 => {
            base(session, args, true, true)?;
            Ok(None)
        },
        2 => {
            base(session, &args[..1], false, true)?;
            base(session, &args[1..], true, false)?;
            Ok(None)
        },
        _ => Err(RuntimeError::CommandUsage { usage: String::from("/base [obase [ibase]]") }.into()),
    }
}

fn juxtaposition(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let Some(arg) = args.first() else {
        let current = session.juxtaposition
                             .map_or_else(|| String::from("off"), |offset| offset.to_string());
        return Ok(Some(current));
    };

    if arg == "off" || arg == "none" {
        session.set_juxtaposition(None);
        return Ok(None);
    }

    let offset: i32 = arg.parse()
                         .map_err(|_| RuntimeError::CommandUsage { usage: String::from("/jpo [-1|0|1|off]") })?;
    session.set_juxtaposition(Some(offset.signum()));
    Ok(None)
}

fn date_format(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let Some(format) = args.first() else {
        return Ok(Some(session.context.borrow().date_format.clone()));
    };

    check_date_format(format)?;
    session.context.borrow_mut().date_format = format.clone();
    Ok(None)
}

/// Rejects format strings the date renderer would fail on.
///
/// # Errors
/// Returns `RuntimeError::InvalidDateFormat` for unknown specifiers.
pub fn check_date_format(format: &str) -> Result<(), RuntimeError> {
    let items = chrono::format::StrftimeItems::new(format);
    for item in items {
        if matches!(item, chrono::format::Item::Error) {
            return Err(RuntimeError::InvalidDateFormat { format: format.to_string() });
        }
    }
    Ok(())
}

fn seed(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let Some(arg) = args.first() else {
        return Ok(Some(session.seed.to_string()));
    };

    let value: u32 = arg.parse()
                        .map_err(|_| RuntimeError::CommandUsage { usage: String::from("/seed [number]") })?;
    session.reseed(value);
    Ok(None)
}

fn seed_string(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let Some(arg) = args.first() else {
        return Ok(Some(session.seed.to_string()));
    };

    let mut hasher = DefaultHasher::new();
    arg.hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation)]
    let value = hasher.finish() as u32;
    session.reseed(value);
    Ok(None)
}

/// `/ans` prints the latest result, `/ans N` one result, `/ans *` all of
/// them with their absolute and relative indices, `/ans #` the count.
fn answers(session: &Session, args: &[String]) -> Result<Option<String>, Error> {
    let history = session.history.borrow();
    let context = session.context.borrow();

    let Some(arg) = args.first() else {
        return Ok(Some(history.latest()?.render(&context)));
    };

    match arg.as_str() {
        "*" => {
            let count = history.count();
            let lines: Vec<String> =
                history.iter()
                       .enumerate()
                       .map(|(index, value)| {
                           format!("[{index}, {}] = {}",
                                   index as i64 - count as i64,
                                   value.render(&context))
                       })
                       .collect();
            Ok(Some(lines.join("\n")))
        },
        "#" => Ok(Some(history.count().to_string())),
        _ => {
            let index: i64 = arg.parse()
                                .map_err(|_| RuntimeError::CommandUsage { usage: String::from("/ans [index|*|#]") })?;
            Ok(Some(history.at(index)?.render(&context)))
        },
    }
}

/// `/clear` takes a flag string: `c` clears the screen, `h` the line
/// history, `r` the results, `v` the user variables; `all` is everything.
fn clear(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    const VALID: &str = "chrv";

    let flags = match args.first().map(String::as_str) {
        None => "c",
        Some("all") => VALID,
        Some(flags) => flags,
    };
    if flags.chars().any(|flag| !VALID.contains(flag)) {
        return Err(RuntimeError::CommandUsage { usage: String::from("/clear [chrv|all]") }.into());
    }

    let mut output = None;
    if flags.contains('c') {
        // ANSI clear screen + home.
        output = Some(String::from("\x1b[2J\x1b[1;1H"));
    }
    if flags.contains('h') {
        session.clear_line_history = true;
    }
    if flags.contains('r') {
        session.history.borrow_mut().clear();
    }
    if flags.contains('v') {
        session.clear_variables();
    }

    Ok(output)
}

fn switch(session: &mut Session, args: &[String]) -> Result<Option<String>, Error> {
    let mode = session.switch_mode();

    match args.len() {
        0 => {},
        1 => {
            base(session, args, true, true)?;
        },
        _ => {
            base(session, &args[..1], true, false)?;
            base(session, &args[1..2], false, true)?;
        },
    }

    Ok(Some(format!("Switched to '{}' mode", mode.name())))
}

/// Renders the registry tables of the given engine, filtered by a regular
/// expression over identifiers.
///
/// # Errors
/// Returns `RuntimeError::InvalidPattern` for an unparsable filter.
pub fn render_listing(engine: &Engine,
                      context: &MathContext,
                      pattern: &str)
                      -> Result<String, Error> {
    let regex =
        Regex::new(pattern).map_err(|_| RuntimeError::InvalidPattern { pattern: pattern.to_string() })?;
    let mut out = String::new();

    out.push_str("Unary operators\n");
    for operator in engine.unary_operators() {
        if regex.is_match(&operator.identifier.to_string()) {
            out.push_str(&format!("  {:<6}{:<6}{}\n",
                                  operator.identifier, operator.precedence, operator.associativity));
        }
    }

    out.push_str("\nBinary operators\n");
    for operator in engine.binary_operators() {
        if regex.is_match(&operator.identifier) {
            out.push_str(&format!("  {:<6}{:<6}{}\n",
                                  operator.identifier, operator.precedence, operator.associativity));
        }
    }

    out.push_str("\nFunctions\n");
    for function in engine.functions() {
        if regex.is_match(&function.identifier) {
            let max = if function.max_args == UNLIMITED_ARGUMENTS {
                String::from("-")
            } else {
                function.max_args.to_string()
            };
            out.push_str(&format!("  {:<15}{:<5}{}\n", function.identifier, function.min_args, max));
        }
    }

    out.push_str("\nVariables\n");
    for variable in engine.variables() {
        if regex.is_match(variable.name()) {
            out.push_str(&format!("  {:<18}{}\n", variable.name(), variable.get().render(context)));
        }
    }

    Ok(out)
}

/// Splits a command tail into whitespace-separated arguments, honoring
/// double quotes so formats with spaces survive.
fn split_arguments(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
                current.push(c);
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            } else {
                current.push(c);
            }
            continue;
        }

        if c == '"' {
            in_string = true;
            quoted = true;
        } else if c.is_whitespace() {
            if quoted || !current.is_empty() {
                args.push(std::mem::take(&mut current));
                quoted = false;
            }
        } else {
            current.push(c);
        }
    }
    if quoted || !current.is_empty() {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::Options;

    fn session() -> Session {
        Session::new(&Options::default())
    }

    #[test]
    fn arguments_split_on_whitespace_and_quotes() {
        assert_eq!(split_arguments("a b  c"), vec!["a", "b", "c"]);
        assert_eq!(split_arguments(r#""%Y-%m-%d %H:%M:%S""#), vec!["%Y-%m-%d %H:%M:%S"]);
        assert_eq!(split_arguments(""), Vec::<String>::new());
    }

    #[test]
    fn setters_report_without_arguments() {
        let mut session = session();
        assert_eq!(execute(&mut session, "prec").unwrap(), Some(String::from("128")));
        execute(&mut session, "prec 256").unwrap();
        assert_eq!(session.context.borrow().precision, 256);

        execute(&mut session, "base 16").unwrap();
        let context = session.context.borrow();
        assert_eq!((context.input_base, context.output_base), (16, 16));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let mut session = session();
        assert!(execute(&mut session, "base 99").is_err());
        assert!(execute(&mut session, "rmode Q").is_err());
        assert!(execute(&mut session, "date_ofmt %Q%Q").is_err());
        assert!(execute(&mut session, "nosuch").is_err());
    }

    #[test]
    fn switching_changes_the_grammar() {
        let mut session = session();
        let message = execute(&mut session, "switch").unwrap();
        assert_eq!(message, Some(String::from("Switched to 'Binary' mode")));
        let value = session.evaluate_statement("6 + 9").unwrap();
        assert_eq!(value.as_number().unwrap().to_f64(), 15.0);
    }
}
