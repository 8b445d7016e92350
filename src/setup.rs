/// The bitwise calculator grammar.
///
/// A second full grammar over the same value model, where `+` is OR and `*`
/// is AND, literals truncate to integers, and the constant table carries the
/// machine integer limits. Switched to with the `/switch` command.
pub mod binary;
/// The chemical sub-evaluator.
///
/// An independently-configured engine (own context, own tables) that knows
/// only `+`, `*`, juxtaposition and the element masses, plus the compound
/// string rewrite feeding it. Reached through the default grammar's
/// `chem.M` function.
pub mod chemical;
/// The interactive command layer.
///
/// Implements the `/command` dispatcher used by the REPL: context getters
/// and setters, history access, clearing, grammar switching and the table
/// listing.
pub mod commands;
/// The default calculator grammar.
///
/// Registers the arithmetic/comparison/logical operators, the function set
/// (including `chem.M` and the date functions), and the constant tables
/// into an engine.
pub mod default;

use std::{
    cell::RefCell,
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

use rug::{Float, Integer, rand::RandState};

use crate::{
    error::{Error, ParseError, RuntimeError},
    interpreter::{
        context::{MathContext, RoundMode, check_base},
        history::History,
        registry::{BinaryFn, Engine, FunctionFn},
        value::{Operand, Value},
    },
};

#[derive(Debug, Clone)]
/// The runtime options a session starts from, resolved from the command
/// line and the environment by the caller.
pub struct Options {
    /// Working precision in bits.
    pub precision:     u32,
    /// Rounding mode.
    pub rounding:      RoundMode,
    /// Output digit count; `0` for exact read-back.
    pub digits:        usize,
    /// Base for rendering numbers.
    pub output_base:   i32,
    /// Base for reading numeric literals.
    pub input_base:    i32,
    /// Juxtaposition precedence offset relative to multiplication, clamped
    /// to its sign; `None` disables juxtaposition.
    pub juxtaposition: Option<i32>,
    /// strftime-style timestamp output format.
    pub date_format:   String,
    /// Random seed; `0` seeds from the clock.
    pub seed:          u32,
    /// Start in the bitwise grammar.
    pub binary:        bool,
    /// Run the interactive loop.
    pub interactive:   bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { precision:     128,
               rounding:      RoundMode::Nearest,
               digits:        30,
               output_base:   10,
               input_base:    10,
               juxtaposition: Some(-1),
               date_format:   String::from("%Y-%m-%d %H:%M:%S"),
               seed:          0,
               binary:        false,
               interactive:   false, }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which grammar the session currently evaluates with.
pub enum Mode {
    /// The default calculator grammar.
    Default,
    /// The bitwise grammar.
    Binary,
}

impl Mode {
    /// Returns the display name of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Binary => "Binary",
        }
    }
}

/// One calculator session: the shared context, the result history, the
/// random state, and the two switchable engine instances.
///
/// The default and bitwise engines deliberately share one context (so base
/// and precision settings follow a `/switch`), while the chemical engine
/// buried behind `chem.M` owns a private one.
pub struct Session {
    /// The evaluation context shared by both switchable engines.
    pub context:            Rc<RefCell<MathContext>>,
    /// The result history feeding `ans`.
    pub history:            Rc<RefCell<History>>,
    /// The seeded random state feeding `random`.
    pub rng:                Rc<RefCell<RandState<'static>>>,
    /// The grammar statements are currently evaluated with.
    pub mode:               Mode,
    /// The configured juxtaposition offset, kept for re-toggling.
    pub juxtaposition:      Option<i32>,
    /// The configured random seed (`0` = seeded from the clock).
    pub seed:               u32,
    /// Set by `/exit`; the interactive loop stops at the next prompt.
    pub quit:               bool,
    /// Set by `/clear h`; the interactive loop clears its line history.
    pub clear_line_history: bool,
    default_engine:         Engine,
    binary_engine:          Engine,
}

impl Session {
    /// Builds a session: one shared context, one history, one random state,
    /// and both grammars fully registered.
    #[must_use]
    pub fn new(options: &Options) -> Self {
        let context = Rc::new(RefCell::new(MathContext { precision:   options.precision,
                                                         rounding:    options.rounding,
                                                         input_base:  options.input_base,
                                                         output_base: options.output_base,
                                                         digits:      options.digits,
                                                         date_format: options.date_format
                                                                             .clone(), }));
        let history = Rc::new(RefCell::new(History::new()));
        let rng = Rc::new(RefCell::new(RandState::new()));

        let mut default_engine = Engine::new(Rc::clone(&context));
        default::install(&mut default_engine, &history, &rng, options.juxtaposition);

        let mut binary_engine = Engine::new(Rc::clone(&context));
        binary::install(&mut binary_engine, &history, options.juxtaposition);

        let mut session = Self { context,
                                 history,
                                 rng,
                                 mode: if options.binary { Mode::Binary } else { Mode::Default },
                                 juxtaposition: options.juxtaposition,
                                 seed: options.seed,
                                 quit: false,
                                 clear_line_history: false,
                                 default_engine,
                                 binary_engine, };
        session.reseed(options.seed);
        session
    }

    /// Returns the engine selected by the current mode.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        match self.mode {
            Mode::Default => &self.default_engine,
            Mode::Binary => &self.binary_engine,
        }
    }

    /// Evaluates one statement and records its result in the history.
    ///
    /// # Errors
    /// Propagates the engine's error; nothing is recorded in that case.
    pub fn evaluate_statement(&mut self, source: &str) -> Result<Value, Error> {
        let value = self.engine().evaluate(source)?;
        self.history.borrow_mut().append(value.clone());
        Ok(value)
    }

    /// Takes the names the last statement auto-declared but never assigned.
    #[must_use]
    pub fn take_unbound(&self) -> Vec<String> {
        self.engine().take_unbound()
    }

    /// Re-registers the juxtaposition operator on both grammars.
    pub fn set_juxtaposition(&mut self, offset: Option<i32>) {
        self.juxtaposition = offset;
        let context = Rc::clone(&self.context);
        default::install_juxtaposition(&mut self.default_engine, &context, offset);
        binary::install_juxtaposition(&mut self.binary_engine, &context, offset);
    }

    /// Toggles between the default and bitwise grammars.
    pub fn switch_mode(&mut self) -> Mode {
        self.mode = match self.mode {
            Mode::Default => Mode::Binary,
            Mode::Binary => Mode::Default,
        };
        self.mode
    }

    /// Reseeds the random state; a seed of `0` draws one from the clock.
    pub fn reseed(&mut self, seed: u32) {
        self.seed = seed;
        let resolved = if seed == 0 { entropy_seed() } else { seed };
        self.rng.borrow_mut().seed(&Integer::from(resolved));
    }

    /// Removes user variables from both grammars, keeping constants.
    pub fn clear_variables(&self) {
        self.default_engine.clear_variables();
        self.binary_engine.clear_variables();
    }
}

#[allow(clippy::cast_possible_truncation)]
fn entropy_seed() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH)
                     .map_or(1, |elapsed| elapsed.subsec_nanos() ^ elapsed.as_secs() as u32)
                     .max(1)
}

/// Splits an input line into `;`-separated statements, leaving separators
/// inside string literals alone.
#[must_use]
pub fn split_statements(line: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in line.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            current.push(c);
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                current.push(c);
            },
            ';' => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    statements.push(current);
    statements
}

/// The `=` operator shared by both grammars: requires a variable on the
/// left, stores the right-hand value, and yields the variable itself so
/// assignments chain.
pub(crate) fn assignment() -> BinaryFn {
    Rc::new(|lhs, rhs| match lhs.as_variable() {
        Some(variable) => {
            variable.assign(rhs.value());
            Ok(Operand::Variable(Rc::clone(variable)))
        },
        None => Err(ParseError::AssignmentTarget.into()),
    })
}

/// The `ans` builtin shared by both grammars: yields a past result, the
/// most recent one when called without arguments.
pub(crate) fn ans_function(history: &Rc<RefCell<History>>) -> FunctionFn {
    let history = Rc::clone(history);
    Rc::new(move |args| {
        let history = history.borrow();
        let value = if args.is_empty() {
            history.latest()?
        } else {
            let index = args[0].value();
            history.at(to_signed(&index)?)?
        };
        Ok(Operand::Value(value.clone()))
    })
}

/// The `bconv` builtin shared by both grammars: converts a string in an
/// explicit base, independent of the configured input base.
pub(crate) fn bconv_function(context: &Rc<RefCell<MathContext>>) -> FunctionFn {
    let context = Rc::clone(context);
    Rc::new(move |args| {
        let text = args[0].value();
        let text = text.as_text()?.to_string();
        let base = args[1].value();
        let base = i32::try_from(to_signed(&base)?).map_err(|_| RuntimeError::IntegerConversion)?;
        check_base(base)?;

        let incomplete = Float::parse_radix(&text, base)
            .map_err(|_| ParseError::InvalidNumber { literal: text.clone() })?;
        Ok(Operand::Value(Value::Number(context.borrow().number(incomplete))))
    })
}

/// Truncates a numeric value to an arbitrary-precision integer.
pub(crate) fn to_integer(value: &Value) -> Result<Integer, Error> {
    let number = value.as_number()?;
    let truncated = Float::with_val(number.prec(), number.trunc_ref());
    Ok(truncated.to_integer().ok_or(RuntimeError::IntegerConversion)?)
}

/// Truncates a numeric value to an `i64`.
pub(crate) fn to_signed(value: &Value) -> Result<i64, Error> {
    Ok(to_integer(value)?.to_i64().ok_or(RuntimeError::IntegerConversion)?)
}

/// Truncates a numeric value to a `u32`, for shift amounts.
pub(crate) fn to_unsigned(value: &Value) -> Result<u32, Error> {
    Ok(to_integer(value)?.to_u32().ok_or(RuntimeError::IntegerConversion)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_splitting_honors_strings() {
        assert_eq!(split_statements("1+1; 2+2"), vec!["1+1", " 2+2"]);
        assert_eq!(split_statements(r#"x = "a;b"; 3"#), vec![r#"x = "a;b""#, " 3"]);
        assert_eq!(split_statements("plain"), vec!["plain"]);
    }

    #[test]
    fn seeds_are_never_zero() {
        assert!(entropy_seed() >= 1);
    }
}
