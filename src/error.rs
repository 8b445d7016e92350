/// Parsing errors.
///
/// Defines all error types that can occur during lexing and parsing of an
/// expression. Parse errors include unrecognized characters, malformed
/// literals, unresolved identifiers, arity violations, and any other issue
/// the parser detects while reducing a statement.
pub mod parse_error;
/// Runtime errors.
///
/// Contains all error types that can be raised from operator and function
/// callbacks or from context reconfiguration. Runtime errors include type
/// mismatches, failed integer narrowing, invalid bases, rounding modes, and
/// date handling failures.
pub mod runtime_error;

pub use parse_error::ParseError;
pub use runtime_error::RuntimeError;

#[derive(Debug, Clone, PartialEq)]
/// A statement-level error: either a parse failure or a runtime failure.
///
/// Both kinds abort only the statement that raised them; the driving
/// collaborator reports the error and continues with the next statement.
pub enum Error {
    /// The statement could not be lexed or parsed.
    Parse(ParseError),
    /// A callback or a context mutation failed during evaluation.
    Runtime(RuntimeError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(error) => std::fmt::Display::fmt(error, f),
            Self::Runtime(error) => std::fmt::Display::fmt(error, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(error) => Some(error),
            Self::Runtime(error) => Some(error),
        }
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<RuntimeError> for Error {
    fn from(error: RuntimeError) -> Self {
        Self::Runtime(error)
    }
}
