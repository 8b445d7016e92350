#[derive(Debug, Clone, PartialEq)]
/// Represents all errors that can be raised while evaluating callbacks or
/// while reconfiguring the evaluation context.
pub enum RuntimeError {
    /// A typed accessor was invoked against a value with a different tag.
    TypeMismatch {
        /// The tag that was required.
        expected: &'static str,
        /// The tag that was actually present.
        found:    &'static str,
    },
    /// A value could not be narrowed to a machine integer.
    IntegerConversion,
    /// A numeric base outside the supported range was requested.
    InvalidBase {
        /// The rejected base.
        base: i32,
    },
    /// A precision outside the supported range was requested.
    PrecisionOutOfRange {
        /// The rejected precision, in bits.
        value: u32,
    },
    /// A rounding-mode name did not match any known mode.
    UnknownRoundingMode {
        /// The name as given.
        name: String,
    },
    /// A timestamp string did not match any accepted format.
    InvalidDate {
        /// The string as given.
        text: String,
    },
    /// A duration string or value could not be interpreted.
    InvalidDuration {
        /// The string as given.
        text: String,
    },
    /// A date output format contained an invalid specifier.
    InvalidDateFormat {
        /// The format string as given.
        format: String,
    },
    /// A timestamp or duration computation left the representable range.
    DateOverflow,
    /// A listing filter was not a valid regular expression.
    InvalidPattern {
        /// The pattern as given.
        pattern: String,
    },
    /// An interactive command name did not match any known command.
    UnknownCommand {
        /// The name as given.
        name: String,
    },
    /// An interactive command was invoked with unusable arguments.
    CommandUsage {
        /// A short usage line for the command.
        usage: String,
    },
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected}, found {found}.")
            },

            Self::IntegerConversion => {
                write!(f, "Value cannot be represented as an integer.")
            },

            Self::InvalidBase { base } => {
                write!(f, "Invalid numeric base: {base} (supported: 2 - 36).")
            },

            Self::PrecisionOutOfRange { value } => {
                write!(f, "Precision out of range: {value}.")
            },

            Self::UnknownRoundingMode { name } => {
                write!(f, "Invalid rounding mode '{name}'.")
            },

            Self::InvalidDate { text } => write!(f, "Invalid date '{text}'."),

            Self::InvalidDuration { text } => write!(f, "Invalid duration '{text}'."),

            Self::InvalidDateFormat { format } => {
                write!(f, "Invalid date output format '{format}'.")
            },

            Self::DateOverflow => write!(f, "Date arithmetic out of range."),

            Self::InvalidPattern { pattern } => {
                write!(f, "Invalid search pattern '{pattern}'.")
            },

            Self::UnknownCommand { name } => write!(f, "Unknown command '{name}'."),

            Self::CommandUsage { usage } => write!(f, "Usage: {usage}"),
        }
    }
}

impl std::error::Error for RuntimeError {}
