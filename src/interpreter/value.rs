use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use chrono::{NaiveDateTime, TimeDelta};
use rug::Float;

use crate::{error::RuntimeError, interpreter::context::MathContext};

#[derive(Debug, Clone, PartialEq)]
/// Represents a runtime value.
///
/// This enum models the closed set of types a statement can produce. Every
/// operation constructs a new `Value`; values are immutable once built, only
/// the cell inside a [`Variable`] is ever overwritten.
pub enum Value {
    /// The absent value. Held by variables before their first assignment.
    Null,
    /// An arbitrary-precision real number.
    Number(Float),
    /// A text string.
    Text(String),
    /// A calendar timestamp, without timezone.
    Timestamp(NaiveDateTime),
    /// A signed span of time.
    Duration(TimeDelta),
}

impl Value {
    /// Returns the name of the value's active tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::Duration(_) => "duration",
        }
    }

    /// Returns the numeric payload, or a type mismatch for any other tag.
    ///
    /// # Errors
    /// Returns `RuntimeError::TypeMismatch` if the value is not a number.
    pub const fn as_number(&self) -> Result<&Float, RuntimeError> {
        match self {
            Self::Number(value) => Ok(value),
            _ => Err(RuntimeError::TypeMismatch { expected: "number",
                                                  found:    self.kind(), }),
        }
    }

    /// Returns the text payload, or a type mismatch for any other tag.
    ///
    /// # Errors
    /// Returns `RuntimeError::TypeMismatch` if the value is not a string.
    pub fn as_text(&self) -> Result<&str, RuntimeError> {
        match self {
            Self::Text(value) => Ok(value),
            _ => Err(RuntimeError::TypeMismatch { expected: "string",
                                                  found:    self.kind(), }),
        }
    }

    /// Returns the timestamp payload, or a type mismatch for any other tag.
    ///
    /// # Errors
    /// Returns `RuntimeError::TypeMismatch` if the value is not a timestamp.
    pub const fn as_timestamp(&self) -> Result<NaiveDateTime, RuntimeError> {
        match self {
            Self::Timestamp(value) => Ok(*value),
            _ => Err(RuntimeError::TypeMismatch { expected: "timestamp",
                                                  found:    self.kind(), }),
        }
    }

    /// Returns the duration payload, or a type mismatch for any other tag.
    ///
    /// # Errors
    /// Returns `RuntimeError::TypeMismatch` if the value is not a duration.
    pub const fn as_duration(&self) -> Result<TimeDelta, RuntimeError> {
        match self {
            Self::Duration(value) => Ok(*value),
            _ => Err(RuntimeError::TypeMismatch { expected: "duration",
                                                  found:    self.kind(), }),
        }
    }

    /// Interprets the value as a condition: a number is true when nonzero.
    ///
    /// # Errors
    /// Returns `RuntimeError::TypeMismatch` for non-numeric values.
    pub fn is_truthy(&self) -> Result<bool, RuntimeError> {
        Ok(!self.as_number()?.is_zero())
    }

    /// Renders the value for display.
    ///
    /// Numbers honor the context's output base, digit count and rounding
    /// mode; timestamps honor the configured date format; durations use a
    /// fixed `[-]H:MM:SS[.fff]` form; `Null` renders as an empty string.
    #[must_use]
    pub fn render(&self, context: &MathContext) -> String {
        match self {
            Self::Null => String::new(),
            Self::Number(value) => context.format_number(value),
            Self::Text(value) => value.clone(),
            Self::Timestamp(value) => value.format(&context.date_format).to_string(),
            Self::Duration(value) => format_duration(*value),
        }
    }
}

impl From<Float> for Value {
    fn from(value: Float) -> Self {
        Self::Number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl From<TimeDelta> for Value {
    fn from(value: TimeDelta) -> Self {
        Self::Duration(value)
    }
}

/// Renders a duration as `[-]H:MM:SS` with a fractional part when the
/// duration is not a whole number of seconds.
fn format_duration(duration: TimeDelta) -> String {
    let total_ms = duration.num_milliseconds();
    let sign = if total_ms < 0 { "-" } else { "" };
    let total_ms = total_ms.unsigned_abs();

    let hours = total_ms / 3_600_000;
    let minutes = total_ms / 60_000 % 60;
    let seconds = total_ms / 1_000 % 60;
    let millis = total_ms % 1_000;

    if millis == 0 {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

#[derive(Debug)]
/// A named, mutably-boxed value owned by an engine's variable table.
///
/// A variable is *uninitialized* from its creation by the unknown-identifier
/// hook until its first successful assignment, which flips it to
/// *initialized* exactly once. Variables created by registration start out
/// initialized; constants additionally carry the `builtin` flag so that
/// clearing user variables leaves them in place.
pub struct Variable {
    name:        String,
    value:       RefCell<Value>,
    initialized: Cell<bool>,
    builtin:     bool,
}

impl Variable {
    /// Creates an uninitialized variable holding the given placeholder.
    #[must_use]
    pub fn uninitialized(name: &str, placeholder: Value) -> Self {
        Self { name:        name.to_string(),
               value:       RefCell::new(placeholder),
               initialized: Cell::new(false),
               builtin:     false, }
    }

    /// Creates an initialized variable.
    #[must_use]
    pub fn initialized(name: &str, value: Value, builtin: bool) -> Self {
        Self { name: name.to_string(),
               value: RefCell::new(value),
               initialized: Cell::new(true),
               builtin }
    }

    /// Returns the registry key of the variable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of the stored value.
    #[must_use]
    pub fn get(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Overwrites the stored value and marks the variable initialized.
    pub fn assign(&self, value: Value) {
        *self.value.borrow_mut() = value;
        self.initialized.set(true);
    }

    /// Returns `true` once the variable has been assigned.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Returns `true` for registered constants.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        self.builtin
    }
}

#[derive(Debug, Clone)]
/// What the parser threads through reductions: either a plain value or a
/// reference to a variable.
///
/// Keeping the variable identity visible lets the assignment operator mutate
/// its target; every other callback reads through [`Operand::value`].
pub enum Operand {
    /// An immediate value.
    Value(Value),
    /// A reference to a registry-owned variable.
    Variable(Rc<Variable>),
}

impl Operand {
    /// Returns the value the operand stands for, reading through variables.
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Variable(variable) => variable.get(),
        }
    }

    /// Returns the variable behind the operand, if there is one.
    #[must_use]
    pub const fn as_variable(&self) -> Option<&Rc<Variable>> {
        match self {
            Self::Variable(variable) => Some(variable),
            Self::Value(_) => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Float> for Operand {
    fn from(value: Float) -> Self {
        Self::Value(Value::Number(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_reject_other_tags() {
        let value = Value::Text(String::from("abc"));
        assert!(value.as_text().is_ok());
        assert_eq!(value.as_number(),
                   Err(RuntimeError::TypeMismatch { expected: "number",
                                                    found:    "string", }));
    }

    #[test]
    fn variable_initializes_on_first_assignment() {
        let variable = Variable::uninitialized("x", Value::Null);
        assert!(!variable.is_initialized());
        variable.assign(Value::Text(String::from("5")));
        assert!(variable.is_initialized());
        assert_eq!(variable.get(), Value::Text(String::from("5")));
    }

    #[test]
    fn durations_render_in_clock_form() {
        assert_eq!(format_duration(TimeDelta::seconds(3_661)), "01:01:01");
        assert_eq!(format_duration(TimeDelta::seconds(-60)), "-00:01:00");
        assert_eq!(format_duration(TimeDelta::milliseconds(1_500)), "00:00:01.500");
        assert_eq!(format_duration(TimeDelta::seconds(360_000)), "100:00:00");
    }
}
