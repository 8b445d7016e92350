use crate::{error::ParseError, interpreter::value::Value};

#[derive(Debug, Default)]
/// The append-only sequence of past statement results.
///
/// One entry is recorded per top-level statement. Entries are indexable
/// absolutely from the front (`0` is the oldest) and relatively from the
/// back (`-1` is the most recent). The sequence is only ever cleared
/// explicitly, by a collaborator command.
pub struct History {
    entries: Vec<Value>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Records one statement result.
    pub fn append(&mut self, value: Value) {
        self.entries.push(value);
    }

    /// Returns the number of recorded results.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` while nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets all recorded results.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Looks up a result by index; negative indices count from the end.
    ///
    /// # Errors
    /// Returns `ParseError::HistoryIndexOutOfRange` when the index points
    /// outside the recorded results (including any index into an empty
    /// history).
    pub fn at(&self, index: i64) -> Result<&Value, ParseError> {
        let count = i64::try_from(self.entries.len()).unwrap_or(i64::MAX);
        let resolved = if index < 0 { count + index } else { index };

        if resolved < 0 || resolved >= count {
            return Err(ParseError::HistoryIndexOutOfRange { index,
                                                            count: self.entries.len(), });
        }

        Ok(&self.entries[resolved as usize])
    }

    /// Returns the most recent result.
    ///
    /// # Errors
    /// Returns `ParseError::HistoryIndexOutOfRange` on an empty history.
    pub fn latest(&self) -> Result<&Value, ParseError> {
        self.at(-1)
    }

    /// Iterates over the recorded results, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rug::Float;

    fn number(value: i32) -> Value {
        Value::Number(Float::with_val(53, value))
    }

    #[test]
    fn indexes_absolutely_and_relatively() {
        let mut history = History::new();
        history.append(number(10));
        history.append(number(20));
        history.append(number(30));

        assert_eq!(history.latest().unwrap(), &number(30));
        assert_eq!(history.at(-2).unwrap(), &number(20));
        assert_eq!(history.at(0).unwrap(), &number(10));
        assert!(history.at(5).is_err());
        assert!(history.at(-4).is_err());
    }

    #[test]
    fn empty_history_rejects_every_index() {
        let history = History::new();
        assert_eq!(history.latest(),
                   Err(ParseError::HistoryIndexOutOfRange { index: -1, count: 0 }));
    }
}
