use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    error::{Error, ParseError},
    interpreter::{
        context::MathContext,
        lexer,
        parser::Parser,
        value::{Operand, Value, Variable},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Grouping direction of an operator at equal precedence.
pub enum Associativity {
    /// `a op b op c` groups as `(a op b) op c`.
    Left,
    /// `a op b op c` groups as `a op (b op c)`.
    Right,
    /// Grouping is immaterial; treated like [`Associativity::Left`].
    Any,
}

impl std::fmt::Display for Associativity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => f.write_str("Left"),
            Self::Right => f.write_str("Right"),
            Self::Any => f.write_str("Any"),
        }
    }
}

/// Callback type for prefix unary operators.
pub type UnaryFn = Rc<dyn Fn(&Operand) -> Result<Operand, Error>>;
/// Callback type for binary operators.
pub type BinaryFn = Rc<dyn Fn(&Operand, &Operand) -> Result<Operand, Error>>;
/// Callback type for functions.
pub type FunctionFn = Rc<dyn Fn(&[Operand]) -> Result<Operand, Error>>;
/// Converter from a numeric literal to a value.
pub type NumberConverter = Rc<dyn Fn(&str) -> Result<Value, Error>>;
/// Converter from an unescaped string literal to a value.
pub type TextConverter = Rc<dyn Fn(String) -> Result<Value, Error>>;
/// Hook producing the placeholder value for an auto-declared identifier.
pub type UnknownIdentifier = Rc<dyn Fn(&str) -> Result<Value, Error>>;

/// Sentinel for an unbounded maximum argument count.
pub const UNLIMITED_ARGUMENTS: usize = usize::MAX;

/// Descriptor of a registered prefix unary operator.
pub struct UnaryOperator {
    /// The single-character identifier.
    pub identifier:    char,
    /// Binding strength; larger binds tighter.
    pub precedence:    i32,
    /// Grouping direction.
    pub associativity: Associativity,
    /// The operation itself.
    pub callback:      UnaryFn,
}

/// Descriptor of a registered binary operator.
pub struct BinaryOperator {
    /// The identifier; multi-character identifiers are matched greedily.
    pub identifier:    String,
    /// Binding strength; larger binds tighter.
    pub precedence:    i32,
    /// Grouping direction.
    pub associativity: Associativity,
    /// The operation itself.
    pub callback:      BinaryFn,
}

/// Descriptor of a registered function.
pub struct Function {
    /// The (possibly dotted) identifier.
    pub identifier: String,
    /// Smallest accepted argument count.
    pub min_args:   usize,
    /// Largest accepted argument count; [`UNLIMITED_ARGUMENTS`] for no bound.
    pub max_args:   usize,
    /// The operation itself.
    pub callback:   FunctionFn,
}

/// An expression engine: the mutable symbol registry together with its
/// evaluation context and literal converters.
///
/// All tables are instance-local. Two engines with different grammars can
/// coexist in one process and even call into each other from callbacks,
/// because nothing here is shared or global. Registration uses
/// last-wins semantics: re-registering an identifier replaces the previous
/// descriptor, which is how collaborators re-precedence operators at
/// runtime.
pub struct Engine {
    unary:              HashMap<char, Rc<UnaryOperator>>,
    binary:             HashMap<String, Rc<BinaryOperator>>,
    functions:          HashMap<String, Rc<Function>>,
    variables:          RefCell<HashMap<String, Rc<Variable>>>,
    juxtaposition:      Option<Rc<BinaryOperator>>,
    number_converter:   NumberConverter,
    text_converter:     TextConverter,
    unknown_identifier: Option<UnknownIdentifier>,
    pending:            RefCell<Vec<String>>,
    unbound:            RefCell<Vec<String>>,
    longest_binary:     usize,
    context:            Rc<RefCell<MathContext>>,
}

impl Engine {
    /// Creates an engine with empty tables over the given context.
    ///
    /// The default number converter reads literals in the context's input
    /// base; the default string converter passes text through unchanged.
    /// There is no unknown-identifier hook until one is installed, so
    /// unresolved identifiers are errors.
    #[must_use]
    pub fn new(context: Rc<RefCell<MathContext>>) -> Self {
        let converter_context = Rc::clone(&context);
        let number_converter: NumberConverter = Rc::new(move |literal| {
            let number = converter_context.borrow().parse_number(literal)?;
            Ok(Value::Number(number))
        });

        Self { unary: HashMap::new(),
               binary: HashMap::new(),
               functions: HashMap::new(),
               variables: RefCell::new(HashMap::new()),
               juxtaposition: None,
               number_converter,
               text_converter: Rc::new(|text| Ok(Value::Text(text))),
               unknown_identifier: None,
               pending: RefCell::new(Vec::new()),
               unbound: RefCell::new(Vec::new()),
               longest_binary: 0,
               context }
    }

    /// Returns the engine's evaluation context.
    #[must_use]
    pub const fn context(&self) -> &Rc<RefCell<MathContext>> {
        &self.context
    }

    /// Returns the input base currently configured for literals.
    #[must_use]
    pub fn input_base(&self) -> i32 {
        self.context.borrow().input_base
    }

    /// Registers (or replaces) a prefix unary operator.
    pub fn register_unary(&mut self,
                          identifier: char,
                          precedence: i32,
                          associativity: Associativity,
                          callback: UnaryFn) {
        self.unary.insert(identifier,
                          Rc::new(UnaryOperator { identifier,
                                                  precedence,
                                                  associativity,
                                                  callback }));
    }

    /// Registers (or replaces) a binary operator.
    pub fn register_binary(&mut self,
                           identifier: &str,
                           precedence: i32,
                           associativity: Associativity,
                           callback: BinaryFn) {
        self.longest_binary = self.longest_binary.max(identifier.len());
        self.binary.insert(identifier.to_string(),
                           Rc::new(BinaryOperator { identifier: identifier.to_string(),
                                                    precedence,
                                                    associativity,
                                                    callback }));
    }

    /// Registers (or replaces) a function.
    pub fn register_function(&mut self,
                             identifier: &str,
                             min_args: usize,
                             max_args: usize,
                             callback: FunctionFn) {
        self.functions.insert(identifier.to_string(),
                              Rc::new(Function { identifier: identifier.to_string(),
                                                 min_args,
                                                 max_args,
                                                 callback }));
    }

    /// Registers (or replaces) an initialized user variable.
    pub fn register_variable(&self, identifier: &str, value: Value) {
        self.variables
            .borrow_mut()
            .insert(identifier.to_string(),
                    Rc::new(Variable::initialized(identifier, value, false)));
    }

    /// Registers (or replaces) a builtin constant.
    ///
    /// Constants survive [`Engine::clear_variables`].
    pub fn register_constant(&self, identifier: &str, value: Value) {
        self.variables
            .borrow_mut()
            .insert(identifier.to_string(),
                    Rc::new(Variable::initialized(identifier, value, true)));
    }

    /// Installs the juxtaposition operator applied between two adjacent
    /// primaries with no operator token in between.
    pub fn set_juxtaposition(&mut self,
                             precedence: i32,
                             associativity: Associativity,
                             callback: BinaryFn) {
        self.juxtaposition = Some(Rc::new(BinaryOperator { identifier: String::from("*"),
                                                           precedence,
                                                           associativity,
                                                           callback }));
    }

    /// Removes the juxtaposition operator; adjacent primaries become a
    /// syntax error.
    pub fn disable_juxtaposition(&mut self) {
        self.juxtaposition = None;
    }

    /// Returns the juxtaposition operator, if enabled.
    #[must_use]
    pub const fn juxtaposition(&self) -> Option<&Rc<BinaryOperator>> {
        self.juxtaposition.as_ref()
    }

    /// Replaces the numeric-literal converter.
    pub fn set_number_converter(&mut self, converter: NumberConverter) {
        self.number_converter = converter;
    }

    /// Replaces the string-literal converter.
    pub fn set_text_converter(&mut self, converter: TextConverter) {
        self.text_converter = converter;
    }

    /// Installs or removes the unknown-identifier hook.
    ///
    /// With a hook in place, a bare identifier that resolves to nothing is
    /// materialized as an uninitialized variable holding the hook's value;
    /// without one it is a syntax error.
    pub fn set_unknown_identifier(&mut self, hook: Option<UnknownIdentifier>) {
        self.unknown_identifier = hook;
    }

    /// Looks up a unary operator; `None` when not registered.
    #[must_use]
    pub fn resolve_unary(&self, identifier: char) -> Option<Rc<UnaryOperator>> {
        self.unary.get(&identifier).cloned()
    }

    /// Looks up a binary operator; `None` when not registered.
    #[must_use]
    pub fn resolve_binary(&self, identifier: &str) -> Option<Rc<BinaryOperator>> {
        self.binary.get(identifier).cloned()
    }

    /// Looks up a function; `None` when not registered.
    #[must_use]
    pub fn resolve_function(&self, identifier: &str) -> Option<Rc<Function>> {
        self.functions.get(identifier).cloned()
    }

    /// Looks up a variable; `None` when not registered.
    #[must_use]
    pub fn resolve_variable(&self, identifier: &str) -> Option<Rc<Variable>> {
        self.variables.borrow().get(identifier).cloned()
    }

    /// Length of the longest registered binary identifier, for greedy
    /// operator matching.
    #[must_use]
    pub const fn longest_binary(&self) -> usize {
        self.longest_binary
    }

    /// Materializes an uninitialized variable for an unresolved identifier.
    ///
    /// The name is remembered for the current statement; if it is still
    /// uninitialized when the statement completes it is removed again and
    /// reported through [`Engine::take_unbound`].
    ///
    /// # Errors
    /// Returns `ParseError::UnknownIdentifier` when no hook is installed.
    pub fn declare_unknown(&self, identifier: &str) -> Result<Rc<Variable>, Error> {
        let hook = self.unknown_identifier
                       .as_ref()
                       .ok_or_else(|| ParseError::UnknownIdentifier { name: identifier.to_string() })?;

        let placeholder = hook(identifier)?;
        let variable = Rc::new(Variable::uninitialized(identifier, placeholder));
        self.variables
            .borrow_mut()
            .insert(identifier.to_string(), Rc::clone(&variable));
        self.pending.borrow_mut().push(identifier.to_string());

        Ok(variable)
    }

    /// Converts a numeric literal through the installed converter.
    ///
    /// # Errors
    /// Propagates the converter's error, typically `InvalidNumber`.
    pub fn convert_number(&self, literal: &str) -> Result<Value, Error> {
        (self.number_converter)(literal)
    }

    /// Converts a string literal through the installed converter.
    ///
    /// # Errors
    /// Propagates the converter's error.
    pub fn convert_text(&self, text: String) -> Result<Value, Error> {
        (self.text_converter)(text)
    }

    /// Evaluates one `;`-free expression fragment to a value.
    ///
    /// On completion, successful or not, every identifier auto-declared by
    /// this statement that was never assigned is removed from the variable
    /// table again; the removed names are available from
    /// [`Engine::take_unbound`] so the caller can warn about them. Reading
    /// an unknown identifier therefore leaves no trace once the statement
    /// is over.
    ///
    /// # Errors
    /// Returns the first lexical, syntactic or callback error encountered.
    /// Domain-invalid arithmetic is not an error; it propagates as NaN or
    /// infinity inside the resulting value.
    pub fn evaluate(&self, source: &str) -> Result<Value, Error> {
        let result = lexer::tokenize(source)
            .map_err(Error::from)
            .and_then(|tokens| Parser::new(self, tokens).parse_statement());

        let mut unbound = self.unbound.borrow_mut();
        unbound.clear();
        let mut variables = self.variables.borrow_mut();
        for name in self.pending.borrow_mut().drain(..) {
            let initialized = variables.get(&name).is_none_or(|v| v.is_initialized());
            if !initialized {
                variables.remove(&name);
                unbound.push(name);
            }
        }

        result.map(|operand| operand.value())
    }

    /// Takes the names rolled back by the most recent statement.
    #[must_use]
    pub fn take_unbound(&self) -> Vec<String> {
        std::mem::take(&mut self.unbound.borrow_mut())
    }

    /// Removes all user variables, keeping registered constants.
    pub fn clear_variables(&self) {
        self.variables.borrow_mut().retain(|_, variable| variable.is_builtin());
    }

    /// Returns the registered unary operators, sorted by identifier.
    #[must_use]
    pub fn unary_operators(&self) -> Vec<Rc<UnaryOperator>> {
        let mut operators: Vec<_> = self.unary.values().cloned().collect();
        operators.sort_by_key(|operator| operator.identifier);
        operators
    }

    /// Returns the registered binary operators, sorted by identifier.
    #[must_use]
    pub fn binary_operators(&self) -> Vec<Rc<BinaryOperator>> {
        let mut operators: Vec<_> = self.binary.values().cloned().collect();
        operators.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        operators
    }

    /// Returns the registered functions, sorted by identifier.
    #[must_use]
    pub fn functions(&self) -> Vec<Rc<Function>> {
        let mut functions: Vec<_> = self.functions.values().cloned().collect();
        functions.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        functions
    }

    /// Returns the registered variables, sorted by name.
    #[must_use]
    pub fn variables(&self) -> Vec<Rc<Variable>> {
        let mut variables: Vec<_> = self.variables.borrow().values().cloned().collect();
        variables.sort_by(|a, b| a.name().cmp(b.name()));
        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(Rc::new(RefCell::new(MathContext::default())))
    }

    #[test]
    fn registration_is_last_wins() {
        let mut engine = engine();
        let callback: BinaryFn = Rc::new(|lhs, _| Ok(lhs.clone()));
        engine.register_binary("+", 5, Associativity::Left, Rc::clone(&callback));
        engine.register_binary("+", 9, Associativity::Right, callback);

        let operator = engine.resolve_binary("+").unwrap();
        assert_eq!(operator.precedence, 9);
        assert_eq!(operator.associativity, Associativity::Right);
    }

    #[test]
    fn unresolved_identifiers_error_without_a_hook() {
        let engine = engine();
        assert!(matches!(engine.evaluate("x"),
                         Err(Error::Parse(ParseError::UnknownIdentifier { .. }))));
    }

    #[test]
    fn clear_variables_keeps_constants() {
        let engine = engine();
        engine.register_constant("pi", Value::Null);
        engine.register_variable("x", Value::Null);
        engine.clear_variables();
        assert!(engine.resolve_variable("pi").is_some());
        assert!(engine.resolve_variable("x").is_none());
    }
}
