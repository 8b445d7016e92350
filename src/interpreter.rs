/// The evaluation context: precision, rounding, bases, display settings.
///
/// Declares [`context::MathContext`] and the symbolic rounding modes. The
/// context is shared behind `Rc<RefCell<_>>` between an engine, its literal
/// converters and its callbacks, and is re-read by every evaluation, so
/// changing it between statements changes how the next statement parses and
/// renders.
///
/// # Responsibilities
/// - Holds the mutable numeric-formatting state of one engine instance.
/// - Converts numeric literals in the configured input base.
/// - Renders numbers in the configured output base and digit count.
pub mod context;
/// The result history consumed by the `ans` builtin.
///
/// An append-only sequence of past statement results with absolute and
/// relative (negative) indexing. Shared for the lifetime of a session and
/// cleared only on explicit request.
pub mod history;
/// The lexer module tokenizes a statement for the parser.
///
/// The lexer reads the raw source text and produces a stream of span-tagged
/// tokens: term runs, quoted strings, parentheses, commas, and single
/// operator characters. Everything that depends on the mutable registry
/// (operator identifiers, the input base) is resolved later, in the parser.
///
/// # Responsibilities
/// - Converts the input character stream into tokens with byte spans.
/// - Applies string-literal escape handling.
/// - Reports unrecognized characters with their position.
pub mod lexer;
/// The parser module evaluates the token stream directly.
///
/// Implements precedence climbing over the runtime operator tables. No
/// syntax tree is built: each reduction invokes the operator or function
/// callback immediately and threads the resulting operand forward.
///
/// # Responsibilities
/// - Resolves identifiers against the registry at every decision point.
/// - Matches multi-character operators greedily, longest first.
/// - Applies the juxtaposition operator between adjacent primaries.
/// - Enforces function arity and call syntax.
pub mod parser;
/// The registry module owns the mutable grammar of one engine.
///
/// Declares the operator and function descriptors and [`registry::Engine`],
/// which ties the tables, the literal converters, the unknown-identifier
/// hook and the evaluation context together behind one `evaluate` entry
/// point. Tables are instance-local; engines never share state.
pub mod registry;
/// The value module defines the runtime data types.
///
/// Declares the closed [`value::Value`] union (null, number, string,
/// timestamp, duration), the [`value::Variable`] cell with its
/// uninitialized/initialized lifecycle, and the [`value::Operand`] carrier
/// the parser threads through reductions.
pub mod value;
