//! # reckon
//!
//! reckon is a command-line calculator with a fully dynamic, user-extensible
//! grammar. Operators, functions and variables are registered at runtime,
//! and expressions evaluate against arbitrary-precision numeric, string,
//! timestamp and duration values.

#![warn(
    clippy::redundant_clone,
    clippy::needless_pass_by_value,
    clippy::similar_names,
    clippy::large_enum_variant,
    clippy::string_lit_as_bytes,
    clippy::match_same_arms,
    clippy::cargo,
    clippy::nursery,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    clippy::correctness,
    clippy::complexity,
    clippy::pedantic,
    //missing_docs,
)]
#![allow(clippy::missing_errors_doc)]

/// Provides unified error types for parsing and evaluation.
///
/// This module defines all errors that can be raised while lexing, parsing
/// or evaluating a statement, and the interactive command layer's failures.
/// Errors abort only the statement that raised them.
///
/// # Responsibilities
/// - Defines error enums for all failure modes (lexer, parser, callbacks).
/// - Carries positions, identifiers and bounds for user-facing messages.
/// - Supports integration with standard error handling traits.
pub mod error;
/// The expression engine.
///
/// Ties together the lexer, the precedence-climbing parser, the mutable
/// symbol registry, the value model, the evaluation context and the result
/// history. Engines are instance-local: several differently-configured
/// instances coexist in one process without sharing any state.
///
/// # Responsibilities
/// - Tokenizes and evaluates statements against a runtime-mutable grammar.
/// - Owns operator, function and variable tables per instance.
/// - Tracks and rolls back auto-declared variables per statement.
pub mod interpreter;
/// The registration payloads and the session driver.
///
/// Builds the concrete calculators out of the engine: the default grammar
/// with its operator, function and constant tables, the bitwise grammar,
/// the chemical sub-evaluator, and the interactive command layer on top of
/// a [`setup::Session`].
///
/// # Responsibilities
/// - Populates engines through the public registration API only.
/// - Holds the per-session shared state (context, history, random state).
/// - Implements the `/command` dispatcher consumed by the REPL.
pub mod setup;
