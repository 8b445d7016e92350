use std::{ops::Range, rc::Rc};

use crate::{
    error::{Error, ParseError},
    interpreter::{
        lexer::{Spanned, Token},
        registry::{Associativity, BinaryOperator, Engine},
        value::Operand,
    },
};

/// Parses and immediately evaluates one statement against an engine.
///
/// This is precedence climbing over the engine's runtime-mutable operator
/// tables. There is no syntax tree: each reduction step invokes the matched
/// operator or function callback right away and carries the produced
/// [`Operand`] forward. The registry is consulted at every decision point,
/// so re-registering an operator between two statements changes how the next
/// statement parses.
pub struct Parser<'a> {
    engine: &'a Engine,
    tokens: Vec<Spanned>,
    pos:    usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser over an already-lexed statement.
    #[must_use]
    pub const fn new(engine: &'a Engine, tokens: Vec<Spanned>) -> Self {
        Self { engine, tokens, pos: 0 }
    }

    /// Parses the whole token stream as a single expression.
    ///
    /// # Errors
    /// Returns a `ParseError` for malformed input, or whatever error a
    /// callback raised while reducing.
    pub fn parse_statement(mut self) -> Result<Operand, Error> {
        let result = self.parse_expression(0)?;

        if let Some((token, span)) = self.tokens.get(self.pos) {
            return Err(ParseError::TrailingToken { token:    token.to_string(),
                                                   position: span.start, }.into());
        }

        Ok(result)
    }

    /// Parses an expression whose operators all bind at least as tightly as
    /// `min_precedence`.
    ///
    /// The loop body is the climbing step: find the next binary operator
    /// (falling back to the juxtaposition operator when the next token could
    /// begin a primary), stop if it binds too loosely, otherwise parse the
    /// right-hand side with the bound implied by the operator's
    /// associativity and reduce.
    fn parse_expression(&mut self, min_precedence: i32) -> Result<Operand, Error> {
        let mut lhs = self.parse_primary()?;

        loop {
            let (operator, consumed) = match self.peek_binary_operator() {
                Some(found) => found,
                None => match self.engine.juxtaposition() {
                    Some(operator) if self.starts_primary() => (Rc::clone(operator), 0),
                    _ => break,
                },
            };

            if operator.precedence < min_precedence {
                break;
            }
            self.pos += consumed;

            let next_min = match operator.associativity {
                Associativity::Right => operator.precedence,
                Associativity::Left | Associativity::Any => operator.precedence + 1,
            };
            let rhs = self.parse_expression(next_min)?;
            lhs = (operator.callback)(&lhs, &rhs)?;
        }

        Ok(lhs)
    }

    /// Parses one primary: a prefix-operator application, a parenthesized
    /// group, a literal, a function call, or a variable reference.
    fn parse_primary(&mut self) -> Result<Operand, Error> {
        match self.tokens.get(self.pos).cloned() {
            None => Err(ParseError::UnexpectedEndOfInput.into()),

            Some((Token::Symbol(symbol), span)) => {
                let Some(operator) = self.engine.resolve_unary(symbol) else {
                    return Err(ParseError::UnexpectedToken { token:    symbol.to_string(),
                                                             position: span.start, }.into());
                };
                self.pos += 1;

                let next_min = match operator.associativity {
                    Associativity::Right | Associativity::Any => operator.precedence,
                    Associativity::Left => operator.precedence + 1,
                };
                let operand = self.parse_expression(next_min)?;
                (operator.callback)(&operand)
            },

            Some((Token::LParen, span)) => {
                self.pos += 1;
                let inner = self.parse_expression(0)?;
                match self.tokens.get(self.pos) {
                    Some((Token::RParen, _)) => {
                        self.pos += 1;
                        Ok(inner)
                    },
                    _ => Err(ParseError::ExpectedClosingParen { position: span.start }.into()),
                }
            },

            Some((Token::Text(text), _)) => {
                self.pos += 1;
                Ok(Operand::Value(self.engine.convert_text(text)?))
            },

            Some((Token::Term(term), span)) => self.parse_term(&term, &span),

            Some((token, span)) => Err(ParseError::UnexpectedToken { token:    token.to_string(),
                                                                     position: span.start, }.into()),
        }
    }

    /// Parses a term: a numeric literal when it starts like one in the
    /// current input base, otherwise an identifier resolved against the
    /// registry (function call, variable, or auto-declaration).
    fn parse_term(&mut self, term: &str, span: &Range<usize>) -> Result<Operand, Error> {
        let base = self.engine.input_base();
        let first = term.chars().next().unwrap_or('\0');

        if first == '.' || is_base_digit(first, base) {
            let literal = self.take_literal(term, span, base);
            return Ok(Operand::Value(self.engine.convert_number(&literal)?));
        }

        self.pos += 1;
        let called = matches!(self.tokens.get(self.pos), Some((Token::LParen, _)));

        if let Some(function) = self.engine.resolve_function(term) {
            if !called {
                return Err(ParseError::ExpectedArgumentList { name: term.to_string() }.into());
            }

            let arguments = self.parse_arguments()?;
            if arguments.len() < function.min_args || arguments.len() > function.max_args {
                return Err(ParseError::ArgumentCount { name:  term.to_string(),
                                                       min:   function.min_args,
                                                       max:   function.max_args,
                                                       found: arguments.len(), }.into());
            }
            return (function.callback)(&arguments);
        }

        if let Some(variable) = self.engine.resolve_variable(term) {
            return Ok(Operand::Variable(variable));
        }

        // Call syntax with an unresolved name never auto-declares.
        if called {
            return Err(ParseError::UnknownFunction { name: term.to_string() }.into());
        }

        Ok(Operand::Variable(self.engine.declare_unknown(term)?))
    }

    /// Splits a numeric literal off the front of the current term.
    ///
    /// The literal greedily takes digits of the input base and `.`; in bases
    /// up to 10 a scientific exponent is accepted, stitched together from
    /// adjacent tokens when the sign splits it (`1e-5` lexes as three
    /// tokens). An unconsumed tail is left in place as a shorter term, so
    /// `2pi` yields the literal `2` with `pi` still pending.
    fn take_literal(&mut self, term: &str, span: &Range<usize>, base: i32) -> String {
        let mut end = 0;
        let mut chars = term.char_indices().peekable();

        while let Some((index, c)) = chars.next() {
            if c == '.' || is_base_digit(c, base) {
                end = index + c.len_utf8();
                continue;
            }
            if (c == 'e' || c == 'E') && base <= 10 && index > 0 {
                // In-term exponent: requires at least one following digit.
                if let Some((_, digit)) = chars.peek()
                    && digit.is_ascii_digit()
                {
                    end = term.len();
                    for (index, c) in chars.by_ref() {
                        if !c.is_ascii_digit() {
                            end = index;
                            break;
                        }
                    }
                }
            }
            break;
        }

        // A trailing exponent marker may continue as `<sign> <digits>` in the
        // next two tokens, provided nothing but the sign separates them.
        if base <= 10
           && end == term.len() - 1
           && term.ends_with(['e', 'E'])
           && end > 0
           && let Some(stitched) = self.stitch_exponent(term, span)
        {
            return stitched;
        }

        if end == term.len() {
            self.pos += 1;
            return term.to_string();
        }

        let literal = term[..end].to_string();
        let rest = term[end..].to_string();
        self.tokens[self.pos] = (Token::Term(rest), span.start + end..span.end);
        literal
    }

    /// Completes a literal like `1e` with a contiguous `-`/`+` symbol and a
    /// contiguous digit run, consuming all three tokens on success.
    fn stitch_exponent(&mut self, term: &str, span: &Range<usize>) -> Option<String> {
        let (sign, sign_span) = match self.tokens.get(self.pos + 1) {
            Some((Token::Symbol(sign @ ('+' | '-')), sign_span)) if sign_span.start == span.end => {
                (*sign, sign_span.clone())
            },
            _ => return None,
        };
        match self.tokens.get(self.pos + 2) {
            Some((Token::Term(digits), digit_span))
                if digit_span.start == sign_span.end
                   && digits.chars().all(|c| c.is_ascii_digit()) =>
            {
                let literal = format!("{term}{sign}{digits}");
                self.pos += 3;
                Some(literal)
            },
            _ => None,
        }
    }

    /// Parses a parenthesized, comma-separated argument list.
    ///
    /// The opening parenthesis must be the current token. An immediately
    /// encountered `)` produces an empty list.
    fn parse_arguments(&mut self) -> Result<Vec<Operand>, Error> {
        self.pos += 1; // consume '('

        let mut arguments = Vec::new();
        if matches!(self.tokens.get(self.pos), Some((Token::RParen, _))) {
            self.pos += 1;
            return Ok(arguments);
        }

        loop {
            arguments.push(self.parse_expression(0)?);
            match self.tokens.get(self.pos) {
                Some((Token::Comma, _)) => self.pos += 1,
                Some((Token::RParen, _)) => {
                    self.pos += 1;
                    break;
                },
                Some((token, span)) => {
                    return Err(ParseError::UnexpectedToken { token:    token.to_string(),
                                                             position: span.start, }.into());
                },
                None => return Err(ParseError::UnexpectedEndOfInput.into()),
            }
        }

        Ok(arguments)
    }

    /// Finds the binary operator starting at the cursor, if any.
    ///
    /// Contiguous operator characters are collected up to the longest
    /// registered identifier and matched longest-first, so `**` wins over
    /// `*` wherever both are registered. Returns the operator and how many
    /// tokens it spans.
    fn peek_binary_operator(&self) -> Option<(Rc<BinaryOperator>, usize)> {
        let (first, first_span) = match self.tokens.get(self.pos) {
            Some((Token::Symbol(symbol), span)) => (*symbol, span.clone()),
            _ => return None,
        };

        let mut symbols = String::from(first);
        let mut end = first_span.end;
        while symbols.len() < self.engine.longest_binary() {
            match self.tokens.get(self.pos + symbols.len()) {
                Some((Token::Symbol(symbol), span)) if span.start == end => {
                    symbols.push(*symbol);
                    end = span.end;
                },
                _ => break,
            }
        }

        while !symbols.is_empty() {
            if let Some(operator) = self.engine.resolve_binary(&symbols) {
                let consumed = symbols.len();
                return Some((operator, consumed));
            }
            symbols.pop();
        }

        None
    }

    /// Returns `true` when the next token could begin a primary, which is
    /// what arms the juxtaposition operator.
    fn starts_primary(&self) -> bool {
        matches!(self.tokens.get(self.pos),
                 Some((Token::Term(_) | Token::Text(_) | Token::LParen, _)))
    }
}

/// Returns `true` when `c` is a digit of the given base, counting letters
/// upward from ten in either case.
fn is_base_digit(c: char, base: i32) -> bool {
    c.to_digit(36).is_some_and(|digit| i32::try_from(digit).is_ok_and(|digit| digit < base))
}
