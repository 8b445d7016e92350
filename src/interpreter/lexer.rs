use logos::Logos;

use crate::error::ParseError;

/// Represents a lexical token in a source fragment.
///
/// A token is a minimal but meaningful unit of text produced by the lexer.
/// Decisions that depend on the mutable symbol registry are deliberately not
/// made here: a [`Token::Term`] may still be a number or an identifier
/// depending on the input base, and a run of [`Token::Symbol`] characters is
/// matched greedily against the registered operator identifiers by the
/// parser. The lexer only classifies shapes.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    /// A run of letters, digits, `_` and `.`; a numeric literal or a
    /// (possibly dotted) identifier such as `math.sin`.
    #[regex(r"[0-9A-Za-z_.]+", |lex| lex.slice().to_string())]
    Term(String),
    /// A double-quoted string literal, unescaped.
    #[regex(r#""([^"\\]|\\.)*""#, unescape)]
    Text(String),
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `,`
    #[token(",")]
    Comma,
    /// A single character from the operator alphabet.
    #[regex(r"[+\-*/%^=!~<>|&@#?:$]", |lex| lex.slice().chars().next())]
    Symbol(char),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Term(text) => f.write_str(text),
            Self::Text(text) => write!(f, "\"{text}\""),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

/// A token together with its byte span in the source fragment.
///
/// Spans drive error positions and adjacency checks: multi-character
/// operators and stitched exponents are only assembled from tokens whose
/// spans touch.
pub type Spanned = (Token, std::ops::Range<usize>);

/// Converts a source fragment into its token stream.
///
/// Whitespace is skipped; every other character must start one of the token
/// kinds above.
///
/// # Parameters
/// - `source`: The statement text, without any `;` separator.
///
/// # Returns
/// The tokens in source order, each with its byte span.
///
/// # Errors
/// Returns `ParseError::UnrecognizedCharacter` carrying the byte position of
/// the first character that cannot start a token.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(item) = lexer.next() {
        match item {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(ParseError::UnrecognizedCharacter { found:    source[lexer.span()]
                                                                             .chars()
                                                                             .next()
                                                                             .unwrap_or('\u{fffd}'),
                                                               position: lexer.span().start, });
            },
        }
    }

    Ok(tokens)
}

/// Unescapes a quoted string literal.
///
/// Handles the conventional escapes `\n`, `\t`, `\r`, `\0`, `\\` and `\"`;
/// any other escaped character stands for itself.
fn unescape(lex: &logos::Lexer<Token>) -> String {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(other) => result.push(other),
            None => {},
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(token, _)| token).collect()
    }

    #[test]
    fn classifies_terms_symbols_and_punctuation() {
        assert_eq!(kinds("2 + math.sin(x)"),
                   vec![Token::Term(String::from("2")),
                        Token::Symbol('+'),
                        Token::Term(String::from("math.sin")),
                        Token::LParen,
                        Token::Term(String::from("x")),
                        Token::RParen]);
    }

    #[test]
    fn adjacent_operator_characters_stay_separate() {
        assert_eq!(kinds("2**3"),
                   vec![Token::Term(String::from("2")),
                        Token::Symbol('*'),
                        Token::Symbol('*'),
                        Token::Term(String::from("3"))]);
    }

    #[test]
    fn string_escapes_are_applied() {
        assert_eq!(kinds(r#""a\"b\n""#), vec![Token::Text(String::from("a\"b\n"))]);
    }

    #[test]
    fn unrecognized_characters_report_their_position() {
        let error = tokenize("1 + `").unwrap_err();
        assert_eq!(error,
                   ParseError::UnrecognizedCharacter { found:    '`',
                                                       position: 4, });
    }
}
