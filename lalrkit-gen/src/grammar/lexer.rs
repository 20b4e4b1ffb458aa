//! Token scanner for grammar source files.

use lalrkit::LalrkitError;
use logos::Logos;
use smartstring::alias::String;
use std::fmt;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*(?:[^*]|\*+[^*/])*\*+/")]
enum RawToken {
    #[token("%left")]
    Left,
    #[token("%right")]
    Right,
    #[token("%none")]
    NonePrec,
    #[token("%nonassoc")]
    Nonassoc,
    #[token("%whitespace")]
    Whitespace,
    #[token("%precedence")]
    Precedence,
    #[token("error")]
    ErrorKw,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r"'(?:[^'\\\n]|\\.)*'")]
    Literal,
    #[regex(r#""(?:[^"\\\n]|\\.)*""#)]
    Regex,
    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,
    #[token(";")]
    Semi,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
}

/// A grammar-source token with its payload extracted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DslToken {
    Left,
    Right,
    NonePrec,
    Nonassoc,
    Whitespace,
    Precedence,
    ErrorKw,
    Identifier(String),
    Literal(String),
    Regex(String),
    Colon,
    Pipe,
    Semi,
    LeftBracket,
    RightBracket,
}

impl fmt::Display for DslToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DslToken::Left => write!(f, "%left"),
            DslToken::Right => write!(f, "%right"),
            DslToken::NonePrec => write!(f, "%none"),
            DslToken::Nonassoc => write!(f, "%nonassoc"),
            DslToken::Whitespace => write!(f, "%whitespace"),
            DslToken::Precedence => write!(f, "%precedence"),
            DslToken::ErrorKw => write!(f, "error"),
            DslToken::Identifier(s) => write!(f, "{}", s),
            DslToken::Literal(s) => write!(f, "'{}'", s),
            DslToken::Regex(s) => write!(f, "\"{}\"", s),
            DslToken::Colon => write!(f, ":"),
            DslToken::Pipe => write!(f, "|"),
            DslToken::Semi => write!(f, ";"),
            DslToken::LeftBracket => write!(f, "["),
            DslToken::RightBracket => write!(f, "]"),
        }
    }
}

/// A token plus the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpannedToken {
    pub token: DslToken,
    pub line: usize,
}

impl fmt::Display for SpannedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.token.fmt(f)
    }
}

/// Process the escapes of a single-quoted literal.
fn unquote_literal(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Strip the quotes of a double-quoted regex, resolving only the `\"`
/// escape; everything else belongs to the regex language.
fn unquote_regex(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() == Some(&'"') {
            out.push('"');
            chars.next();
        } else {
            out.push(ch);
        }
    }
    out
}

/// Tokenize grammar source, attaching line numbers.
pub(crate) fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LalrkitError> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(
            source
                .char_indices()
                .filter(|&(_, c)| c == '\n')
                .map(|(i, _)| i + 1),
        )
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|&s| s <= offset);

    let mut lexer = RawToken::lexer(source);
    let mut out = Vec::new();
    while let Some(result) = lexer.next() {
        let line = line_of(lexer.span().start);
        let slice = lexer.slice();
        let token = match result {
            Ok(RawToken::Left) => DslToken::Left,
            Ok(RawToken::Right) => DslToken::Right,
            Ok(RawToken::NonePrec) => DslToken::NonePrec,
            Ok(RawToken::Nonassoc) => DslToken::Nonassoc,
            Ok(RawToken::Whitespace) => DslToken::Whitespace,
            Ok(RawToken::Precedence) => DslToken::Precedence,
            Ok(RawToken::ErrorKw) => DslToken::ErrorKw,
            Ok(RawToken::Identifier) => DslToken::Identifier(String::from(slice)),
            Ok(RawToken::Literal) => DslToken::Literal(unquote_literal(slice)),
            Ok(RawToken::Regex) => DslToken::Regex(unquote_regex(slice)),
            Ok(RawToken::Colon) => DslToken::Colon,
            Ok(RawToken::Pipe) => DslToken::Pipe,
            Ok(RawToken::Semi) => DslToken::Semi,
            Ok(RawToken::LeftBracket) => DslToken::LeftBracket,
            Ok(RawToken::RightBracket) => DslToken::RightBracket,
            Err(()) => {
                return Err(LalrkitError::Syntax {
                    line,
                    message: format!("unrecognized input {:?}", slice).into(),
                });
            }
        };
        out.push(SpannedToken { token, line });
    }
    Ok(out)
}
