//! Error taxonomy shared by the generator and the runtime, plus the sink
//! interface through which both report non-fatal diagnostics.

use num_enum::IntoPrimitive;
use smartstring::alias::String;
use thiserror::Error;

/// Numeric code attached to every reported diagnostic.
///
/// Codes are stable across releases so downstream tooling can match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive)]
#[repr(u32)]
pub enum ErrorCode {
    /// Malformed grammar source or malformed regular expression.
    SyntaxError = 1,
    /// A symbol is referenced but never defined or declared as a terminal.
    UndeclaredSymbol = 2,
    /// A nonterminal that cannot derive any terminal string.
    UnproductiveSymbol = 3,
    /// A nonterminal not reachable from the start symbol.
    UnreachableSymbol = 4,
    /// A shift and a reduction collide in one table cell.
    ShiftReduceConflict = 5,
    /// Two reductions collide in one table cell.
    ReduceReduceConflict = 6,
    /// No token matches at the scanner's current position.
    LexerFailure = 7,
    /// The parse table has no action for the current state and lookahead.
    ParserFailure = 8,
    /// A registered semantic action handler returned an error.
    ActionFailed = 9,
}

/// Errors produced while building grammars, generating tables, or driving
/// the generated machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LalrkitError {
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("undeclared symbol `{symbol}` referenced at line {line}")]
    UndeclaredSymbol { line: usize, symbol: String },

    #[error("nonterminal `{symbol}` cannot derive any terminal string")]
    UnproductiveSymbol { symbol: String },

    #[error("nonterminal `{symbol}` is unreachable from the start symbol")]
    UnreachableSymbol { symbol: String },

    #[error("shift/reduce conflict in state {state} on `{symbol}`")]
    ShiftReduceConflict { state: usize, symbol: String },

    #[error("reduce/reduce conflict in state {state} on `{symbol}`")]
    ReduceReduceConflict { state: usize, symbol: String },

    #[error("no token matches at line {line}: unexpected character U+{character:04X}")]
    LexerFailure { line: usize, character: u32 },

    #[error("syntax error at line {line}: unexpected `{lexeme}`")]
    ParserFailure { line: usize, lexeme: String },

    #[error("action handler `{identifier}` failed at line {line}: {message}")]
    ActionFailed {
        line: usize,
        identifier: String,
        message: String,
    },
}

impl LalrkitError {
    /// The numeric code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            LalrkitError::Syntax { .. } => ErrorCode::SyntaxError,
            LalrkitError::UndeclaredSymbol { .. } => ErrorCode::UndeclaredSymbol,
            LalrkitError::UnproductiveSymbol { .. } => ErrorCode::UnproductiveSymbol,
            LalrkitError::UnreachableSymbol { .. } => ErrorCode::UnreachableSymbol,
            LalrkitError::ShiftReduceConflict { .. } => ErrorCode::ShiftReduceConflict,
            LalrkitError::ReduceReduceConflict { .. } => ErrorCode::ReduceReduceConflict,
            LalrkitError::LexerFailure { .. } => ErrorCode::LexerFailure,
            LalrkitError::ParserFailure { .. } => ErrorCode::ParserFailure,
            LalrkitError::ActionFailed { .. } => ErrorCode::ActionFailed,
        }
    }

    /// The source line this error refers to, when one is known.
    pub fn line(&self) -> Option<usize> {
        match self {
            LalrkitError::Syntax { line, .. }
            | LalrkitError::UndeclaredSymbol { line, .. }
            | LalrkitError::LexerFailure { line, .. }
            | LalrkitError::ParserFailure { line, .. }
            | LalrkitError::ActionFailed { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Report this error through `sink` without consuming it.
    pub fn report(&self, sink: &mut dyn ErrorSink) {
        sink.error(self.line().unwrap_or(0), self.code(), &self.to_string());
    }
}

/// Receives diagnostics from the generator and the runtime.
///
/// Generation and parsing deliver every non-fatal problem through this
/// interface synchronously and keep going with the documented deterministic
/// resolution; callers decide whether a run with reported errors is usable.
pub trait ErrorSink {
    /// Report an error on `line` (0 when no line is known).
    fn error(&mut self, line: usize, code: ErrorCode, message: &str);

    /// Emit free-form debug output.
    fn printf(&mut self, message: &str) {
        let _ = message;
    }
}

/// Sink that forwards everything to stderr.
#[derive(Debug, Default)]
pub struct StderrSink;

impl ErrorSink for StderrSink {
    fn error(&mut self, line: usize, code: ErrorCode, message: &str) {
        if line > 0 {
            eprintln!("lalrkit: line {line}: {code:?}: {message}");
        } else {
            eprintln!("lalrkit: {code:?}: {message}");
        }
    }

    fn printf(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Sink that records diagnostics for later inspection; used by tests and by
/// callers that want to decide on fatality themselves.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub entries: Vec<(usize, ErrorCode, std::string::String)>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded diagnostics with the given code.
    pub fn count(&self, code: ErrorCode) -> usize {
        self.entries.iter().filter(|(_, c, _)| *c == code).count()
    }

    /// Were any diagnostics recorded at all?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ErrorSink for CollectSink {
    fn error(&mut self, line: usize, code: ErrorCode, message: &str) {
        self.entries.push((line, code, message.to_owned()));
    }
}
