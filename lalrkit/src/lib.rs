//! Core runtime for the lalrkit parser-generator toolkit.
//!
//! `lalrkit` holds everything a host application needs to *execute* tables
//! produced by `lalrkit-gen`:
//!
//!  * [`LexerStateMachine`] / [`ParserStateMachine`]: the immutable,
//!    index-linked table types,
//!  * [`Lexer`]: a longest-match scanner over a character iterator,
//!  * [`Parser`]: a shift/reduce driver with reduce handlers and
//!    error-symbol recovery,
//!  * [`codec`]: the fixed binary layout for persisting generated tables,
//!  * [`LalrkitError`] / [`ErrorSink`]: the shared error taxonomy and the
//!    sink through which non-fatal diagnostics are delivered.
//!
//! Machines are read-only after generation; any number of scanner or parser
//! instances may share one table set across threads.

pub mod codec;
mod cursor;
mod error;
mod lexer;
mod machine;
mod parser;
#[cfg(test)]
mod test_machines;

pub use crate::cursor::{LexerCursor, Position, Span};
pub use crate::error::{CollectSink, ErrorCode, ErrorSink, LalrkitError, StderrSink};
pub use crate::lexer::{
    InputFeed, Lexer, LexerActionContext, LexerActionHandler, LexerStats,
};
pub use crate::machine::{
    LexerState, LexerStateMachine, LexerTransition, MachineAction, MachineSymbol,
    ParserActionKind, ParserReduction, ParserState, ParserStateMachine, ParserTransition,
    SymbolKind,
};
pub use crate::parser::{Parser, ParserNode, ParserStats, ReduceHandler};
