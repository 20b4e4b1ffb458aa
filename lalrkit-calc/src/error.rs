//! Error type for the calculator.

use lalrkit::LalrkitError;
use smartstring::alias::String;
use thiserror::Error;

/// Everything that can go wrong between an input string and a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    /// The toolkit reported a hard failure (a handler error, usually).
    #[error(transparent)]
    Parse(#[from] LalrkitError),

    /// The input was scanned but not accepted by the grammar.
    #[error("invalid expression: {message}")]
    Rejected { message: String },
}
