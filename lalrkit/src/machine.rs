//! Immutable state-machine tables produced by the generator and executed by
//! the runtime.
//!
//! Both machines are plain flat vectors with index cross-references, so a
//! generated machine can be shared read-only between any number of scanner
//! or parser instances on separate threads.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use smartstring::alias::String;

/// Classification of a symbol in a generated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SymbolKind {
    /// Never classified; only appears in malformed grammars.
    Null = 0,
    Terminal = 1,
    NonTerminal = 2,
    /// The end-of-input symbol.
    End = 3,
}

/// One entry of a machine's symbol array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSymbol {
    pub index: usize,
    /// Sanitized name, unique within the machine.
    pub identifier: String,
    /// The literal text or regular expression this symbol was declared with.
    pub lexeme: String,
    pub kind: SymbolKind,
}

/// One entry of a machine's semantic-action array.
///
/// Actions are referenced by index from reductions and from accepting lexer
/// states; handlers are registered at runtime by `identifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineAction {
    pub index: usize,
    pub identifier: String,
}

/// Discriminant of a packed parse-table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ParserActionKind {
    Error = 0,
    Shift = 1,
    Reduce = 2,
    Accept = 3,
    Goto = 4,
}

/// A packed parse-table cell: on `symbol`, perform `kind`.
///
/// `value` is the destination state for `Shift`/`Goto` and the production
/// index for `Reduce`; it is unused for `Accept` and `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserTransition {
    pub symbol: usize,
    pub kind: ParserActionKind,
    pub value: usize,
}

/// One parser state: its cells, sorted by symbol index.
///
/// Cells absent from `transitions` are `Error`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    pub index: usize,
    pub transitions: Vec<ParserTransition>,
}

impl ParserState {
    /// Look up the cell for `symbol`.
    pub fn find(&self, symbol: usize) -> Option<&ParserTransition> {
        self.transitions
            .binary_search_by_key(&symbol, |t| t.symbol)
            .ok()
            .map(|i| &self.transitions[i])
    }
}

/// Metadata needed to apply one reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserReduction {
    /// Index of the production being reduced.
    pub production: usize,
    /// The left-hand-side symbol pushed after popping.
    pub symbol: usize,
    /// Number of right-hand-side symbols popped.
    pub length: usize,
    /// Semantic action to invoke, if any.
    pub action: Option<usize>,
}

/// The complete shift/reduce automaton for one grammar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserStateMachine {
    /// The grammar identifier the machine was generated from.
    pub identifier: String,
    pub symbols: Vec<MachineSymbol>,
    pub actions: Vec<MachineAction>,
    pub states: Vec<ParserState>,
    /// Indexed by production.
    pub reductions: Vec<ParserReduction>,
    pub start_state: usize,
    /// Index of the augmented start symbol.
    pub start_symbol: usize,
    /// Index of the end-of-input symbol (always the last symbol).
    pub end_symbol: usize,
    /// Index of the error-recovery symbol.
    pub error_symbol: usize,
}

impl ParserStateMachine {
    /// The action for `state` on `symbol`; missing cells are `Error`.
    pub fn action(&self, state: usize, symbol: usize) -> (ParserActionKind, usize) {
        match self.states[state].find(symbol) {
            Some(t) => (t.kind, t.value),
            None => (ParserActionKind::Error, 0),
        }
    }

    /// Does any state shift the error-recovery symbol?
    pub fn recovers(&self) -> bool {
        self.states.iter().any(|s| {
            matches!(
                s.find(self.error_symbol),
                Some(ParserTransition {
                    kind: ParserActionKind::Shift,
                    ..
                })
            )
        })
    }
}

/// A scanner DFA edge over the half-open code point range `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerTransition {
    pub begin: u32,
    pub end: u32,
    pub target: usize,
}

/// One scanner DFA state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexerState {
    pub index: usize,
    /// Sorted, pairwise-disjoint ranges.
    pub transitions: Vec<LexerTransition>,
    pub accepting: bool,
    /// Symbol recognized in this state; `None` for whitespace machines.
    pub accept: Option<usize>,
    /// Lexer action fired when a match ends in this state.
    pub action: Option<usize>,
}

impl LexerState {
    /// The state entered on `ch`, if any.
    pub fn next(&self, ch: char) -> Option<usize> {
        let cp = ch as u32;
        let idx = self
            .transitions
            .partition_point(|t| t.end <= cp);
        let t = self.transitions.get(idx)?;
        (t.begin <= cp && cp < t.end).then_some(t.target)
    }
}

/// A complete scanner DFA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexerStateMachine {
    pub actions: Vec<MachineAction>,
    pub states: Vec<LexerState>,
    pub start_state: usize,
}

impl LexerStateMachine {
    /// A machine that matches nothing; scanning over it is a no-op.
    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            states: vec![LexerState::default()],
            start_state: 0,
        }
    }

    /// Does this machine match anything at all?
    pub fn is_empty(&self) -> bool {
        self.states.iter().all(|s| !s.accepting && s.transitions.is_empty())
    }
}
