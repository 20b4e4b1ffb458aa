//! The shift/reduce parser runtime.
//!
//! [`Parser`] owns a [`Lexer`] and drives it one token at a time against a
//! generated [`ParserStateMachine`]. Semantic values of type `V` flow
//! through reduce handlers registered by action identifier; productions
//! without a handler pass the first right-hand-side value through.

use crate::error::{ErrorSink, LalrkitError};
use crate::lexer::{Lexer, LexerActionHandler, LexerStats};
use crate::machine::{LexerStateMachine, ParserActionKind, ParserStateMachine};
use indexmap::IndexMap;
use smartstring::alias::String;
use std::iter::FusedIterator;

/// One entry of the parse stack, handed to reduce handlers.
#[derive(Debug, Clone)]
pub struct ParserNode<V> {
    pub symbol: usize,
    /// The matched text for terminals; empty for nonterminals.
    pub lexeme: String,
    /// 1-based line the node started on.
    pub line: usize,
    pub value: V,
}

pub type ReduceHandler<V> = Box<dyn FnMut(&[ParserNode<V>]) -> Result<V, LalrkitError>>;

/// Counters maintained by the parser.
#[derive(Debug, Clone, Default)]
pub struct ParserStats {
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
    /// Syntax errors encountered (recovered or not).
    pub errors: usize,
}

/// A table-driven LALR(1) parser over a character iterator.
pub struct Parser<'m, I, V> {
    machine: &'m ParserStateMachine,
    lexer: Lexer<'m, I>,
    handlers: IndexMap<String, ReduceHandler<V>>,
    states: Vec<usize>,
    nodes: Vec<ParserNode<V>>,
    accepted: bool,
    recovering: bool,
    stats: ParserStats,
}

impl<'m, I, V> Parser<'m, I, V>
where
    I: FusedIterator<Item = char>,
    V: Clone + Default,
{
    pub fn new(
        machine: &'m ParserStateMachine,
        tokens: &'m LexerStateMachine,
        whitespace: &'m LexerStateMachine,
        input: I,
    ) -> Self {
        let lexer = Lexer::new(tokens, whitespace, machine.end_symbol, input);
        Self {
            machine,
            lexer,
            handlers: IndexMap::new(),
            states: Vec::new(),
            nodes: Vec::new(),
            accepted: false,
            recovering: false,
            stats: ParserStats::default(),
        }
    }

    /// Register the handler invoked when a production tagged with the
    /// reduce action `identifier` is reduced.
    pub fn set_reduce_handler(&mut self, identifier: &str, handler: ReduceHandler<V>) {
        self.handlers.insert(String::from(identifier), handler);
    }

    /// Register a lexer action handler on the underlying scanner.
    pub fn set_lexer_action_handler(&mut self, identifier: &str, handler: LexerActionHandler<I>) {
        self.lexer.set_action_handler(identifier, handler);
    }

    /// Did the last [`parse`](Self::parse) accept its input?
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Did the scanner consume all input?
    pub fn full(&self) -> bool {
        self.lexer.full()
    }

    /// The semantic value of the accepted parse, if any.
    pub fn value(&self) -> Option<&V> {
        if !self.accepted {
            return None;
        }
        self.nodes.last().map(|n| &n.value)
    }

    /// Consume the parser and return the accepted value, if any.
    pub fn into_value(mut self) -> Option<V> {
        if !self.accepted {
            return None;
        }
        self.nodes.pop().map(|n| n.value)
    }

    pub fn stats(&self) -> (LexerStats, ParserStats) {
        (self.lexer.stats(), self.stats.clone())
    }

    /// Parse the entire input.
    ///
    /// Returns whether the input was accepted. Syntax errors are reported to
    /// `sink`; when the grammar mentions the error-recovery symbol the
    /// parser resynchronizes and keeps going, otherwise it stops. A parser
    /// is single-shot: its input iterator is consumed by the first call.
    pub fn parse(&mut self, sink: &mut dyn ErrorSink) -> Result<bool, LalrkitError> {
        let machine = self.machine;
        self.states.clear();
        self.nodes.clear();
        self.accepted = false;
        self.recovering = false;
        self.states.push(machine.start_state);

        self.lexer.advance(sink)?;
        self.stats.tokens += 1;

        loop {
            let state = self.states[self.states.len() - 1];
            let symbol = self.lexer.symbol().unwrap_or(machine.end_symbol);
            let (kind, value) = machine.action(state, symbol);
            match kind {
                ParserActionKind::Shift => {
                    log::trace!("shift {:?} -> state {}", self.lexer.lexeme(), value);
                    self.recovering = false;
                    self.nodes.push(ParserNode {
                        symbol,
                        lexeme: String::from(self.lexer.lexeme()),
                        line: self.lexer.line(),
                        value: V::default(),
                    });
                    self.states.push(value);
                    self.stats.shifts += 1;
                    self.lexer.advance(sink)?;
                    self.stats.tokens += 1;
                }

                ParserActionKind::Reduce => {
                    self.reduce(value)?;
                }

                ParserActionKind::Accept => {
                    log::trace!("accept");
                    self.accepted = true;
                    return Ok(true);
                }

                ParserActionKind::Error => {
                    // while resynchronizing, discard lookaheads instead of
                    // re-entering recovery, so every iteration makes progress
                    if self.recovering {
                        if symbol == machine.end_symbol {
                            return Ok(false);
                        }
                        log::trace!("error recovery: discarding {:?}", self.lexer.lexeme());
                        self.lexer.advance(sink)?;
                        self.stats.tokens += 1;
                        continue;
                    }
                    self.stats.errors += 1;
                    let err = LalrkitError::ParserFailure {
                        line: self.lexer.line(),
                        lexeme: String::from(self.lexer.lexeme()),
                    };
                    log::trace!("{}", err);
                    err.report(sink);
                    if !self.recover(sink)? {
                        return Ok(false);
                    }
                    self.recovering = true;
                }

                ParserActionKind::Goto => unreachable!("goto on a terminal column"),
            }
        }
    }

    fn reduce(&mut self, production: usize) -> Result<(), LalrkitError> {
        let machine = self.machine;
        let reduction = &machine.reductions[production];
        let base = self.nodes.len() - reduction.length;

        let value = match reduction.action {
            Some(action) => {
                let identifier = &machine.actions[action].identifier;
                log::trace!("reduce production {} [{}]", production, identifier);
                match self.handlers.get_mut(identifier) {
                    Some(handler) => handler(&self.nodes[base..])?,
                    None => Self::pass_through(&self.nodes[base..]),
                }
            }
            None => {
                log::trace!("reduce production {}", production);
                Self::pass_through(&self.nodes[base..])
            }
        };
        let line = self
            .nodes
            .get(base)
            .map_or_else(|| self.lexer.line(), |n| n.line);

        self.nodes.truncate(base);
        self.states.truncate(self.states.len() - reduction.length);

        let top = self.states[self.states.len() - 1];
        let (kind, target) = machine.action(top, reduction.symbol);
        debug_assert_eq!(kind, ParserActionKind::Goto);
        self.nodes.push(ParserNode {
            symbol: reduction.symbol,
            lexeme: String::new(),
            line,
            value,
        });
        self.states.push(target);
        self.stats.reductions += 1;
        Ok(())
    }

    fn pass_through(nodes: &[ParserNode<V>]) -> V {
        match nodes.first() {
            Some(n) => n.value.clone(),
            None => V::default(),
        }
    }

    /// Resynchronize through the error-recovery symbol: pop states until it
    /// is shiftable, shift it, then discard lookaheads until one has a
    /// defined action.
    fn recover(&mut self, sink: &mut dyn ErrorSink) -> Result<bool, LalrkitError> {
        let machine = self.machine;
        if !machine.recovers() {
            return Ok(false);
        }

        loop {
            let state = self.states[self.states.len() - 1];
            let (kind, target) = machine.action(state, machine.error_symbol);
            if kind == ParserActionKind::Shift {
                log::trace!("error recovery: shifting error symbol in state {}", state);
                self.nodes.push(ParserNode {
                    symbol: machine.error_symbol,
                    lexeme: String::new(),
                    line: self.lexer.line(),
                    value: V::default(),
                });
                self.states.push(target);
                break;
            }
            if self.states.len() == 1 {
                return Ok(false);
            }
            self.states.pop();
            if self.nodes.len() >= self.states.len() {
                self.nodes.pop();
            }
        }

        loop {
            let state = self.states[self.states.len() - 1];
            let symbol = self.lexer.symbol().unwrap_or(machine.end_symbol);
            let (kind, _) = machine.action(state, symbol);
            if kind != ParserActionKind::Error {
                return Ok(true);
            }
            if symbol == machine.end_symbol {
                return Ok(false);
            }
            log::trace!("error recovery: discarding {:?}", self.lexer.lexeme());
            self.lexer.advance(sink)?;
            self.stats.tokens += 1;
        }
    }
}
