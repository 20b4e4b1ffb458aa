//! The scanner runtime.
//!
//! [`Lexer`] drives two generated DFAs over a character iterator: a
//! whitespace machine whose matches are skipped, and a token machine whose
//! longest match at each position yields the next `(symbol, lexeme)` pair.
//! Ties between tokens are already resolved in the tables (lowest
//! declaration index); longest-match is enforced here by running the DFA to
//! exhaustion and rewinding to the last accepting position.

use crate::cursor::{LexerCursor, Span};
use crate::error::{ErrorSink, LalrkitError};
use crate::machine::LexerStateMachine;
use indexmap::IndexMap;
use smartstring::alias::String;
use std::iter::FusedIterator;

/// Counters maintained by the scanner.
#[derive(Debug, Clone, Default)]
pub struct LexerStats {
    /// Characters pulled from the input iterator.
    pub chars: usize,
    /// Characters pushed back after overrunning a match.
    pub pushbacks: usize,
    /// Tokens matched.
    pub matches: usize,
    /// Positions where no token matched.
    pub failures: usize,
}

/// Pulls additional input from inside a lexer action handler.
///
/// Handlers that consume past the matched lexeme (block comments, string
/// escapes) read through this instead of touching the scanner directly, so
/// position tracking stays consistent.
pub struct InputFeed<'a, I> {
    input: &'a mut I,
    pending: &'a mut Vec<char>,
    cursor: &'a mut LexerCursor,
    stats: &'a mut LexerStats,
}

impl<'a, I> InputFeed<'a, I>
where
    I: FusedIterator<Item = char>,
{
    /// Consume and return the next input character.
    pub fn next_char(&mut self) -> Option<char> {
        let ch = self.pending.pop().or_else(|| {
            self.stats.chars += 1;
            self.input.next()
        })?;
        self.cursor.advance(ch);
        Some(ch)
    }

    /// Push a character back; the next read re-delivers it.
    pub fn unread(&mut self, ch: char) {
        self.stats.pushbacks += 1;
        self.cursor.retreat(ch);
        self.pending.push(ch);
    }

    /// 1-based line of the read head.
    pub fn line(&self) -> usize {
        self.cursor.span.end.line
    }
}

/// Context handed to a lexer action handler when a match ends in an
/// accepting state that carries the action.
pub struct LexerActionContext<'a, I> {
    /// The matched lexeme; the handler may rewrite it.
    pub lexeme: &'a mut String,
    /// The matched symbol; clearing it suppresses the token and rescans.
    pub symbol: &'a mut Option<usize>,
    /// Further input, for handlers that consume past the match.
    pub feed: InputFeed<'a, I>,
}

pub type LexerActionHandler<I> =
    Box<dyn FnMut(&mut LexerActionContext<'_, I>) -> Result<(), LalrkitError>>;

struct RunMatch {
    length: usize,
    symbol: Option<usize>,
    action: Option<usize>,
    text: String,
}

/// A table-driven scanner over a character iterator.
///
/// The machines are borrowed immutably, so any number of `Lexer` instances
/// can share one generated table set across threads.
pub struct Lexer<'m, I> {
    tokens: &'m LexerStateMachine,
    whitespace: &'m LexerStateMachine,
    end_symbol: usize,
    handlers: IndexMap<String, LexerActionHandler<I>>,
    input: I,
    pending: Vec<char>,
    cursor: LexerCursor,
    lexeme: String,
    symbol: Option<usize>,
    full: bool,
    stats: LexerStats,
}

impl<'m, I> Lexer<'m, I>
where
    I: FusedIterator<Item = char>,
{
    pub fn new(
        tokens: &'m LexerStateMachine,
        whitespace: &'m LexerStateMachine,
        end_symbol: usize,
        input: I,
    ) -> Self {
        Self {
            tokens,
            whitespace,
            end_symbol,
            handlers: IndexMap::new(),
            input,
            pending: Vec::new(),
            cursor: LexerCursor::new(),
            lexeme: String::new(),
            symbol: None,
            full: false,
            stats: LexerStats::default(),
        }
    }

    /// Register the handler invoked for the lexer action `identifier`.
    ///
    /// Missing handlers are pass-through: the token is accepted as lexed.
    pub fn set_action_handler(&mut self, identifier: &str, handler: LexerActionHandler<I>) {
        self.handlers.insert(String::from(identifier), handler);
    }

    /// The most recently matched lexeme.
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// The most recently matched symbol, or `None` before the first
    /// [`advance`](Self::advance).
    pub fn symbol(&self) -> Option<usize> {
        self.symbol
    }

    /// The span of the most recent match.
    pub fn span(&self) -> Span {
        self.cursor.span
    }

    /// 1-based line of the most recent match.
    pub fn line(&self) -> usize {
        self.cursor.line()
    }

    /// True once the scanner has consumed all input and yielded the end
    /// symbol.
    pub fn full(&self) -> bool {
        self.full
    }

    pub fn stats(&self) -> LexerStats {
        self.stats.clone()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.pending.pop().or_else(|| {
            self.stats.chars += 1;
            self.input.next()
        })?;
        self.cursor.advance(ch);
        Some(ch)
    }

    fn push_back(&mut self, ch: char) {
        self.stats.pushbacks += 1;
        self.cursor.retreat(ch);
        self.pending.push(ch);
    }

    /// One run of `machine` from the current position.
    ///
    /// Consumes input until the DFA has no transition, then rewinds to the
    /// last accepting position. Returns `None` when no accepting state was
    /// ever entered.
    fn run(&mut self, machine: &LexerStateMachine) -> Option<RunMatch> {
        if machine.states.is_empty() {
            return None;
        }
        let mut state = machine.start_state;
        let mut consumed: Vec<char> = Vec::new();
        let entry = &machine.states[state];
        let mut last = entry
            .accepting
            .then_some((0usize, entry.accept, entry.action));

        loop {
            let Some(ch) = self.next_char() else {
                break;
            };
            consumed.push(ch);
            let Some(target) = machine.states[state].next(ch) else {
                break;
            };
            state = target;
            let entered = &machine.states[state];
            if entered.accepting {
                last = Some((consumed.len(), entered.accept, entered.action));
            }
        }

        let keep = last.map_or(0, |(len, _, _)| len);
        for &ch in consumed[keep..].iter().rev() {
            self.push_back(ch);
        }
        last.map(|(length, symbol, action)| RunMatch {
            length,
            symbol,
            action,
            text: consumed[..length].iter().collect::<std::string::String>().into(),
        })
    }

    /// Skip whitespace: run the whitespace machine repeatedly until it stops
    /// consuming input.
    fn skip(&mut self) {
        let whitespace = self.whitespace;
        loop {
            self.cursor.begin_match();
            match self.run(whitespace) {
                Some(m) if m.length > 0 => continue,
                _ => break,
            }
        }
    }

    fn fire_action(&mut self, action: usize) -> Result<(), LalrkitError> {
        let Some(identifier) = self.tokens.actions.get(action).map(|a| a.identifier.clone())
        else {
            return Ok(());
        };
        let Lexer {
            handlers,
            input,
            pending,
            cursor,
            stats,
            lexeme,
            symbol,
            ..
        } = self;
        let Some(handler) = handlers.get_mut(&identifier) else {
            return Ok(());
        };
        log::trace!("lexer action {:?} on {:?}", identifier, lexeme);
        let mut ctx = LexerActionContext {
            lexeme,
            symbol,
            feed: InputFeed {
                input,
                pending,
                cursor,
                stats,
            },
        };
        handler(&mut ctx)
    }

    /// Advance to the next token.
    ///
    /// Afterwards [`symbol`](Self::symbol) and [`lexeme`](Self::lexeme)
    /// describe the match; at end of input the symbol is the end symbol and
    /// [`full`](Self::full) turns true. Positions where no token matches are
    /// reported to `sink` as `LexerFailure`, skipped one character at a
    /// time, and rescanned.
    pub fn advance(&mut self, sink: &mut dyn ErrorSink) -> Result<(), LalrkitError> {
        if self.full {
            return Ok(());
        }
        let tokens = self.tokens;
        loop {
            self.skip();
            self.cursor.begin_match();

            match self.run(tokens) {
                Some(m) if m.length > 0 => {
                    self.stats.matches += 1;
                    self.lexeme = m.text;
                    self.symbol = m.symbol;
                    log::trace!(
                        "matched symbol {:?} lexeme {:?} at {}",
                        self.symbol,
                        self.lexeme,
                        self.cursor.span
                    );
                    if let Some(action) = m.action {
                        self.fire_action(action)?;
                    }
                    if self.symbol.is_some() {
                        return Ok(());
                    }
                    // the handler suppressed the token; scan again
                }
                _ => {
                    let Some(ch) = self.next_char() else {
                        self.lexeme.clear();
                        self.symbol = Some(self.end_symbol);
                        self.full = true;
                        return Ok(());
                    };
                    self.stats.failures += 1;
                    let err = LalrkitError::LexerFailure {
                        line: self.cursor.line(),
                        character: ch as u32,
                    };
                    log::trace!("{}", err);
                    err.report(sink);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollectSink, ErrorCode};
    use crate::machine::LexerStateMachine;
    use crate::test_machines;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn collect<'m>(
        lexer: &mut Lexer<'m, std::iter::Fuse<std::str::Chars<'_>>>,
        sink: &mut CollectSink,
    ) -> Vec<(usize, std::string::String)> {
        let mut out = Vec::new();
        while !lexer.full() {
            lexer.advance(sink).unwrap();
            out.push((lexer.symbol().unwrap(), lexer.lexeme().to_owned()));
        }
        out
    }

    #[test]
    fn longest_match_wins_over_keyword() {
        init_logger();
        let tokens = test_machines::letters_lexer();
        let whitespace = test_machines::spaces_whitespace();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "ifxy".chars().fuse());
        let out = collect(&mut lexer, &mut sink);
        assert_eq!(out, vec![(11, "ifxy".to_owned()), (99, "".to_owned())]);
        assert!(sink.is_empty());
    }

    #[test]
    fn declaration_order_breaks_equal_length_ties() {
        init_logger();
        let tokens = test_machines::letters_lexer();
        let whitespace = test_machines::spaces_whitespace();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "if fi".chars().fuse());
        let out = collect(&mut lexer, &mut sink);
        assert_eq!(
            out,
            vec![
                (10, "if".to_owned()),
                (11, "fi".to_owned()),
                (99, "".to_owned())
            ]
        );
    }

    #[test]
    fn whitespace_never_surfaces() {
        init_logger();
        let tokens = test_machines::letters_lexer();
        let whitespace = test_machines::spaces_whitespace();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "  ab\tc  ".chars().fuse());
        let out = collect(&mut lexer, &mut sink);
        assert_eq!(
            out,
            vec![
                (11, "ab".to_owned()),
                (11, "c".to_owned()),
                (99, "".to_owned())
            ]
        );
    }

    #[test]
    fn failure_is_reported_and_skipped() {
        init_logger();
        let tokens = test_machines::letters_lexer();
        let whitespace = test_machines::spaces_whitespace();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "ab9cd".chars().fuse());
        let out = collect(&mut lexer, &mut sink);
        assert_eq!(
            out,
            vec![
                (11, "ab".to_owned()),
                (11, "cd".to_owned()),
                (99, "".to_owned())
            ]
        );
        assert_eq!(sink.count(ErrorCode::LexerFailure), 1);
        assert!(sink.entries[0].2.contains("U+0039"));
    }

    #[test]
    fn empty_input_yields_end_immediately() {
        init_logger();
        let tokens = test_machines::letters_lexer();
        let whitespace = LexerStateMachine::empty();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "".chars().fuse());
        lexer.advance(&mut sink).unwrap();
        assert_eq!(lexer.symbol(), Some(99));
        assert!(lexer.full());
        // further advances are no-ops
        lexer.advance(&mut sink).unwrap();
        assert_eq!(lexer.symbol(), Some(99));
    }

    /// A machine for `"` whose accepting state fires the `string` action,
    /// plus letters; the handler is expected to consume the quoted body.
    fn quoted_lexer() -> LexerStateMachine {
        let mut machine = test_machines::letters_lexer();
        machine.actions.push(crate::machine::MachineAction {
            index: 0,
            identifier: "string".into(),
        });
        let quote_state = machine.states.len();
        machine.states.push(crate::machine::LexerState {
            index: quote_state,
            accepting: true,
            accept: Some(42),
            action: Some(0),
            ..Default::default()
        });
        machine.states[0].transitions.push(crate::machine::LexerTransition {
            begin: '"' as u32,
            end: '"' as u32 + 1,
            target: quote_state,
        });
        machine.states[0].transitions.sort_by_key(|t| t.begin);
        machine
    }

    #[test]
    fn action_handler_rewrites_the_lexeme() {
        init_logger();
        let tokens = quoted_lexer();
        let whitespace = test_machines::spaces_whitespace();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "\"abc\" if".chars().fuse());
        lexer.set_action_handler(
            "string",
            Box::new(|ctx| {
                let mut body = String::new();
                while let Some(ch) = ctx.feed.next_char() {
                    if ch == '"' {
                        break;
                    }
                    body.push(ch);
                }
                *ctx.lexeme = body;
                Ok(())
            }),
        );
        let out = collect(&mut lexer, &mut sink);
        assert_eq!(
            out,
            vec![
                (42, "abc".to_owned()),
                (10, "if".to_owned()),
                (99, "".to_owned())
            ]
        );
    }

    #[test]
    fn action_handler_can_suppress_the_token() {
        init_logger();
        let tokens = quoted_lexer();
        let whitespace = test_machines::spaces_whitespace();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "ab \"x\" cd".chars().fuse());
        lexer.set_action_handler(
            "string",
            Box::new(|ctx| {
                while let Some(ch) = ctx.feed.next_char() {
                    if ch == '"' {
                        break;
                    }
                }
                *ctx.symbol = None;
                Ok(())
            }),
        );
        let out = collect(&mut lexer, &mut sink);
        assert_eq!(
            out,
            vec![
                (11, "ab".to_owned()),
                (11, "cd".to_owned()),
                (99, "".to_owned())
            ]
        );
    }

    #[test]
    fn missing_action_handler_accepts_as_lexed() {
        init_logger();
        let tokens = quoted_lexer();
        let whitespace = test_machines::spaces_whitespace();
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "\"ab".chars().fuse());
        lexer.advance(&mut sink).unwrap();
        assert_eq!(lexer.symbol(), Some(42));
        assert_eq!(lexer.lexeme(), "\"");
    }

    #[test]
    fn spans_track_lines() {
        init_logger();
        let tokens = test_machines::letters_lexer();
        let whitespace = {
            // [ \t]+ plus newline
            let mut m = test_machines::spaces_whitespace();
            for state in &mut m.states {
                state.transitions.push(crate::machine::LexerTransition {
                    begin: '\n' as u32,
                    end: '\n' as u32 + 1,
                    target: 1,
                });
                state.transitions.sort_by_key(|t| t.begin);
            }
            m
        };
        let mut sink = CollectSink::new();
        let mut lexer = Lexer::new(&tokens, &whitespace, 99, "ab\n cd".chars().fuse());
        lexer.advance(&mut sink).unwrap();
        assert_eq!(lexer.line(), 1);
        lexer.advance(&mut sink).unwrap();
        assert_eq!(lexer.lexeme(), "cd");
        assert_eq!(lexer.line(), 2);
        assert_eq!(lexer.span().start.column, 1);
    }
}
