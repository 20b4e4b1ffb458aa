//! Hand-written machine fixtures for runtime and codec tests.
//!
//! The parser fixture encodes the grammar `S: 'a';` after augmentation,
//! with the symbol numbering the generator produces: `.start` = 0, `S` = 1,
//! `.error` = 2, `'a'` = 3, `.end` = 4.

use crate::machine::{
    LexerState, LexerStateMachine, LexerTransition, MachineAction, MachineSymbol,
    ParserActionKind, ParserReduction, ParserState, ParserStateMachine, ParserTransition,
    SymbolKind,
};

fn symbol(index: usize, identifier: &str, lexeme: &str, kind: SymbolKind) -> MachineSymbol {
    MachineSymbol {
        index,
        identifier: identifier.into(),
        lexeme: lexeme.into(),
        kind,
    }
}

/// Parse tables for `S: 'a';`.
pub fn single_token_parser() -> ParserStateMachine {
    ParserStateMachine {
        identifier: "single".into(),
        symbols: vec![
            symbol(0, "dot_start", ".start", SymbolKind::NonTerminal),
            symbol(1, "S", "S", SymbolKind::NonTerminal),
            symbol(2, "dot_error", ".error", SymbolKind::Terminal),
            symbol(3, "a", "a", SymbolKind::Terminal),
            symbol(4, "dot_end", ".end", SymbolKind::End),
        ],
        actions: vec![MachineAction {
            index: 0,
            identifier: "promote".into(),
        }],
        states: vec![
            ParserState {
                index: 0,
                transitions: vec![
                    ParserTransition {
                        symbol: 1,
                        kind: ParserActionKind::Goto,
                        value: 1,
                    },
                    ParserTransition {
                        symbol: 3,
                        kind: ParserActionKind::Shift,
                        value: 2,
                    },
                ],
            },
            ParserState {
                index: 1,
                transitions: vec![ParserTransition {
                    symbol: 4,
                    kind: ParserActionKind::Accept,
                    value: 0,
                }],
            },
            ParserState {
                index: 2,
                transitions: vec![ParserTransition {
                    symbol: 4,
                    kind: ParserActionKind::Reduce,
                    value: 1,
                }],
            },
        ],
        reductions: vec![
            ParserReduction {
                production: 0,
                symbol: 0,
                length: 2,
                action: None,
            },
            ParserReduction {
                production: 1,
                symbol: 1,
                length: 1,
                action: Some(0),
            },
        ],
        start_state: 0,
        start_symbol: 0,
        end_symbol: 4,
        error_symbol: 2,
    }
}

/// Scanner for the single terminal `'a'` (symbol 3 above).
pub fn a_lexer() -> LexerStateMachine {
    LexerStateMachine {
        actions: vec![],
        states: vec![
            LexerState {
                index: 0,
                transitions: vec![LexerTransition {
                    begin: 'a' as u32,
                    end: 'a' as u32 + 1,
                    target: 1,
                }],
                ..LexerState::default()
            },
            LexerState {
                index: 1,
                accepting: true,
                accept: Some(3),
                ..LexerState::default()
            },
        ],
        start_state: 0,
    }
}

/// Scanner for the keyword `if` (symbol 10) competing with `[a-z]+`
/// (symbol 11); `if` is declared first, so ties break in its favor.
pub fn letters_lexer() -> LexerStateMachine {
    let letters = |except: Option<char>, target_except: usize| -> Vec<LexerTransition> {
        match except {
            None => vec![LexerTransition {
                begin: 'a' as u32,
                end: 'z' as u32 + 1,
                target: 2,
            }],
            Some(c) => vec![
                LexerTransition {
                    begin: 'a' as u32,
                    end: c as u32,
                    target: 2,
                },
                LexerTransition {
                    begin: c as u32,
                    end: c as u32 + 1,
                    target: target_except,
                },
                LexerTransition {
                    begin: c as u32 + 1,
                    end: 'z' as u32 + 1,
                    target: 2,
                },
            ],
        }
    };
    LexerStateMachine {
        actions: vec![],
        states: vec![
            LexerState {
                index: 0,
                transitions: letters(Some('i'), 1),
                ..LexerState::default()
            },
            LexerState {
                index: 1,
                transitions: letters(Some('f'), 3),
                accepting: true,
                accept: Some(11),
                ..LexerState::default()
            },
            LexerState {
                index: 2,
                transitions: letters(None, 2),
                accepting: true,
                accept: Some(11),
                ..LexerState::default()
            },
            LexerState {
                index: 3,
                transitions: letters(None, 2),
                accepting: true,
                accept: Some(10),
                ..LexerState::default()
            },
        ],
        start_state: 0,
    }
}

/// Whitespace scanner for `[ \t]+`.
pub fn spaces_whitespace() -> LexerStateMachine {
    let blanks = vec![
        LexerTransition {
            begin: '\t' as u32,
            end: '\t' as u32 + 1,
            target: 1,
        },
        LexerTransition {
            begin: ' ' as u32,
            end: ' ' as u32 + 1,
            target: 1,
        },
    ];
    LexerStateMachine {
        actions: vec![],
        states: vec![
            LexerState {
                index: 0,
                transitions: blanks.clone(),
                ..LexerState::default()
            },
            LexerState {
                index: 1,
                transitions: blanks,
                accepting: true,
                ..LexerState::default()
            },
        ],
        start_state: 0,
    }
}
