//! Parse-table construction and conflict resolution.
//!
//! Each state's closed item set is turned into one packed table row:
//! shifts and gotos from the state's transitions, reductions from completed
//! items over their lookaheads, and Accept for `.start → S · .end` on
//! `.end`. Collisions are resolved deterministically:
//!
//!  * shift/reduce with an unspecified precedence on either side: warn,
//!    keep the shift;
//!  * otherwise the higher precedence wins; on a tie the terminal's
//!    associativity decides (left → reduce, right → shift, nonassoc →
//!    error cell), and the tie itself is reported;
//!  * reduce/reduce: always reported, the smaller production index wins.

use crate::grammar::{Associativity, Grammar, SymbolType};
use crate::items::{closure, ItemSets};
use lalrkit::{
    ErrorSink, LalrkitError, MachineAction, MachineSymbol, ParserActionKind, ParserReduction,
    ParserState, ParserStateMachine, ParserTransition, SymbolKind,
};
use std::collections::BTreeMap;

/// The precedence a production reduces with: its explicit override, else
/// its rightmost terminal, else 0.
fn production_precedence(grammar: &Grammar, production: usize) -> usize {
    let p = grammar.production(production);
    if let Some(symbol) = p.precedence_symbol {
        return grammar.symbol(symbol).precedence;
    }
    p.right
        .iter()
        .rev()
        .find(|&&s| grammar.symbol(s).is_terminal())
        .map_or(0, |&s| grammar.symbol(s).precedence)
}

fn resolve_shift_reduce(
    grammar: &Grammar,
    state: usize,
    terminal: usize,
    production: usize,
    shift_target: usize,
    sink: &mut dyn ErrorSink,
) -> (ParserActionKind, usize) {
    let shift = (ParserActionKind::Shift, shift_target);
    let reduce = (ParserActionKind::Reduce, production);
    let terminal_precedence = grammar.symbol(terminal).precedence;
    let reduce_precedence = production_precedence(grammar, production);

    if terminal_precedence == 0 || reduce_precedence == 0 {
        LalrkitError::ShiftReduceConflict {
            state,
            symbol: grammar.symbol(terminal).lexeme.clone(),
        }
        .report(sink);
        return shift;
    }
    if reduce_precedence > terminal_precedence {
        return reduce;
    }
    if reduce_precedence < terminal_precedence {
        return shift;
    }
    LalrkitError::ShiftReduceConflict {
        state,
        symbol: grammar.symbol(terminal).lexeme.clone(),
    }
    .report(sink);
    match grammar.symbol(terminal).associativity {
        Associativity::Left => reduce,
        Associativity::Right => shift,
        Associativity::Nonassoc => (ParserActionKind::Error, 0),
        Associativity::None => shift,
    }
}

/// Build the parser machine from the canonical collection.
pub(crate) fn build_tables(
    grammar: &Grammar,
    sets: &ItemSets,
    sink: &mut dyn ErrorSink,
) -> ParserStateMachine {
    let end = grammar.end_symbol();
    let mut states = Vec::with_capacity(sets.states.len());

    for (index, state) in sets.states.iter().enumerate() {
        let closed = closure(grammar, &state.kernel);
        let mut cells: BTreeMap<usize, (ParserActionKind, usize)> = BTreeMap::new();

        for (&symbol, &target) in &state.transitions {
            let kind = if grammar.symbol(symbol).is_non_terminal() {
                ParserActionKind::Goto
            } else {
                ParserActionKind::Shift
            };
            cells.insert(symbol, (kind, target));
        }

        if closed.contains_key(&(0, 1)) {
            cells.insert(end, (ParserActionKind::Accept, 0));
        }

        for ((production, dot), lookahead) in &closed {
            if *production == 0 || *dot != grammar.production(*production).right.len() {
                continue;
            }
            for &terminal in lookahead {
                match cells.get(&terminal).copied() {
                    None => {
                        cells.insert(terminal, (ParserActionKind::Reduce, *production));
                    }
                    Some((ParserActionKind::Shift, target)) => {
                        let resolved = resolve_shift_reduce(
                            grammar, index, terminal, *production, target, sink,
                        );
                        cells.insert(terminal, resolved);
                    }
                    Some((ParserActionKind::Reduce, other)) => {
                        LalrkitError::ReduceReduceConflict {
                            state: index,
                            symbol: grammar.symbol(terminal).lexeme.clone(),
                        }
                        .report(sink);
                        cells.insert(
                            terminal,
                            (ParserActionKind::Reduce, other.min(*production)),
                        );
                    }
                    // an explicit error cell (nonassoc) or Accept stays
                    Some(_) => {}
                }
            }
        }

        let transitions = cells
            .into_iter()
            .filter(|&(_, (kind, _))| kind != ParserActionKind::Error)
            .map(|(symbol, (kind, value))| ParserTransition {
                symbol,
                kind,
                value,
            })
            .collect();
        states.push(ParserState { index, transitions });
    }

    let symbols = grammar
        .symbols()
        .iter()
        .map(|s| MachineSymbol {
            index: s.index,
            identifier: s.identifier.clone(),
            lexeme: s.lexeme.clone(),
            kind: match s.symbol_type {
                SymbolType::Null => SymbolKind::Null,
                SymbolType::Terminal => SymbolKind::Terminal,
                SymbolType::NonTerminal => SymbolKind::NonTerminal,
                SymbolType::End => SymbolKind::End,
            },
        })
        .collect();
    let actions = grammar
        .actions()
        .iter()
        .map(|a| MachineAction {
            index: a.index,
            identifier: a.identifier.clone(),
        })
        .collect();
    let reductions = grammar
        .productions()
        .iter()
        .map(|p| ParserReduction {
            production: p.index,
            symbol: p.symbol,
            length: p.right.len(),
            action: p.action,
        })
        .collect();

    log::debug!(
        "parser machine: {} states over {} symbols",
        sets.states.len(),
        grammar.symbols().len()
    );
    ParserStateMachine {
        identifier: grammar.identifier().into(),
        symbols,
        actions,
        states,
        reductions,
        start_state: 0,
        start_symbol: grammar.start_symbol(),
        end_symbol: end,
        error_symbol: grammar.error_symbol(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::first_follow;
    use crate::generate::tests_support::numbered_grammar;
    use crate::items;
    use lalrkit::{CollectSink, ErrorCode};

    fn tables_for(source: &str) -> (Grammar, ParserStateMachine, CollectSink) {
        let mut grammar = numbered_grammar(source);
        first_follow::compute(&mut grammar);
        let sets = items::build(&grammar);
        let mut sink = CollectSink::new();
        let machine = build_tables(&grammar, &sets, &mut sink);
        (grammar, machine, sink)
    }

    fn index_of(grammar: &Grammar, lexeme: &str) -> usize {
        grammar
            .symbols()
            .iter()
            .find(|s| &*s.lexeme == lexeme)
            .unwrap()
            .index
    }

    #[test]
    fn tables_are_complete_and_contiguous() {
        let (grammar, machine, sink) = tables_for(
            "expr;
             %left '+';
             %left '*';
             E : E '+' T | T;
             T : T '*' F | F;
             F : '(' E ')' | 'n';",
        );
        assert!(sink.is_empty());
        for (i, state) in machine.states.iter().enumerate() {
            assert_eq!(state.index, i);
            for t in &state.transitions {
                assert!(t.symbol < grammar.symbols().len());
                match t.kind {
                    ParserActionKind::Shift | ParserActionKind::Goto => {
                        assert!(t.value < machine.states.len());
                    }
                    ParserActionKind::Reduce => {
                        assert!(t.value < machine.reductions.len());
                    }
                    ParserActionKind::Accept => {}
                    ParserActionKind::Error => panic!("explicit error cell was packed"),
                }
            }
        }
        // exactly one accept cell, on the end symbol
        let accepts: Vec<_> = machine
            .states
            .iter()
            .flat_map(|s| s.transitions.iter())
            .filter(|t| t.kind == ParserActionKind::Accept)
            .collect();
        assert_eq!(accepts.len(), 1);
        assert_eq!(accepts[0].symbol, machine.end_symbol);
    }

    #[test]
    fn precedence_resolves_without_a_report() {
        // the classic dangling arithmetic case: no conflicts surface
        // because '+' and '*' have distinct precedences
        let (_, _, sink) = tables_for(
            "expr;
             %left '+';
             %left '*';
             E : E '+' E | E '*' E | 'n';",
        );
        // the '+'-vs-'+' and '*'-vs-'*' ties are associativity-resolved
        // and reported; the cross-precedence cells are silent, so exactly
        // one tie report appears per completed binary production
        assert_eq!(sink.count(ErrorCode::ShiftReduceConflict), 2);
    }

    #[test]
    fn left_associativity_reduces_on_the_tie() {
        let (grammar, machine, sink) = tables_for(
            "g;
             %left '+';
             E : E '+' E | 'n';",
        );
        assert_eq!(sink.count(ErrorCode::ShiftReduceConflict), 1);
        let plus = index_of(&grammar, "+");
        // the state with the completed item E → E '+' E · reduces
        // production 1 at end of input; on the tied '+' it must reduce too
        let conflicted = machine
            .states
            .iter()
            .find(|s| {
                s.find(machine.end_symbol)
                    .is_some_and(|t| t.kind == ParserActionKind::Reduce && t.value == 1)
            })
            .expect("completed-item state");
        let cell = conflicted.find(plus).expect("resolved cell");
        assert_eq!(cell.kind, ParserActionKind::Reduce);
        assert_eq!(cell.value, 1);
    }

    #[test]
    fn nonassoc_tie_becomes_an_error_cell() {
        let (grammar, machine, sink) = tables_for(
            "g;
             %nonassoc '<';
             E : E '<' E | 'n';",
        );
        assert_eq!(sink.count(ErrorCode::ShiftReduceConflict), 1);
        let lt = index_of(&grammar, "<");
        // the state with the completed item E → E '<' E · reduces
        // production 1 at end of input; its tied '<' cell is an error hole
        let conflicted = machine
            .states
            .iter()
            .find(|s| {
                s.find(machine.end_symbol)
                    .is_some_and(|t| t.kind == ParserActionKind::Reduce && t.value == 1)
            })
            .expect("completed-item state");
        assert!(conflicted.find(lt).is_none());
    }

    #[test]
    fn unspecified_precedence_warns_and_shifts() {
        // dangling else: shift wins, one conflict reported
        let (grammar, machine, sink) = tables_for(
            "g;
             S : 'i' S 'e' S | 'i' S | 'x';",
        );
        assert_eq!(sink.count(ErrorCode::ShiftReduceConflict), 1);
        let e = index_of(&grammar, "e");
        let shifted = machine
            .states
            .iter()
            .filter_map(|s| s.find(e))
            .any(|t| t.kind == ParserActionKind::Shift);
        assert!(shifted);
    }

    #[test]
    fn reduce_reduce_keeps_the_smaller_production() {
        let (_, machine, sink) = tables_for(
            "g;
             S : A | B;
             A : 'x' 'y';
             B : 'x' 'y';",
        );
        assert!(sink.count(ErrorCode::ReduceReduceConflict) >= 1);
        // the state after shifting 'x' 'y' reduces via A (production 3 < 4)
        let reduces: Vec<_> = machine
            .states
            .iter()
            .flat_map(|s| s.transitions.iter())
            .filter(|t| t.kind == ParserActionKind::Reduce)
            .map(|t| t.value)
            .collect();
        assert!(reduces.contains(&3));
        assert!(!reduces.contains(&4));
    }

    #[test]
    fn reductions_describe_the_productions() {
        let (grammar, machine, _) = tables_for("g; S : 'a' S 'b' | ;");
        assert_eq!(machine.reductions.len(), grammar.productions().len());
        let s = index_of(&grammar, "S");
        assert_eq!(machine.reductions[1].symbol, s);
        assert_eq!(machine.reductions[1].length, 3);
        assert_eq!(machine.reductions[2].length, 0);
        assert_eq!(machine.reductions[0].length, 2);
    }
}
