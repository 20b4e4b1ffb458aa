//! Generation pipeline: a built [`Grammar`] in, executable state machines
//! out.
//!
//! Phases, in order: directive application (terminal classification,
//! precedence numbering), left-hand-side classification, augmentation with
//! `.start → S .end`, implicit-terminal folding, terminal/undeclared
//! cleanup, productivity and reachability validation, symbol numbering,
//! FIRST/FOLLOW, the LALR(1) collection, table fill, and the two scanner
//! DFAs. Diagnostics flow through the [`ErrorSink`]; generation fails only
//! when the output would be unusable.

use crate::first_follow;
use crate::grammar::{Grammar, LexemeType, LexerToken, LexerTokenKind, SymbolType};
use crate::items;
use crate::lexer_gen::generate_lexer;
use crate::tables;
use anyhow::{bail, Result};
use lalrkit::{ErrorSink, LalrkitError, LexerStateMachine, ParserStateMachine};
use std::collections::BTreeSet;

/// Everything the runtime needs to execute one grammar.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    pub parser: ParserStateMachine,
    /// The token scanner.
    pub lexer: LexerStateMachine,
    /// The whitespace scanner; empty when the grammar declares none.
    pub whitespace: LexerStateMachine,
}

/// Parse grammar source and generate its machines.
pub fn compile(source: &str, sink: &mut dyn ErrorSink) -> Result<CompiledGrammar> {
    let mut grammar = Grammar::parse(source)?;
    generate(&mut grammar, sink)
}

/// Generate the machines for a built grammar.
///
/// The grammar is mutated: symbols are classified and renumbered, the
/// augmented production is inserted, and FIRST/FOLLOW results are stored on
/// the symbols. Afterwards the grammar must not be mutated further by the
/// caller.
pub fn generate(grammar: &mut Grammar, sink: &mut dyn ErrorSink) -> Result<CompiledGrammar> {
    prepare(grammar, sink)?;
    first_follow::compute(grammar);
    let sets = items::build(grammar);
    let parser = tables::build_tables(grammar, &sets, sink);

    let tokens: Vec<LexerToken> = grammar
        .symbols()
        .iter()
        .filter(|s| s.is_lexed())
        .map(|s| LexerToken {
            kind: match s.lexeme_type {
                LexemeType::Literal => LexerTokenKind::Literal,
                LexemeType::Regex => LexerTokenKind::Regex,
                LexemeType::Null => unreachable!("lexed symbols carry a pattern"),
            },
            line: s.line,
            symbol: Some(s.index),
            pattern: s.lexeme.clone(),
        })
        .collect();
    let lexer = generate_lexer(&tokens, sink);
    let whitespace = generate_lexer(grammar.whitespace_tokens(), sink);

    Ok(CompiledGrammar {
        parser,
        lexer,
        whitespace,
    })
}

/// The structural phases shared by generation and by tests that inspect
/// intermediate results: everything up to and including symbol numbering.
pub(crate) fn prepare(grammar: &mut Grammar, sink: &mut dyn ErrorSink) -> Result<()> {
    if grammar.productions().is_empty() {
        bail!(
            "grammar `{}` declares no productions",
            grammar.identifier()
        );
    }
    apply_directives(grammar);
    classify_lhs(grammar);
    augment(grammar);
    let folded = fold_implicit_terminals(grammar);
    classify_terminals(grammar, &folded, sink);
    check_productive(grammar, &folded, sink)?;
    check_reachable(grammar, &folded, sink);
    renumber(grammar, &folded);
    Ok(())
}

/// Directives are numbered 1..N in textual order; each contained symbol
/// becomes a terminal with that precedence and the directive's
/// associativity.
fn apply_directives(grammar: &mut Grammar) {
    let groups: Vec<_> = grammar
        .directives()
        .iter()
        .enumerate()
        .map(|(i, d)| (i + 1, d.associativity, d.symbols.clone()))
        .collect();
    for (precedence, associativity, symbols) in groups {
        for index in symbols {
            let symbol = &mut grammar.symbols[index];
            symbol.symbol_type = SymbolType::Terminal;
            symbol.associativity = associativity;
            symbol.precedence = precedence;
        }
    }
}

/// Whatever appears on a left-hand side is a nonterminal, overriding any
/// earlier directive classification.
fn classify_lhs(grammar: &mut Grammar) {
    for symbol in &mut grammar.symbols {
        if !symbol.productions.is_empty() {
            symbol.symbol_type = SymbolType::NonTerminal;
        }
    }
}

/// Insert production 0: `.start → S .end` where S is the left-hand side of
/// the first user production.
fn augment(grammar: &mut Grammar) {
    let user_start = grammar.productions[0].symbol;
    grammar.prepend_production(grammar.start_symbol());
    let end = grammar.end_symbol();
    grammar.productions[0].right = vec![user_start, end];
}

/// Fold `name: "pattern";`-style nonterminals into their terminal: a
/// nonterminal whose single production is one literal/regex terminal with
/// no action disappears, and the terminal takes its identifier (and its
/// precedence, unless the terminal already has one).
///
/// Returns the folded symbol indices; their productions are removed.
fn fold_implicit_terminals(grammar: &mut Grammar) -> BTreeSet<usize> {
    let mut folds: Vec<(usize, usize, usize)> = Vec::new();
    for symbol in &grammar.symbols {
        if !symbol.is_non_terminal()
            || symbol.index == grammar.start_symbol()
            || symbol.productions.len() != 1
        {
            continue;
        }
        let production = &grammar.productions[symbol.productions[0]];
        if production.right.len() != 1 || production.action.is_some() {
            continue;
        }
        let terminal = production.right[0];
        let target = &grammar.symbols[terminal];
        if target.is_non_terminal()
            || target.lexeme_type == LexemeType::Null
            || terminal == symbol.index
        {
            continue;
        }
        folds.push((symbol.index, terminal, production.index));
    }

    let mut dropped = BTreeSet::new();
    let mut dead = BTreeSet::new();
    for (source, terminal, production) in folds {
        dropped.insert(source);
        dead.insert(production);
        log::debug!(
            "folding `{}` into terminal {:?}",
            grammar.symbols[source].identifier,
            grammar.symbols[terminal].lexeme
        );

        let identifier = grammar.symbols[source].identifier.clone();
        let precedence = grammar.symbols[source].precedence;
        let associativity = grammar.symbols[source].associativity;
        let line = grammar.symbols[source].line;
        let target = &mut grammar.symbols[terminal];
        target.identifier = identifier;
        target.symbol_type = SymbolType::Terminal;
        if target.line == 0 {
            target.line = line;
        }
        if target.precedence == 0 {
            target.precedence = precedence;
            target.associativity = associativity;
        }

        for p in &mut grammar.productions {
            if p.index == production {
                continue;
            }
            for symbol in &mut p.right {
                if *symbol == source {
                    *symbol = terminal;
                }
            }
            if p.precedence_symbol == Some(source) {
                p.precedence_symbol = Some(terminal);
            }
        }
        for directive in &mut grammar.directives {
            for symbol in &mut directive.symbols {
                if *symbol == source {
                    *symbol = terminal;
                }
            }
        }
    }
    grammar.retain_productions(|p| !dead.contains(&p.index));
    dropped
}

/// Classify what is left: `.error` is a terminal, literal/regex symbols
/// are terminals, bare terminal identifiers match their own text, and an
/// identifier that never gained a production is reported as undeclared and
/// demoted to a literal terminal so generation can continue.
fn classify_terminals(
    grammar: &mut Grammar,
    dropped: &BTreeSet<usize>,
    sink: &mut dyn ErrorSink,
) {
    let error = grammar.error_symbol();
    grammar.symbols[error].symbol_type = SymbolType::Terminal;
    for index in 0..grammar.symbols.len() {
        if index == error || dropped.contains(&index) {
            continue;
        }
        let symbol = &mut grammar.symbols[index];
        match symbol.symbol_type {
            SymbolType::Null => {
                symbol.symbol_type = SymbolType::Terminal;
            }
            SymbolType::NonTerminal if symbol.productions.is_empty() => {
                LalrkitError::UndeclaredSymbol {
                    line: symbol.line,
                    symbol: symbol.lexeme.clone(),
                }
                .report(sink);
                symbol.symbol_type = SymbolType::Terminal;
                symbol.lexeme_type = LexemeType::Literal;
            }
            SymbolType::Terminal if symbol.lexeme_type == LexemeType::Null => {
                // declared by directive only: matched by its identifier
                symbol.lexeme_type = LexemeType::Literal;
            }
            _ => {}
        }
    }
}

/// Report nonterminals that derive no terminal string; fail when the start
/// symbol is one of them.
fn check_productive(
    grammar: &Grammar,
    dropped: &BTreeSet<usize>,
    sink: &mut dyn ErrorSink,
) -> Result<()> {
    let n = grammar.symbols().len();
    let mut productive = vec![false; n];
    for symbol in grammar.symbols() {
        if symbol.is_terminal() {
            productive[symbol.index] = true;
        }
    }
    let mut changed = true;
    while changed {
        changed = false;
        for production in grammar.productions() {
            if !productive[production.symbol]
                && production.right.iter().all(|&s| productive[s])
            {
                productive[production.symbol] = true;
                changed = true;
            }
        }
    }
    for symbol in grammar.symbols() {
        if symbol.is_non_terminal()
            && !productive[symbol.index]
            && symbol.index != grammar.start_symbol()
            && !dropped.contains(&symbol.index)
        {
            LalrkitError::UnproductiveSymbol {
                symbol: symbol.lexeme.clone(),
            }
            .report(sink);
        }
    }
    let user_start = grammar.productions()[0].right[0];
    if !productive[user_start] {
        bail!(
            "start symbol `{}` cannot derive any terminal string",
            grammar.symbol(user_start).lexeme
        );
    }
    Ok(())
}

/// Report nonterminals not reachable from `.start`.
fn check_reachable(grammar: &Grammar, dropped: &BTreeSet<usize>, sink: &mut dyn ErrorSink) {
    let n = grammar.symbols().len();
    let mut reachable = vec![false; n];
    reachable[grammar.start_symbol()] = true;
    let mut stack = vec![grammar.start_symbol()];
    while let Some(symbol) = stack.pop() {
        for &p in &grammar.symbol(symbol).productions {
            for &s in &grammar.production(p).right {
                if !reachable[s] {
                    reachable[s] = true;
                    if grammar.symbol(s).is_non_terminal() {
                        stack.push(s);
                    }
                }
            }
        }
    }
    for symbol in grammar.symbols() {
        if symbol.is_non_terminal()
            && !reachable[symbol.index]
            && !dropped.contains(&symbol.index)
        {
            LalrkitError::UnreachableSymbol {
                symbol: symbol.lexeme.clone(),
            }
            .report(sink);
        }
    }
}

/// Assign final symbol numbers: `.start`, user nonterminals, `.error`,
/// terminals, `.end` last. Folded symbols are dropped from the table.
fn renumber(grammar: &mut Grammar, dropped: &BTreeSet<usize>) {
    let start = grammar.start_symbol();
    let end = grammar.end_symbol();
    let error = grammar.error_symbol();
    let mut order = vec![start];
    for symbol in grammar.symbols() {
        if symbol.is_non_terminal() && symbol.index != start && !dropped.contains(&symbol.index)
        {
            order.push(symbol.index);
        }
    }
    order.push(error);
    for symbol in grammar.symbols() {
        if symbol.symbol_type == SymbolType::Terminal
            && symbol.index != error
            && !dropped.contains(&symbol.index)
        {
            order.push(symbol.index);
        }
    }
    order.push(end);
    grammar.renumber_symbols(&order);
}


#[cfg(test)]
mod tests {
    use super::*;
    use lalrkit::codec::encode_state_machines;
    use lalrkit::{codec, CollectSink, ErrorCode, Lexer, Parser};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    type EventLog = Rc<RefCell<Vec<&'static str>>>;

    fn log_handler(
        log: &EventLog,
        label: &'static str,
    ) -> lalrkit::ReduceHandler<i64> {
        let log = Rc::clone(log);
        Box::new(move |nodes| {
            log.borrow_mut().push(label);
            Ok(nodes.first().map_or(0, |n| n.value))
        })
    }

    fn parser_over<'m>(
        machines: &'m CompiledGrammar,
        input: &'m str,
    ) -> Parser<'m, std::iter::Fuse<std::str::Chars<'m>>, i64> {
        Parser::new(
            &machines.parser,
            &machines.lexer,
            &machines.whitespace,
            input.chars().fuse(),
        )
    }

    const EXPR_GRAMMAR: &str = "expr;
        %left '+';
        %left '*';
        %whitespace \"[ \\t]*\";
        E : E '+' T [add] | T [promote_t];
        T : T '*' F [mul] | F [promote_f];
        F : '(' E ')' [parens] | 'n' [num];";

    #[test]
    fn expression_grammar_reduces_in_canonical_order() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(EXPR_GRAMMAR, &mut sink).unwrap();
        assert_eq!(sink.count(ErrorCode::ShiftReduceConflict), 0);

        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut parser = parser_over(&machines, "n+n*n");
        for label in ["add", "promote_t", "mul", "promote_f", "parens", "num"] {
            parser.set_reduce_handler(label, log_handler(&log, label));
        }
        assert!(parser.parse(&mut sink).unwrap());
        assert_eq!(
            log.borrow().as_slice(),
            &[
                "num",
                "promote_f",
                "promote_t",
                "num",
                "promote_f",
                "num",
                "mul",
                "add"
            ]
        );
    }

    #[test]
    fn nested_parentheses_parse() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(EXPR_GRAMMAR, &mut sink).unwrap();
        let mut parser = parser_over(&machines, "(n+n)*n");
        assert!(parser.parse(&mut sink).unwrap());
        let mut parser = parser_over(&machines, "(n+n");
        assert!(!parser.parse(&mut sink).unwrap());
    }

    #[test]
    fn matched_pairs_accept_and_mismatches_fail() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile("anbn; S : 'a' S 'b' | ;", &mut sink).unwrap();

        let mut parser = parser_over(&machines, "aaabbb");
        assert!(parser.parse(&mut sink).unwrap());
        assert!(sink.is_empty());

        let mut parser = parser_over(&machines, "aab");
        assert!(!parser.parse(&mut sink).unwrap());
        assert_eq!(sink.count(ErrorCode::ParserFailure), 1);
    }

    #[test]
    fn associativity_tie_reduces_left_to_right() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(
            "sub;
             %left '-';
             %whitespace \"[ ]*\";
             E : E '-' E [sub] | \"[0-9]+\" [num];",
            &mut sink,
        )
        .unwrap();
        // exactly one conflict, resolved towards reduce by %left
        assert_eq!(sink.count(ErrorCode::ShiftReduceConflict), 1);

        let mut parser = parser_over(&machines, "8 - 3 - 2");
        parser.set_reduce_handler(
            "num",
            Box::new(|nodes| {
                nodes[0].lexeme.parse::<i64>().map_err(|e| {
                    lalrkit::LalrkitError::ActionFailed {
                        line: nodes[0].line,
                        identifier: "num".into(),
                        message: e.to_string().into(),
                    }
                })
            }),
        );
        parser.set_reduce_handler(
            "sub",
            Box::new(|nodes| Ok(nodes[0].value - nodes[2].value)),
        );
        assert!(parser.parse(&mut sink).unwrap());
        // (8 - 3) - 2, not 8 - (3 - 2)
        assert_eq!(parser.into_value(), Some(3));
    }

    #[test]
    fn precedence_override_binds_tighter() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(
            "calc;
             %left '-';
             %left '*';
             %whitespace \"[ ]*\";
             E : E '-' E [sub] | '-' E %precedence '*' [neg] | \"[0-9]+\" [num];",
            &mut sink,
        )
        .unwrap();
        let mut parser = parser_over(&machines, "-8-3");
        parser.set_reduce_handler(
            "num",
            Box::new(|nodes| Ok(nodes[0].lexeme.parse::<i64>().unwrap_or(0))),
        );
        parser.set_reduce_handler(
            "sub",
            Box::new(|nodes| Ok(nodes[0].value - nodes[2].value)),
        );
        parser.set_reduce_handler("neg", Box::new(|nodes| Ok(-nodes[1].value)));
        assert!(parser.parse(&mut sink).unwrap());
        // (-8) - 3, because unary minus takes the precedence of '*'
        assert_eq!(parser.into_value(), Some(-11));
    }

    #[test]
    fn whitespace_is_skipped_and_implicit_terminals_fold() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(
            "nums;
             %whitespace \"[ \\t\\n]+\";
             S : S num | num;
             num : \"[0-9]+\";",
            &mut sink,
        )
        .unwrap();
        assert!(sink.is_empty());

        // `num` was folded into the regex terminal, keeping its name
        let num = machines
            .parser
            .symbols
            .iter()
            .find(|s| &*s.identifier == "num")
            .expect("folded terminal");
        assert_eq!(num.kind, lalrkit::SymbolKind::Terminal);

        let mut lexer = Lexer::new(
            &machines.lexer,
            &machines.whitespace,
            machines.parser.end_symbol,
            "  12  34".chars().fuse(),
        );
        let mut seen = Vec::new();
        while !lexer.full() {
            lexer.advance(&mut sink).unwrap();
            seen.push((lexer.symbol().unwrap(), lexer.lexeme().to_owned()));
        }
        assert_eq!(
            seen,
            vec![
                (num.index, "12".to_owned()),
                (num.index, "34".to_owned()),
                (machines.parser.end_symbol, "".to_owned()),
            ]
        );
    }

    #[test]
    fn dangling_else_shifts_inward() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile("cond; S : 'i' S 'e' S | 'i' S | 'x';", &mut sink).unwrap();
        assert_eq!(sink.count(ErrorCode::ShiftReduceConflict), 1);

        let mut parser = parser_over(&machines, "iixex");
        assert!(parser.parse(&mut sink).unwrap());
        assert!(parser.full());
    }

    #[test]
    fn error_productions_resynchronize_the_parser() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(
            "stmts;
             %whitespace \"[ \\n]*\";
             S : S stmt | stmt;
             stmt : expr ';' [stmt_done] | error ';' [stmt_err];
             expr : \"[0-9]+\" [value];",
            &mut sink,
        )
        .unwrap();

        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut parser = parser_over(&machines, "1; ; 2;");
        for label in ["stmt_done", "stmt_err", "value"] {
            parser.set_reduce_handler(label, log_handler(&log, label));
        }
        assert!(parser.parse(&mut sink).unwrap());
        assert_eq!(sink.count(ErrorCode::ParserFailure), 1);
        assert_eq!(
            log.borrow().as_slice(),
            &["value", "stmt_done", "stmt_err", "value", "stmt_done"]
        );
    }

    #[test]
    fn without_error_productions_the_parser_halts() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(
            "stmts;
             %whitespace \"[ ]*\";
             S : \"[0-9]+\" ';' [stmt];",
            &mut sink,
        )
        .unwrap();
        let mut parser = parser_over(&machines, "1 1;");
        assert!(!parser.parse(&mut sink).unwrap());
        assert_eq!(sink.count(ErrorCode::ParserFailure), 1);
    }

    #[test]
    fn undeclared_symbols_are_reported_and_demoted_to_literals() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile("g; S : S foo | 'x';", &mut sink).unwrap();
        assert_eq!(sink.count(ErrorCode::UndeclaredSymbol), 1);
        // `foo` scans as its own identifier text
        let mut parser = parser_over(&machines, "xfoofoo");
        assert!(parser.parse(&mut sink).unwrap());
    }

    #[test]
    fn unproductive_start_symbol_fails_generation() {
        init_logger();
        let mut sink = CollectSink::new();
        let result = compile("g; S : 'a' S;", &mut sink);
        assert!(result.is_err());
        assert_eq!(sink.count(ErrorCode::UnproductiveSymbol), 1);
    }

    #[test]
    fn unreachable_nonterminals_are_reported() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile("g; S : 'x'; T : T 'y' | 'z';", &mut sink).unwrap();
        assert_eq!(sink.count(ErrorCode::UnreachableSymbol), 1);
        let mut parser = parser_over(&machines, "x");
        assert!(parser.parse(&mut sink).unwrap());
    }

    #[test]
    fn generation_is_byte_for_byte_deterministic() {
        init_logger();
        let mut sink = CollectSink::new();
        let first = compile(EXPR_GRAMMAR, &mut sink).unwrap();
        let second = compile(EXPR_GRAMMAR, &mut sink).unwrap();
        assert_eq!(
            encode_state_machines(&first.parser, &first.lexer, &first.whitespace),
            encode_state_machines(&second.parser, &second.lexer, &second.whitespace),
        );
    }

    #[test]
    fn serialized_tables_replay_identically() {
        init_logger();
        let mut sink = CollectSink::new();
        let machines = compile(EXPR_GRAMMAR, &mut sink).unwrap();
        let bytes = encode_state_machines(&machines.parser, &machines.lexer, &machines.whitespace);
        let (parser_m, lexer_m, whitespace_m) = codec::decode_state_machines(&bytes).unwrap();
        let decoded = CompiledGrammar {
            parser: parser_m,
            lexer: lexer_m,
            whitespace: whitespace_m,
        };

        let input = "n*(n+n)";
        let labels = ["add", "promote_t", "mul", "promote_f", "parens", "num"];

        let direct: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut parser = parser_over(&machines, input);
        for label in labels {
            parser.set_reduce_handler(label, log_handler(&direct, label));
        }
        assert!(parser.parse(&mut sink).unwrap());

        let replayed: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut parser = parser_over(&decoded, input);
        for label in labels {
            parser.set_reduce_handler(label, log_handler(&replayed, label));
        }
        assert!(parser.parse(&mut sink).unwrap());

        assert_eq!(direct.borrow().as_slice(), replayed.borrow().as_slice());
    }
}
