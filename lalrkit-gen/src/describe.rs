//! Human-readable dumps of the generator's intermediate results.
//!
//! The format is line-oriented and diff-friendly, meant for debugging
//! grammars and for golden-file comparisons: `P,` lines list productions,
//! `FIRST,`/`FOLLOW,` lines list the symbol sets, and `C,` lines list the
//! items of each state of the canonical collection with their lookaheads.

use crate::grammar::Grammar;
use crate::items;
use std::io::{self, Write};

/// Write all productions, one per line: `P,<index>,<lhs> -> <rhs>`.
pub fn write_productions<W: Write>(out: &mut W, grammar: &Grammar) -> io::Result<()> {
    writeln!(out, "PS,{}", grammar.productions().len())?;
    for production in grammar.productions() {
        write!(
            out,
            "P,{},{} ->",
            production.index,
            grammar.symbol(production.symbol).lexeme
        )?;
        for &symbol in &production.right {
            write!(out, " {}", grammar.symbol(symbol).lexeme)?;
        }
        if let Some(action) = production.action {
            write!(out, " [{}]", grammar.actions()[action].identifier)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write the FIRST and FOLLOW sets of every nonterminal.
///
/// Nullable symbols list `` `empty' `` first in their FIRST set. Only
/// meaningful after generation has run.
pub fn write_first_follow<W: Write>(out: &mut W, grammar: &Grammar) -> io::Result<()> {
    for symbol in grammar.symbols() {
        if !symbol.is_non_terminal() {
            continue;
        }
        write!(out, "FIRST,{},{{", symbol.lexeme)?;
        if symbol.nullable {
            write!(out, "`empty', ")?;
        }
        for &t in &symbol.first {
            write!(out, "{}, ", grammar.symbol(t).lexeme)?;
        }
        writeln!(out, "}}")?;
    }
    for symbol in grammar.symbols() {
        if !symbol.is_non_terminal() {
            continue;
        }
        write!(out, "FOLLOW,{},{{", symbol.lexeme)?;
        for &t in &symbol.follow {
            write!(out, "{}, ", grammar.symbol(t).lexeme)?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// Write the canonical collection: every state's closed items with a `.`
/// at the dot position and the lookahead set after `;`.
pub fn write_item_sets<W: Write>(out: &mut W, grammar: &Grammar) -> io::Result<()> {
    let sets = items::build(grammar);
    writeln!(out, "CS,{}", sets.states.len())?;
    for (index, state) in sets.states.iter().enumerate() {
        for ((production, dot), lookahead) in items::closure(grammar, &state.kernel) {
            let p = grammar.production(production);
            write!(out, "C,{},{} ->", index, grammar.symbol(p.symbol).lexeme)?;
            for (i, &symbol) in p.right.iter().enumerate() {
                if i == dot {
                    write!(out, " .")?;
                }
                write!(out, " {}", grammar.symbol(symbol).lexeme)?;
            }
            if dot == p.right.len() {
                write!(out, " .")?;
            }
            write!(out, " ; {{")?;
            for t in lookahead {
                write!(out, "{}, ", grammar.symbol(t).lexeme)?;
            }
            writeln!(out, "}}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write everything: productions, FIRST/FOLLOW, and the canonical
/// collection. The grammar must already have been through [`generate`]
/// (or at least its structural phases), since the dump uses the numbered
/// symbols and the stored sets.
///
/// [`generate`]: crate::generate
pub fn describe<W: Write>(out: &mut W, grammar: &Grammar) -> io::Result<()> {
    write_productions(out, grammar)?;
    writeln!(out)?;
    write_first_follow(out, grammar)?;
    writeln!(out)?;
    write_item_sets(out, grammar)
}
