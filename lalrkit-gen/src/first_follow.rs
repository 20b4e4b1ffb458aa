//! Fixed-point computation of nullability, FIRST, and FOLLOW.
//!
//! Sets are ordered by symbol index, which keeps every downstream
//! construction reproducible. Results are stored onto the grammar's
//! symbols.

use crate::grammar::Grammar;
use std::collections::BTreeSet;

/// Compute `nullable`, `FIRST`, and `FOLLOW` for every symbol of a
/// numbered grammar and store them on the symbols.
pub(crate) fn compute(grammar: &mut Grammar) {
    let n = grammar.symbols.len();
    let mut nullable = vec![false; n];
    let mut first: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for symbol in &grammar.symbols {
        if symbol.is_terminal() {
            first[symbol.index].insert(symbol.index);
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for production in &grammar.productions {
            let lhs = production.symbol;
            let mut all_nullable = true;
            for &sym in &production.right {
                let first_sym = first[sym].clone();
                for f in first_sym {
                    changed |= first[lhs].insert(f);
                }
                if !nullable[sym] {
                    all_nullable = false;
                    break;
                }
            }
            if all_nullable && !nullable[lhs] {
                nullable[lhs] = true;
                changed = true;
            }
        }
    }

    let mut follow: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    follow[grammar.start_symbol()].insert(grammar.end_symbol());
    let mut changed = true;
    while changed {
        changed = false;
        for production in &grammar.productions {
            let lhs = production.symbol;
            let rhs = &production.right;
            for (i, &b) in rhs.iter().enumerate() {
                if !grammar.symbols[b].is_non_terminal() {
                    continue;
                }
                let mut rest_nullable = true;
                let mut first_rest = BTreeSet::new();
                for &sym in &rhs[i + 1..] {
                    first_rest.extend(first[sym].iter().copied());
                    if !nullable[sym] {
                        rest_nullable = false;
                        break;
                    }
                }
                for f in first_rest {
                    changed |= follow[b].insert(f);
                }
                if rest_nullable {
                    let follow_lhs = follow[lhs].clone();
                    for f in follow_lhs {
                        changed |= follow[b].insert(f);
                    }
                }
            }
        }
    }

    for symbol in &mut grammar.symbols {
        symbol.nullable = nullable[symbol.index];
        symbol.first = std::mem::take(&mut first[symbol.index]);
        symbol.follow = std::mem::take(&mut follow[symbol.index]);
    }
}
