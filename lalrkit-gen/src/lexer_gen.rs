//! The lexer generator: token patterns to a minimized, range-keyed DFA.
//!
//! Each token's pattern is compiled to a syntax tree and terminated with an
//! end marker carrying the token's declaration index; the union of all
//! trees is turned into a DFA directly from `firstpos`/`followpos` sets.
//! DFA states are sets of leaf positions; transitions are computed over the
//! disjoint intervals induced by the candidate ranges of each state. An
//! accepting state resolves to the contained end marker with the lowest
//! declaration index. A partition-refinement pass then minimizes the
//! machine and renumbers it breadth-first from the start state.

use crate::grammar::{LexerToken, LexerTokenKind};
use crate::regex::{analyze, parse_literal, parse_regex, LeafInfo, RegexNode, TreeBuilder};
use indexmap::IndexMap;
use lalrkit::{
    ErrorSink, LalrkitError, LexerState, LexerStateMachine, LexerTransition, MachineAction,
};
use smartstring::alias::String;
use std::collections::BTreeSet;

/// Generate one scanner DFA for `tokens`.
///
/// Malformed patterns are reported through `sink` and their tokens left out
/// of the machine; generation itself always produces a machine.
pub(crate) fn generate_lexer(tokens: &[LexerToken], sink: &mut dyn ErrorSink) -> LexerStateMachine {
    let mut builder = TreeBuilder::new();
    let mut actions: Vec<String> = Vec::new();
    let mut forest: Option<RegexNode> = None;

    for (index, token) in tokens.iter().enumerate() {
        if token.pattern.is_empty() {
            LalrkitError::Syntax {
                line: token.line,
                message: "token has an empty pattern".into(),
            }
            .report(sink);
            continue;
        }
        let node = match token.kind {
            LexerTokenKind::Literal => parse_literal(&token.pattern, &mut builder),
            LexerTokenKind::Regex => {
                match parse_regex(&token.pattern, token.line, &mut builder, &mut actions) {
                    Ok(node) => node,
                    Err(err) => {
                        err.report(sink);
                        continue;
                    }
                }
            }
        };
        let marked = RegexNode::concat(node, builder.end_marker(index));
        forest = Some(match forest {
            Some(tree) => RegexNode::alternate(tree, marked),
            None => marked,
        });
    }

    let Some(root) = forest else {
        return LexerStateMachine::empty();
    };
    let analysis = analyze(&root, &builder.leaves);
    let leaves = &builder.leaves;

    // Subset construction keyed by position set.
    let mut index_of: IndexMap<BTreeSet<usize>, usize> = IndexMap::new();
    index_of.insert(analysis.start.clone(), 0);
    let mut transitions: Vec<Vec<LexerTransition>> = vec![Vec::new()];
    let mut current = 0;
    while current < index_of.len() {
        let positions = index_of.get_index(current).map(|(k, _)| k.clone()).unwrap();

        let mut bounds: BTreeSet<u32> = BTreeSet::new();
        for &p in &positions {
            if let LeafInfo::Ranges(ranges) = &leaves[p] {
                for &(begin, end) in ranges {
                    bounds.insert(begin);
                    bounds.insert(end);
                }
            }
        }
        let bounds: Vec<u32> = bounds.into_iter().collect();

        let mut row: Vec<LexerTransition> = Vec::new();
        for window in bounds.windows(2) {
            let (lo, hi) = (window[0], window[1]);
            let mut successor = BTreeSet::new();
            for &p in &positions {
                if let LeafInfo::Ranges(ranges) = &leaves[p] {
                    if ranges.iter().any(|&(b, e)| b <= lo && hi <= e) {
                        successor.extend(analysis.follow[p].iter().copied());
                    }
                }
            }
            if successor.is_empty() {
                continue;
            }
            let target = match index_of.get(&successor) {
                Some(&t) => t,
                None => {
                    let t = index_of.len();
                    index_of.insert(successor, t);
                    transitions.push(Vec::new());
                    t
                }
            };
            match row.last_mut() {
                Some(last) if last.end == lo && last.target == target => last.end = hi,
                _ => row.push(LexerTransition {
                    begin: lo,
                    end: hi,
                    target,
                }),
            }
        }
        transitions[current] = row;
        current += 1;
    }

    let mut states: Vec<LexerState> = Vec::with_capacity(index_of.len());
    for (index, (positions, _)) in index_of.iter().enumerate() {
        let mut token_index: Option<usize> = None;
        let mut action: Option<usize> = None;
        for &p in positions {
            match leaves[p] {
                LeafInfo::End { token } => {
                    token_index = Some(token_index.map_or(token, |t: usize| t.min(token)));
                }
                LeafInfo::Action { action: a } => {
                    action = Some(action.map_or(a, |b: usize| b.min(a)));
                }
                LeafInfo::Ranges(_) => {}
            }
        }
        states.push(LexerState {
            index,
            transitions: std::mem::take(&mut transitions[index]),
            accepting: token_index.is_some(),
            accept: token_index.and_then(|t| tokens[t].symbol),
            action,
        });
    }

    let machine_actions = actions
        .into_iter()
        .enumerate()
        .map(|(index, identifier)| MachineAction { index, identifier })
        .collect();

    let (states, start_state) = minimize(states, 0);
    log::debug!(
        "lexer machine: {} tokens, {} states after minimization",
        tokens.len(),
        states.len()
    );
    LexerStateMachine {
        actions: machine_actions,
        states,
        start_state,
    }
}

type Signature = (usize, Vec<(u32, u32, usize)>);

/// Moore-style partition refinement followed by a breadth-first renumbering
/// from the start state.
fn minimize(states: Vec<LexerState>, start: usize) -> (Vec<LexerState>, usize) {
    // initial partition: observable output of each state
    let mut groups: IndexMap<(bool, Option<usize>, Option<usize>), usize> = IndexMap::new();
    let mut partition: Vec<usize> = states
        .iter()
        .map(|s| {
            let key = (s.accepting, s.accept, s.action);
            let next = groups.len();
            *groups.entry(key).or_insert(next)
        })
        .collect();
    let mut count = groups.len();

    loop {
        let mut refined: IndexMap<Signature, usize> = IndexMap::new();
        let next: Vec<usize> = states
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut edges: Vec<(u32, u32, usize)> = Vec::new();
                for t in &s.transitions {
                    let part = partition[t.target];
                    match edges.last_mut() {
                        Some(last) if last.1 == t.begin && last.2 == part => last.1 = t.end,
                        _ => edges.push((t.begin, t.end, part)),
                    }
                }
                let signature = (partition[i], edges);
                let id = refined.len();
                *refined.entry(signature).or_insert(id)
            })
            .collect();
        if refined.len() == count {
            partition = next;
            break;
        }
        count = refined.len();
        partition = next;
    }

    // representative of each partition: its first state
    let mut representative: Vec<Option<usize>> = vec![None; count];
    for (index, &part) in partition.iter().enumerate() {
        if representative[part].is_none() {
            representative[part] = Some(index);
        }
    }

    // breadth-first renumbering from the start partition
    let mut renumber: Vec<Option<usize>> = vec![None; count];
    let mut order: Vec<usize> = Vec::new();
    renumber[partition[start]] = Some(0);
    order.push(partition[start]);
    let mut head = 0;
    while head < order.len() {
        let part = order[head];
        head += 1;
        let rep = representative[part].expect("partition has a representative");
        for t in &states[rep].transitions {
            let target = partition[t.target];
            if renumber[target].is_none() {
                renumber[target] = Some(order.len());
                order.push(target);
            }
        }
    }

    let mut out: Vec<LexerState> = Vec::with_capacity(order.len());
    for (new_index, &part) in order.iter().enumerate() {
        let rep = representative[part].expect("partition has a representative");
        let source = &states[rep];
        let mut merged: Vec<LexerTransition> = Vec::new();
        for t in &source.transitions {
            let target = renumber[partition[t.target]].expect("reachable target");
            match merged.last_mut() {
                Some(last) if last.end == t.begin && last.target == target => last.end = t.end,
                _ => merged.push(LexerTransition {
                    begin: t.begin,
                    end: t.end,
                    target,
                }),
            }
        }
        out.push(LexerState {
            index: new_index,
            transitions: merged,
            accepting: source.accepting,
            accept: source.accept,
            action: source.action,
        });
    }
    (out, 0)
}
