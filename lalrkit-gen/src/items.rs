//! LALR(1) item sets and the canonical collection.
//!
//! An item is a `(production, dot)` pair; lookaheads are kept in a map
//! keyed by item so that items equal up to lookahead merge; the merging
//! is what makes the construction LALR(1) rather than canonical LR(1).
//! States are identified by the core of their kernels; when merging grows a
//! kernel's lookaheads the state is re-queued and its lookaheads propagate
//! again until the collection is stable.

use crate::grammar::Grammar;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

pub(crate) type Lookahead = BTreeSet<usize>;
/// `(production, dot)`.
pub(crate) type ItemKey = (usize, usize);
/// A closed or kernel item set: item → lookahead.
pub(crate) type ItemMap = BTreeMap<ItemKey, Lookahead>;

/// One state of the canonical collection.
#[derive(Debug, Clone)]
pub(crate) struct ItemState {
    pub kernel: ItemMap,
    /// Transition on a grammar symbol to another state.
    pub transitions: BTreeMap<usize, usize>,
}

/// The canonical LALR(1) collection.
#[derive(Debug)]
pub(crate) struct ItemSets {
    pub states: Vec<ItemState>,
}

/// The ε-free FIRST of `symbols · lookahead`.
pub(crate) fn first_of_sequence(
    grammar: &Grammar,
    symbols: &[usize],
    lookahead: &Lookahead,
) -> Lookahead {
    let mut out = BTreeSet::new();
    for &sym in symbols {
        let symbol = grammar.symbol(sym);
        out.extend(symbol.first.iter().copied());
        if !symbol.nullable {
            return out;
        }
    }
    out.extend(lookahead.iter().copied());
    out
}

/// Saturate `kernel` with the items of every nonterminal after a dot,
/// propagating `FIRST(β L)` lookaheads, until stable.
pub(crate) fn closure(grammar: &Grammar, kernel: &ItemMap) -> ItemMap {
    let mut items = kernel.clone();
    let mut changed = true;
    while changed {
        changed = false;
        for ((prod, dot), lookahead) in items.clone() {
            let production = grammar.production(prod);
            if dot >= production.right.len() {
                continue;
            }
            let next = production.right[dot];
            if !grammar.symbol(next).is_non_terminal() {
                continue;
            }
            let propagated = first_of_sequence(grammar, &production.right[dot + 1..], &lookahead);
            for &expansion in &grammar.symbol(next).productions {
                let entry = items.entry((expansion, 0)).or_default();
                for &terminal in &propagated {
                    changed |= entry.insert(terminal);
                }
            }
        }
    }
    items
}

/// Build the canonical collection. State 0 is the closure of
/// `{ .start → · S .end, { .end } }`.
pub(crate) fn build(grammar: &Grammar) -> ItemSets {
    let mut states: Vec<ItemState> = Vec::new();
    let mut by_core: HashMap<BTreeSet<ItemKey>, usize> = HashMap::new();

    let mut kernel = ItemMap::new();
    kernel.insert((0, 0), BTreeSet::from([grammar.end_symbol()]));
    by_core.insert(kernel.keys().copied().collect(), 0);
    states.push(ItemState {
        kernel,
        transitions: BTreeMap::new(),
    });

    let mut queue: VecDeque<usize> = VecDeque::from([0]);
    let mut queued = vec![true];

    while let Some(index) = queue.pop_front() {
        queued[index] = false;
        let closed = closure(grammar, &states[index].kernel);

        let mut moves: BTreeMap<usize, ItemMap> = BTreeMap::new();
        for ((prod, dot), lookahead) in &closed {
            let production = grammar.production(*prod);
            if *dot >= production.right.len() {
                continue;
            }
            // the accept point `.start → S · .end` does not advance
            if *prod == 0 && *dot == 1 {
                continue;
            }
            let symbol = production.right[*dot];
            let entry = moves
                .entry(symbol)
                .or_default()
                .entry((*prod, dot + 1))
                .or_default();
            entry.extend(lookahead.iter().copied());
        }

        for (symbol, kernel) in moves {
            let core: BTreeSet<ItemKey> = kernel.keys().copied().collect();
            match by_core.get(&core) {
                None => {
                    let target = states.len();
                    by_core.insert(core, target);
                    states.push(ItemState {
                        kernel,
                        transitions: BTreeMap::new(),
                    });
                    queued.push(true);
                    queue.push_back(target);
                    states[index].transitions.insert(symbol, target);
                }
                Some(&target) => {
                    states[index].transitions.insert(symbol, target);
                    let mut grew = false;
                    for (key, lookahead) in kernel {
                        let entry = states[target].kernel.entry(key).or_default();
                        for terminal in lookahead {
                            grew |= entry.insert(terminal);
                        }
                    }
                    if grew && !queued[target] {
                        queued[target] = true;
                        queue.push_back(target);
                    }
                }
            }
        }
    }

    log::debug!("canonical collection: {} states", states.len());
    ItemSets { states }
}
