//! LALR(1) look-ahead set computation.
//!
//! This is DeRemer and Pennello's method \[1\]: the nonterminal transitions
//! of the LR(0) automaton form a dense domain, the `reads` and `includes`
//! relations are edge lists over it, and the same digraph traversal solves
//! both fixpoints — `Read` from the direct-read sets over `reads`, then
//! `Follow` from `Read` over `includes`. The look-ahead set of a reduction is
//! the union of the `Follow` sets its `lookback` relation points at.
//!
//! \[1\]: DeRemer and Pennello, Efficient Computation of LALR(1) Look-Ahead
//!       Sets, TOPLAS 1982. <https://doi.org/10.1145/69622.357187>

use crate::digraph;
use crate::grammar::{Grammar, NonterminalID, ProductionID, SymbolID};
use crate::lr0::{LR0Automaton, LR0State, StateID};
use crate::types::Map;
use crate::TerminalSet;
use std::fmt;

/// A nonterminal transition `(state, nonterminal)` of the automaton: the
/// node domain of the look-ahead relations.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Goto {
    pub from: StateID,
    pub symbol: NonterminalID,
}

impl fmt::Debug for Goto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.from, self.symbol)
    }
}

/// A reduction site: a state whose closure completes the production.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Reduce {
    pub state: StateID,
    pub production: ProductionID,
}

impl fmt::Debug for Reduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.state, self.production)
    }
}

#[derive(Debug)]
pub struct LalrData {
    /// The dense nonterminal-transition domain.
    pub gotos: Vec<Goto>,
    goto_index: Map<Goto, usize>,
    /// `Follow` per nonterminal transition, indexed like `gotos`.
    pub follows: Vec<TerminalSet>,
    /// The look-ahead set of every reduction site.
    pub lookaheads: Map<Reduce, TerminalSet>,
}

impl LalrData {
    pub fn follow_of(&self, goto: Goto) -> Option<&TerminalSet> {
        self.goto_index.get(&goto).map(|&i| &self.follows[i])
    }

    pub fn lookahead(&self, state: StateID, production: ProductionID) -> Option<&TerminalSet> {
        self.lookaheads.get(&Reduce { state, production })
    }
}

/// Compute the look-ahead sets for every reduction of the automaton.
#[tracing::instrument(skip_all)]
pub fn lalr(g: &Grammar, lr0: &LR0Automaton) -> LalrData {
    let mut gotos = Vec::new();
    let mut goto_index = Map::default();
    for (&from, state) in &lr0.states {
        for &symbol in state.gotos.keys() {
            let goto = Goto { from, symbol };
            goto_index.insert(goto, gotos.len());
            gotos.push(goto);
        }
    }
    tracing::debug!(transitions = gotos.len(), "nonterminal transitions collected");

    // DR(p,A) = { t | p --A--> r --t--> }
    let mut sets: Vec<TerminalSet> = gotos
        .iter()
        .map(|p| {
            let to = lr0.state(p.from).gotos[&p.symbol];
            lr0.state(to).shifts.keys().copied().collect()
        })
        .collect();

    // Read: DR closed over `reads`.
    let reads = reads_edges(g, lr0, &gotos, &goto_index);
    digraph::digraph(&mut sets, &reads);

    // Follow: Read closed over `includes`.
    let includes = includes_edges(g, lr0, &goto_index);
    let mut follows = sets;
    digraph::digraph(&mut follows, &includes);

    // LA(q, A->ω) = ⋃ { Follow(p,A) | (q, A->ω) lookback (p,A) }
    let lookbacks = lookback_edges(g, lr0, &goto_index);
    let mut lookaheads = Map::<Reduce, TerminalSet>::default();
    for (&state, lr0_state) in &lr0.states {
        for &production in &lr0_state.reduces {
            let reduce = Reduce { state, production };
            let mut set = TerminalSet::default();
            if let Some(edges) = lookbacks.get(&reduce) {
                for &p in edges {
                    set.union_with(&follows[p]);
                }
            }
            lookaheads.insert(reduce, set);
        }
    }

    LalrData {
        gotos,
        goto_index,
        follows,
        lookaheads,
    }
}

/// `(p,A) reads (r,C)` iff `p --A--> r --C-->` and C is nullable.
fn reads_edges(
    g: &Grammar,
    lr0: &LR0Automaton,
    gotos: &[Goto],
    index: &Map<Goto, usize>,
) -> Vec<Vec<usize>> {
    gotos
        .iter()
        .map(|p| {
            let to = lr0.state(p.from).gotos[&p.symbol];
            lr0.state(to)
                .gotos
                .keys()
                .filter(|c| g.nullable(**c))
                .map(|&symbol| index[&Goto { from: to, symbol }])
                .collect()
        })
        .collect()
}

/// `(p,A) includes (p',B)` iff `B -> β A γ` with γ nullable and the β-path
/// from the state of p' ends at the state of p. Found by walking every
/// production of B through the automaton once.
fn includes_edges(g: &Grammar, lr0: &LR0Automaton, index: &Map<Goto, usize>) -> Vec<Vec<usize>> {
    let mut edges = vec![Vec::new(); index.len()];
    for (b_key, &j) in index.iter() {
        for (_, production) in g.rules_of(b_key.symbol) {
            let mut current = b_key.from;
            for (i, symbol) in production.right.iter().enumerate() {
                if let SymbolID::N(n) = symbol {
                    let tail_nullable = production.right[i + 1..]
                        .iter()
                        .all(|s| matches!(s, SymbolID::N(m) if g.nullable(*m)));
                    if tail_nullable {
                        if let Some(&a) = index.get(&Goto {
                            from: current,
                            symbol: *n,
                        }) {
                            edges[a].push(j);
                        }
                    }
                }
                match transition(lr0.state(current), symbol) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
    }
    edges
}

/// `(q, A->ω) lookback (p,A)` iff the ω-path from the state of p ends at q.
fn lookback_edges(
    g: &Grammar,
    lr0: &LR0Automaton,
    index: &Map<Goto, usize>,
) -> Map<Reduce, Vec<usize>> {
    let mut lookbacks = Map::<Reduce, Vec<usize>>::default();
    for (goto, &j) in index.iter() {
        'rules: for (id, production) in g.rules_of(goto.symbol) {
            let mut current = goto.from;
            for symbol in &production.right {
                match transition(lr0.state(current), symbol) {
                    Some(next) => current = next,
                    None => continue 'rules,
                }
            }
            lookbacks
                .entry(Reduce {
                    state: current,
                    production: id,
                })
                .or_default()
                .push(j);
        }
    }
    lookbacks
}

fn transition(state: &LR0State, symbol: &SymbolID) -> Option<StateID> {
    match symbol {
        SymbolID::T(t) => state.shifts.get(t).copied(),
        SymbolID::N(n) => state.gotos.get(n).copied(),
    }
}
