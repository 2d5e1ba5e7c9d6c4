//! Construction of the canonical LR(0) item-set collection.

use crate::grammar::{Grammar, NonterminalID, ProductionID, SymbolID, TerminalID};
use crate::types::{Map, Set};
use crate::util::display_fn;
use std::{collections::VecDeque, fmt};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u16);

impl StateID {
    pub const INITIAL: Self = Self(0);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

/// An LR(0) item: a production with a dot position marking the parsed prefix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LR0Item {
    pub production: ProductionID,
    pub index: u16,
}

impl LR0Item {
    /// Kernel items are those with the dot advanced, plus the start item.
    pub fn is_kernel(&self) -> bool {
        self.index > 0 || self.production == ProductionID::ACCEPT
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let production = g.production(self.production);
            write!(f, "{} ->", g.nonterminal_name(production.left))?;
            for (i, symbol) in production.right.iter().enumerate() {
                if i == usize::from(self.index) {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if usize::from(self.index) == production.right.len() {
                f.write_str(" .")?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct LR0State {
    /// Sorted; two states are the same state exactly when these are equal.
    pub kernels: Vec<LR0Item>,
    pub shifts: Map<TerminalID, StateID>,
    pub gotos: Map<NonterminalID, StateID>,
    pub reduces: Set<ProductionID>,
}

#[derive(Debug)]
pub struct LR0Automaton {
    pub states: Map<StateID, LR0State>,
}

impl LR0Automaton {
    pub fn state(&self, id: StateID) -> &LR0State {
        &self.states[&id]
    }
}

/// Build the LR(0) automaton of the grammar.
#[tracing::instrument(skip_all)]
pub fn lr0(g: &Grammar) -> LR0Automaton {
    let nonkernels = nonkernel_closures(g);

    let mut next_state = 0u16;
    let mut state_id = move || {
        let id = StateID(next_state);
        next_state += 1;
        id
    };

    let mut pending = VecDeque::new();
    pending.push_back((
        state_id(),
        vec![LR0Item {
            production: ProductionID::ACCEPT,
            index: 0,
        }],
    ));

    let mut states = Map::<StateID, LR0State>::default();
    let mut isocores = Map::<Vec<LR0Item>, StateID>::default();
    let mut items = Set::<LR0Item>::default();
    let mut successors = Map::<SymbolID, Vec<LR0Item>>::default();

    while let Some((current, kernels)) = pending.pop_front() {
        // Close the kernel: a dot before a nonterminal pulls in that
        // nonterminal's fresh items.
        items.clear();
        for kernel in &kernels {
            items.insert(*kernel);
            let production = g.production(kernel.production);
            if let Some(SymbolID::N(n)) = production.right.get(usize::from(kernel.index)) {
                items.extend(&nonkernels[n]);
            }
        }

        let mut reduces = Set::default();
        successors.clear();
        for item in items.drain(..) {
            let production = g.production(item.production);
            match production.right.get(usize::from(item.index)) {
                Some(symbol) => {
                    successors.entry(*symbol).or_default().push(LR0Item {
                        index: item.index + 1,
                        ..item
                    });
                }
                None => {
                    reduces.insert(item.production);
                }
            }
        }
        reduces.sort_unstable();

        let mut shifts = Map::default();
        let mut gotos = Map::default();
        for (symbol, mut kernel) in successors.drain(..) {
            kernel.sort_unstable();
            kernel.dedup();
            let next = match isocores.get(&kernel) {
                Some(id) => *id,
                None => {
                    let id = state_id();
                    isocores.insert(kernel.clone(), id);
                    pending.push_back((id, kernel));
                    id
                }
            };
            match symbol {
                SymbolID::T(t) => {
                    shifts.insert(t, next);
                }
                SymbolID::N(n) => {
                    gotos.insert(n, next);
                }
            }
        }

        states.insert(
            current,
            LR0State {
                kernels,
                shifts,
                gotos,
                reduces,
            },
        );
    }

    tracing::debug!(states = states.len(), "LR(0) automaton constructed");
    LR0Automaton { states }
}

/// The dot-at-zero items each nonterminal contributes to a closure,
/// transitively through leading nonterminals.
fn nonkernel_closures(g: &Grammar) -> Map<NonterminalID, Set<LR0Item>> {
    let mut closures = Map::<NonterminalID, Set<LR0Item>>::default();
    for (n, _) in g.nonterminals() {
        let mut items = Set::default();
        let mut queue: VecDeque<NonterminalID> = Some(n).into_iter().collect();
        let mut expanded = Set::default();
        while let Some(n) = queue.pop_front() {
            if !expanded.insert(n) {
                continue;
            }
            for (id, p) in g.rules_of(n) {
                items.insert(LR0Item {
                    production: id,
                    index: 0,
                });
                if let Some(SymbolID::N(head)) = p.right.first() {
                    queue.push_back(*head);
                }
            }
        }
        closures.insert(n, items);
    }
    closures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn arithmetic() -> Grammar {
        Grammar::define(|g| {
            let plus = g.terminal("PLUS")?;
            let star = g.terminal("STAR")?;
            let num = g.terminal("NUM")?;
            let expr = g.nonterminal("expr")?;
            let term = g.nonterminal("term")?;
            g.rule(expr, [N(expr), T(plus), N(term)])?;
            g.rule(expr, [N(term)])?;
            g.rule(term, [N(term), T(star), T(num)])?;
            g.rule(term, [T(num)])?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn start_state_has_the_augmented_kernel() {
        let g = arithmetic();
        let lr0 = lr0(&g);
        let start = lr0.state(StateID::INITIAL);
        assert_eq!(
            start.kernels,
            vec![LR0Item {
                production: ProductionID::ACCEPT,
                index: 0
            }]
        );
        // expr and term are both expanded in the closure, so the start state
        // transitions on both.
        assert_eq!(start.gotos.len(), 2);
        assert_eq!(start.shifts.len(), 1);
    }

    #[test]
    fn equal_kernels_are_one_state() {
        let g = arithmetic();
        let lr0 = lr0(&g);
        let mut seen = Set::default();
        for state in lr0.states.values() {
            assert!(
                seen.insert(state.kernels.clone()),
                "two states share the kernel {:?}",
                state.kernels
            );
            let mut sorted = state.kernels.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, state.kernels, "kernels are kept sorted");
        }
    }

    #[test]
    fn transitions_cover_every_dotted_symbol() {
        let g = arithmetic();
        let automaton = lr0(&g);
        for state in automaton.states.values() {
            for kernel in &state.kernels {
                let production = g.production(kernel.production);
                match production.right.get(usize::from(kernel.index)) {
                    Some(T(t)) if *t != crate::grammar::TerminalID::EOI => {
                        assert!(state.shifts.contains_key(t))
                    }
                    Some(N(n)) => assert!(state.gotos.contains_key(n)),
                    _ => {}
                }
            }
        }
    }
}
