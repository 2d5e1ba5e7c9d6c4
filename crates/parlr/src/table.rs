//! Parse table assembly and conflict resolution.

use crate::grammar::{Assoc, Grammar, Precedence, ProductionID, TerminalID};
use crate::lalr::LalrData;
use crate::lr0::{LR0Automaton, StateID};
use crate::types::Map;
use crate::util::display_fn;
use crate::DriverKind;
use parlr_runtime::spec::{Action, ParserSpec, RuleInfo, SpecError, SpecParts, StateIdx};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

/// One unresolved (or, for GLR tables, retained) conflict.
#[derive(Debug)]
pub struct Conflict {
    pub state: StateID,
    pub terminal: TerminalID,
    pub kind: ConflictKind,
    /// What ended up in the cell. A [`Action::Conflict`] here means the
    /// competitors were retained for the GLR driver.
    pub chosen: Action,
    /// The reduction that lost.
    pub discarded: ProductionID,
}

/// Every conflict precedence could not resolve, in discovery order.
#[derive(Debug, Default)]
pub struct ConflictReport {
    conflicts: Vec<Conflict>,
}

impl ConflictReport {
    pub fn unresolved(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> + '_ {
        self.conflicts.iter()
    }

    pub fn in_state(&self, state: StateID) -> impl Iterator<Item = &Conflict> + '_ {
        self.conflicts.iter().filter(move |c| c.state == state)
    }

    fn record(
        &mut self,
        state: StateID,
        terminal: TerminalID,
        kind: ConflictKind,
        chosen: &Action,
        discarded: ProductionID,
    ) {
        self.conflicts.push(Conflict {
            state,
            terminal,
            kind,
            chosen: chosen.clone(),
            discarded,
        });
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for conflict in &self.conflicts {
                let kind = match conflict.kind {
                    ConflictKind::ShiftReduce => "shift/reduce",
                    ConflictKind::ReduceReduce => "reduce/reduce",
                };
                let winner = display_fn(|f| match &conflict.chosen {
                    Action::Shift(_) => f.write_str("shift wins"),
                    Action::Reduce(r) => write!(
                        f,
                        "reduce({}) wins",
                        g.production(ProductionID::from_raw(*r)).display(g)
                    ),
                    Action::Accept => f.write_str("accept wins"),
                    Action::Conflict(_) => f.write_str("all retained"),
                    Action::Fail | Action::Error => f.write_str("input rejected"),
                });
                writeln!(
                    f,
                    "{:?}: {} conflict on {}: {}, reduce({}) discarded",
                    conflict.state,
                    kind,
                    g.terminal_name(conflict.terminal),
                    winner,
                    g.production(conflict.discarded).display(g),
                )?;
            }
            Ok(())
        })
    }
}

#[derive(Default)]
struct PendingCell {
    shift: Option<StateID>,
    accept: bool,
    reduces: Vec<ProductionID>,
}

/// Merge the automaton's shifts, the computed reductions, and the gotos into
/// the runtime tables, resolving (or, in GLR mode, retaining) conflicts.
#[tracing::instrument(skip_all)]
pub fn assemble(
    g: &Grammar,
    lr0: &LR0Automaton,
    lalr: &LalrData,
    driver: DriverKind,
) -> Result<(ParserSpec, ConflictReport), SpecError> {
    let num_terminals = g.terminal_count();
    let num_nonterminals = g.nonterminal_count();
    let num_states = lr0.states.len();

    let mut actions = vec![Action::Error; num_states * num_terminals];
    let mut gotos: Vec<Option<StateIdx>> = vec![None; num_states * num_nonterminals];
    let mut report = ConflictReport::default();

    for (&id, state) in &lr0.states {
        let mut pending = Map::<TerminalID, PendingCell>::default();
        for (&t, &next) in &state.shifts {
            let cell = pending.entry(t).or_default();
            if t == TerminalID::EOI {
                // The augmented production puts $eoi after the user's start
                // symbol; reaching it is acceptance, not a shift.
                cell.accept = true;
            } else {
                cell.shift = Some(next);
            }
        }
        for &production in &state.reduces {
            if production == ProductionID::ACCEPT {
                continue;
            }
            if let Some(la) = lalr.lookahead(id, production) {
                for t in la.iter() {
                    pending.entry(t).or_default().reduces.push(production);
                }
            }
        }

        let row = usize::from(id.into_raw()) * num_terminals;
        for (terminal, mut cell) in pending {
            cell.reduces.sort_unstable();
            let action = match driver {
                DriverKind::Lalr => resolve(g, id, terminal, &cell, &mut report),
                DriverKind::Glr => retain(id, terminal, &cell, &mut report),
            };
            actions[row + usize::from(terminal.into_raw())] = action;
        }

        let row = usize::from(id.into_raw()) * num_nonterminals;
        for (&n, &next) in &state.gotos {
            gotos[row + usize::from(n.into_raw())] = Some(StateIdx::from(next.into_raw()));
        }
    }

    let rules = (0..g.production_bound())
        .map(|raw| match g.get_production(ProductionID::from_raw(raw)) {
            Some(p) => RuleInfo {
                left: p.left.into_raw(),
                arity: p.right.len() as u16,
                name: p.display(g).to_string().into(),
            },
            None => RuleInfo {
                left: 0,
                arity: 0,
                name: "<stripped>".into(),
            },
        })
        .collect();

    let spec = ParserSpec::from_parts(SpecParts {
        actions,
        gotos,
        rules,
        terminal_names: g.terminals().map(|(_, d)| d.name().into()).collect(),
        nonterminal_names: g.nonterminals().map(|(_, n)| n.into()).collect(),
    })?;

    tracing::debug!(
        states = num_states,
        conflicts = report.unresolved(),
        "tables assembled"
    );
    Ok((spec, report))
}

/// Deterministic conflict resolution:
///
/// - shift/reduce with precedence on both sides: the higher precedence wins;
///   on a tie the associativity decides (left reduces, right shifts,
///   nonassoc rejects explicitly);
/// - shift/reduce with precedence missing on either side: shift, reported;
/// - reduce/reduce: the smallest production id, reported.
fn resolve(
    g: &Grammar,
    state: StateID,
    terminal: TerminalID,
    cell: &PendingCell,
    report: &mut ConflictReport,
) -> Action {
    if cell.accept {
        let chosen = Action::Accept;
        for &r in &cell.reduces {
            report.record(state, terminal, ConflictKind::ShiftReduce, &chosen, r);
        }
        return chosen;
    }

    let shift = cell
        .shift
        .map(|next| Action::Shift(StateIdx::from(next.into_raw())));
    let (reduce, losers) = match cell.reduces.split_first() {
        Some((first, rest)) => (Some(*first), rest),
        None => (None, &[][..]),
    };

    let chosen = match (shift, reduce) {
        (Some(shift), None) => shift,
        (None, Some(r)) => Action::Reduce(r.into_raw()),
        (Some(shift), Some(r)) => {
            let shift_prec = g.terminal(terminal).precedence();
            let reduce_prec = g.production(r).precedence();
            match compare(shift_prec, reduce_prec) {
                Some(Winner::Shift) => shift,
                Some(Winner::Reduce) => Action::Reduce(r.into_raw()),
                Some(Winner::Neither) => Action::Fail,
                None => {
                    report.record(state, terminal, ConflictKind::ShiftReduce, &shift, r);
                    shift
                }
            }
        }
        (None, None) => Action::Error,
    };

    for &r in losers {
        report.record(state, terminal, ConflictKind::ReduceReduce, &chosen, r);
    }
    chosen
}

/// GLR mode keeps every competitor: the cell materializes as a `Conflict`
/// in tentative order (accept, shift, then reductions by ascending id), and
/// precedence is not consulted.
fn retain(
    state: StateID,
    terminal: TerminalID,
    cell: &PendingCell,
    report: &mut ConflictReport,
) -> Action {
    let mut list = Vec::new();
    if cell.accept {
        list.push(Action::Accept);
    }
    if let Some(next) = cell.shift {
        list.push(Action::Shift(StateIdx::from(next.into_raw())));
    }
    for &r in &cell.reduces {
        list.push(Action::Reduce(r.into_raw()));
    }

    match list.len() {
        0 => Action::Error,
        1 => list.pop().expect("list has one element"),
        _ => {
            let kind = if cell.reduces.len() == list.len() {
                ConflictKind::ReduceReduce
            } else {
                ConflictKind::ShiftReduce
            };
            let chosen = Action::Conflict(list.into_boxed_slice());
            let discarded = match kind {
                ConflictKind::ShiftReduce => &cell.reduces[..],
                ConflictKind::ReduceReduce => &cell.reduces[1..],
            };
            for &r in discarded {
                report.record(state, terminal, kind, &chosen, r);
            }
            chosen
        }
    }
}

enum Winner {
    Shift,
    Reduce,
    Neither,
}

fn compare(shift_prec: Option<Precedence>, reduce_prec: Option<Precedence>) -> Option<Winner> {
    use std::cmp::Ordering;
    let (sp, rp) = (shift_prec?, reduce_prec?);
    match sp.priority.cmp(&rp.priority) {
        Ordering::Greater => Some(Winner::Shift),
        Ordering::Less => Some(Winner::Reduce),
        Ordering::Equal => match sp.assoc {
            Assoc::Left => Some(Winner::Reduce),
            Assoc::Right => Some(Winner::Shift),
            Assoc::Nonassoc => Some(Winner::Neither),
        },
    }
}
