//! The human-readable dump of states, items, and tables.
//!
//! The format is informative only; nothing parses it back.

use crate::grammar::Grammar;
use crate::lr0::LR0Automaton;
use crate::table::ConflictReport;
use crate::util::display_fn;
use parlr_runtime::spec::{Action, ParserSpec, StateIdx, TerminalIdx};
use std::fmt;

/// Render the productions, every state (kernel items, transitions, actions),
/// and the conflict listing.
pub fn table_dump<'a>(
    g: &'a Grammar,
    lr0: &'a LR0Automaton,
    spec: &'a ParserSpec,
    conflicts: &'a ConflictReport,
) -> impl fmt::Display + 'a {
    display_fn(move |f| {
        writeln!(f, "#### productions")?;
        for (id, production) in g.productions() {
            write!(f, "[{:02}] {}", id.into_raw(), production.display(g))?;
            match production.precedence() {
                Some(p) => writeln!(f, "  (prec {} {:?})", p.priority, p.assoc)?,
                None => writeln!(f)?,
            }
        }

        for (&id, state) in &lr0.states {
            writeln!(f, "\n#### state {}", id.into_raw())?;
            for kernel in &state.kernels {
                writeln!(f, "  {}", kernel.display(g))?;
            }

            if !state.shifts.is_empty() || !state.gotos.is_empty() {
                writeln!(f, "## transitions")?;
                for (t, next) in &state.shifts {
                    writeln!(f, "  {} => state {}", g.terminal_name(*t), next.into_raw())?;
                }
                for (n, next) in &state.gotos {
                    writeln!(
                        f,
                        "  {} => state {}",
                        g.nonterminal_name(*n),
                        next.into_raw()
                    )?;
                }
            }

            writeln!(f, "## actions")?;
            let state_idx = StateIdx::from(id.into_raw());
            for t in 0..spec.terminal_count() as TerminalIdx {
                let action = spec.action(state_idx, t);
                if matches!(action, Action::Error) {
                    continue;
                }
                writeln!(
                    f,
                    "  {} => {}",
                    spec.terminal_name(t),
                    render_action(spec, action)
                )?;
            }

            if conflicts.in_state(id).next().is_some() {
                writeln!(f, "## conflicts")?;
                for c in conflicts.in_state(id) {
                    writeln!(
                        f,
                        "  on {}: reduce({}) discarded",
                        g.terminal_name(c.terminal),
                        g.production(c.discarded).display(g)
                    )?;
                }
            }
        }
        Ok(())
    })
}

fn render_action<'a>(spec: &'a ParserSpec, action: &'a Action) -> impl fmt::Display + 'a {
    display_fn(move |f| render_action_inner(f, spec, action))
}

fn render_action_inner(
    f: &mut fmt::Formatter<'_>,
    spec: &ParserSpec,
    action: &Action,
) -> fmt::Result {
    match action {
        Action::Shift(next) => write!(f, "shift({})", next),
        Action::Reduce(rule) => write!(f, "reduce({})", spec.rule(*rule).name),
        Action::Accept => f.write_str("accept"),
        Action::Fail => f.write_str("fail (nonassoc)"),
        Action::Error => f.write_str("error"),
        Action::Conflict(list) => {
            f.write_str("conflict[")?;
            for (i, action) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                render_action_inner(f, spec, action)?;
            }
            f.write_str("]")
        }
    }
}
