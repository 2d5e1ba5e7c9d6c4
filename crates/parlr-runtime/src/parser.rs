//! The deterministic LALR(1) driver.

use crate::spec::{Action, ParserSpec, EOI, ERROR};
use crate::token::{Lexer, Token};
use std::sync::Arc;

/// The semantic action attached to a production rule: consumes the values of
/// the matched right-hand side and produces the value of the left-hand side.
pub type SemanticAction<V> = Box<dyn Fn(Vec<V>) -> V + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("expected one semantic action per rule ({expected}), got {got}")]
    ActionCount { expected: usize, got: usize },
}

/// The failure sentinel returned when a parse cannot complete.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    /// A syntax error from which no `error`-production recovery was possible.
    /// The error callback has been invoked before this is returned.
    #[error("unrecoverable syntax error")]
    Unrecoverable,

    #[error("the lexer produced terminal index {0}, which the grammar does not know")]
    UnknownTerminal(u16),

    /// The tables contain retained conflicts; only the GLR driver can
    /// interpret them.
    #[error("the parse table is nondeterministic")]
    NondeterministicTable,

    #[error("malformed parse tables: {0}")]
    Tables(&'static str),
}

/// The table-driven stack machine: a stack of `(state, value)` pairs and a
/// one-token lookahead buffer.
pub struct Parser<V> {
    spec: Arc<ParserSpec>,
    actions: Vec<SemanticAction<V>>,
}

impl<V> Parser<V> {
    /// Bind one semantic action per production rule. Index 0 belongs to the
    /// augmented start rule and is never invoked.
    pub fn new(spec: Arc<ParserSpec>, actions: Vec<SemanticAction<V>>) -> Result<Self, DriverError> {
        if actions.len() != spec.rule_count() {
            return Err(DriverError::ActionCount {
                expected: spec.rule_count(),
                got: actions.len(),
            });
        }
        Ok(Self { spec, actions })
    }

    pub fn spec(&self) -> &ParserSpec {
        &self.spec
    }
}

impl<V: Default> Parser<V> {
    /// Run the automaton over the lexer's tokens until it accepts or fails.
    ///
    /// `on_error` is invoked exactly once per syntax-error episode, with a
    /// message and the offending token (`None` at end of input); its return
    /// value is ignored. Recovery then proceeds through `error` productions,
    /// and the parse aborts with [`ParseFailure::Unrecoverable`] only when no
    /// state on the stack can shift the error token or the input runs out.
    pub fn parse<L, E>(&self, mut lexer: L, mut on_error: E) -> Result<V, ParseFailure>
    where
        L: Lexer<V>,
        E: FnMut(&str, Option<&Token<V>>),
    {
        let spec = &*self.spec;
        let mut states = vec![spec.initial_state()];
        let mut values: Vec<V> = Vec::new();
        // `Some(None)` is buffered end-of-input.
        let mut lookahead: Option<Option<Token<V>>> = None;
        let mut recovering = false;

        loop {
            let slot = lookahead.get_or_insert_with(|| lexer.next_token());
            let terminal = slot.as_ref().map_or(EOI, |t| t.terminal);
            if usize::from(terminal) >= spec.terminal_count() {
                return Err(ParseFailure::UnknownTerminal(terminal));
            }

            let state = *states.last().expect("the state stack is never empty");
            match spec.action(state, terminal) {
                Action::Shift(next) => {
                    let token = lookahead
                        .take()
                        .and_then(|slot| slot)
                        .ok_or(ParseFailure::Tables("shift action on end of input"))?;
                    states.push(*next);
                    values.push(token.value);
                    recovering = false;
                }

                Action::Reduce(rule) => {
                    let info = spec.rule(*rule);
                    let arity = usize::from(info.arity);
                    if values.len() < arity {
                        return Err(ParseFailure::Tables("reduction deeper than the stack"));
                    }
                    let args = values.split_off(values.len() - arity);
                    states.truncate(states.len() - arity);
                    let top = *states.last().expect("the state stack is never empty");
                    let next = spec
                        .goto(top, info.left)
                        .ok_or(ParseFailure::Tables("missing goto entry"))?;
                    let value = (self.actions[usize::from(*rule)])(args);
                    states.push(next);
                    values.push(value);
                }

                Action::Accept => {
                    return values
                        .pop()
                        .ok_or(ParseFailure::Tables("accept on an empty stack"));
                }

                Action::Conflict(_) => return Err(ParseFailure::NondeterministicTable),

                action @ (Action::Fail | Action::Error) => {
                    if recovering {
                        // A fresh failure before any shift: drop the
                        // offending token instead of opening a new episode.
                        if terminal == EOI {
                            return Err(ParseFailure::Unrecoverable);
                        }
                        lookahead = None;
                    } else {
                        let message = match action {
                            Action::Fail => format!(
                                "syntax error: {} is nonassociative and cannot appear here",
                                spec.terminal_name(terminal)
                            ),
                            _ if terminal == EOI => format!(
                                "syntax error: unexpected end of input, expected one of: {}",
                                spec.expectation(state)
                            ),
                            _ => format!(
                                "syntax error: unexpected {}, expected one of: {}",
                                spec.terminal_name(terminal),
                                spec.expectation(state)
                            ),
                        };
                        on_error(&message, slot.as_ref());
                        recovering = true;
                    }

                    if !recover(spec, &mut states, &mut values, &mut lookahead, &mut lexer) {
                        return Err(ParseFailure::Unrecoverable);
                    }
                }
            }
        }
    }
}

/// Pop states until one shifts the error token, push its target with a
/// placeholder value, and discard lookahead tokens until one the recovery
/// state can act on (or end of input) comes up. Returns `false` when no state
/// on the stack can shift the error token.
fn recover<V: Default, L>(
    spec: &ParserSpec,
    states: &mut Vec<u32>,
    values: &mut Vec<V>,
    lookahead: &mut Option<Option<Token<V>>>,
    lexer: &mut L,
) -> bool
where
    L: Lexer<V>,
{
    loop {
        let Some(&top) = states.last() else {
            return false;
        };
        if let Action::Shift(next) = spec.action(top, ERROR) {
            states.push(*next);
            values.push(V::default());
            break;
        }
        states.pop();
        values.pop();
    }

    loop {
        let slot = lookahead.get_or_insert_with(|| lexer.next_token());
        let terminal = slot.as_ref().map_or(EOI, |t| t.terminal);
        if terminal == EOI {
            break;
        }
        let top = *states.last().expect("the state stack is never empty");
        if usize::from(terminal) < spec.terminal_count()
            && !spec.action(top, terminal).is_rejecting()
        {
            break;
        }
        *lookahead = None;
    }
    true
}
