//! The generalized (GLR) driver.
//!
//! Tables built for this driver keep nondeterministic cells as
//! [`Action::Conflict`]. Each candidate action forks the parse stack; stacks
//! share their unexplored tails through reference counting, so the live
//! branches form a DAG rather than a set of independent copies. Branches that
//! cover the same input with the same state chain are merged, packing their
//! alternative semantic values into one entry. The parse result is the list
//! of values carried by every branch that reached the accept action.

use crate::parser::{DriverError, ParseFailure};
use crate::spec::{Action, ParserSpec, RuleIdx, StateIdx, EOI};
use crate::token::{Lexer, Token};
use std::rc::Rc;
use std::sync::Arc;

/// The semantic action protocol of the GLR driver. Unlike the deterministic
/// driver's consuming actions, these borrow their arguments: a value may be
/// an argument of several competing reductions, and a packed entry replays
/// the action once per alternative combination.
pub type GlrSemanticAction<V> = Box<dyn Fn(&[V]) -> V + Send + Sync>;

/// One stack entry. `values` holds every semantic value derived for the span
/// `[start, here)`; more than one element means a packed local ambiguity.
struct Node<V> {
    state: StateIdx,
    start: usize,
    values: Vec<V>,
    prev: Option<Rc<Node<V>>>,
    depth: usize,
}

/// One branch of the forked stack: a head pointing into the shared DAG.
struct Branch<V> {
    head: Rc<Node<V>>,
}

impl<V> Clone for Branch<V> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<V: Clone> Branch<V> {
    fn initial(state: StateIdx) -> Self {
        Self {
            head: Rc::new(Node {
                state,
                start: 0,
                values: Vec::new(),
                prev: None,
                depth: 1,
            }),
        }
    }

    fn state(&self) -> StateIdx {
        self.head.state
    }

    fn push(&self, state: StateIdx, start: usize, values: Vec<V>) -> Self {
        Self {
            head: Rc::new(Node {
                state,
                start,
                values,
                prev: Some(self.head.clone()),
                depth: self.head.depth + 1,
            }),
        }
    }

    /// Pop `n` entries, returning the remaining branch, the popped
    /// alternative lists in right-hand-side order, and the position where the
    /// popped span begins (`fallback` for empty pops).
    fn pop(&self, n: usize, fallback: usize) -> Option<(Self, Vec<Vec<V>>, usize)> {
        let mut frames = Vec::with_capacity(n);
        let mut start = fallback;
        let mut node = self.head.clone();
        for _ in 0..n {
            frames.push(node.values.clone());
            start = node.start;
            node = node.prev.clone()?;
        }
        frames.reverse();
        Some((Self { head: node }, frames, start))
    }

    /// Two branches can merge when they spell the same states over the same
    /// input spans.
    fn mergeable(&self, other: &Self) -> bool {
        if self.head.depth != other.head.depth {
            return false;
        }
        let mut a = Some(&self.head);
        let mut b = Some(&other.head);
        while let (Some(x), Some(y)) = (a, b) {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            if x.state != y.state || x.start != y.start {
                return false;
            }
            a = x.prev.as_ref();
            b = y.prev.as_ref();
        }
        true
    }

    /// Merge by unifying alternative values entry-wise. Shared tails are
    /// reused untouched.
    fn merge(&self, other: &Self) -> Self {
        fn merge_nodes<V: Clone>(a: &Rc<Node<V>>, b: &Rc<Node<V>>) -> Rc<Node<V>> {
            if Rc::ptr_eq(a, b) {
                return a.clone();
            }
            let prev = match (&a.prev, &b.prev) {
                (Some(x), Some(y)) => Some(merge_nodes(x, y)),
                _ => None,
            };
            let mut values = a.values.clone();
            values.extend(b.values.iter().cloned());
            Rc::new(Node {
                state: a.state,
                start: a.start,
                values,
                prev,
                depth: a.depth,
            })
        }
        Self {
            head: merge_nodes(&self.head, &other.head),
        }
    }
}

/// The forking driver. Requires `V: Clone` because a token's value is handed
/// to every branch that shifts it.
pub struct GlrParser<V> {
    spec: Arc<ParserSpec>,
    actions: Vec<GlrSemanticAction<V>>,
}

impl<V> GlrParser<V> {
    /// Bind one semantic action per production rule. Index 0 belongs to the
    /// augmented start rule and is never invoked.
    pub fn new(
        spec: Arc<ParserSpec>,
        actions: Vec<GlrSemanticAction<V>>,
    ) -> Result<Self, DriverError> {
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

impl<V: Clone> GlrParser<V> {
    /// Parse the lexer's tokens, exploring every retained conflict, and
    /// return the semantic values of all completed parses.
    ///
    /// `on_error` is invoked once, with the offending token, when every
    /// branch has died; there is no error recovery in this driver.
    pub fn parse<L, E>(&self, mut lexer: L, mut on_error: E) -> Result<Vec<V>, ParseFailure>
    where
        L: Lexer<V>,
        E: FnMut(&str, Option<&Token<V>>),
    {
        let spec = &*self.spec;
        let mut heads: Vec<Branch<V>> = vec![Branch::initial(spec.initial_state())];
        let mut results: Vec<V> = Vec::new();
        let mut pos = 0usize;

        loop {
            let token = lexer.next_token();
            let terminal = token.as_ref().map_or(EOI, |t| t.terminal);
            if usize::from(terminal) >= spec.terminal_count() {
                return Err(ParseFailure::UnknownTerminal(terminal));
            }

            // Reduce until every surviving branch is ready to consume the
            // lookahead (or has accepted it as end of input).
            let mut frontier = std::mem::take(&mut heads);
            let mut shifted: Vec<Branch<V>> = Vec::new();
            while !frontier.is_empty() {
                coalesce(&mut frontier);
                let branch = frontier.pop().expect("frontier is non-empty");
                for action in candidates(spec.action(branch.state(), terminal)) {
                    match action {
                        Action::Shift(next) => {
                            if let Some(token) = &token {
                                shifted.push(branch.push(*next, pos, vec![token.value.clone()]));
                            }
                        }
                        Action::Reduce(rule) => {
                            frontier.push(self.reduce(&branch, *rule, pos)?);
                        }
                        Action::Accept => {
                            results.extend(branch.head.values.iter().cloned());
                        }
                        Action::Fail | Action::Error => {}
                        Action::Conflict(_) => {
                            return Err(ParseFailure::Tables("nested conflict entry"));
                        }
                    }
                }
            }

            match token {
                None => {
                    if results.is_empty() {
                        on_error("syntax error: unexpected end of input", None);
                        return Err(ParseFailure::Unrecoverable);
                    }
                    return Ok(results);
                }
                Some(token) => {
                    if shifted.is_empty() {
                        let message = format!(
                            "syntax error: unexpected {}",
                            spec.terminal_name(terminal)
                        );
                        on_error(&message, Some(&token));
                        return Err(ParseFailure::Unrecoverable);
                    }
                    coalesce(&mut shifted);
                    heads = shifted;
                    pos += 1;
                }
            }
        }
    }

    /// Apply one reduction to one branch, replaying the semantic action for
    /// every combination of packed alternatives among the popped entries.
    fn reduce(&self, branch: &Branch<V>, rule: RuleIdx, pos: usize) -> Result<Branch<V>, ParseFailure> {
        let spec = &*self.spec;
        let info = spec.rule(rule);
        let arity = usize::from(info.arity);
        let (rest, frames, start) = branch
            .pop(arity, pos)
            .ok_or(ParseFailure::Tables("reduction deeper than the stack"))?;
        let action = &self.actions[usize::from(rule)];

        let mut values = Vec::new();
        let mut combo: Vec<V> = Vec::with_capacity(arity);
        product(&frames, &mut combo, &mut |args| values.push(action(args)));

        let next = spec
            .goto(rest.state(), info.left)
            .ok_or(ParseFailure::Tables("missing goto entry"))?;
        Ok(rest.push(next, start, values))
    }
}

/// The candidate actions of a table entry, in retained order.
fn candidates(action: &Action) -> &[Action] {
    match action {
        Action::Conflict(list) => list,
        action => std::slice::from_ref(action),
    }
}

/// Merge every mergeable pair of branches.
fn coalesce<V: Clone>(branches: &mut Vec<Branch<V>>) {
    let mut i = 0;
    while i < branches.len() {
        let mut j = i + 1;
        while j < branches.len() {
            if branches[i].mergeable(&branches[j]) {
                let merged = branches[i].merge(&branches[j]);
                branches[i] = merged;
                branches.swap_remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}

/// Enumerate the cartesian product of the alternative lists.
fn product<V: Clone>(frames: &[Vec<V>], combo: &mut Vec<V>, emit: &mut impl FnMut(&[V])) {
    match frames.split_first() {
        None => emit(combo),
        Some((alternatives, rest)) => {
            for value in alternatives {
                combo.push(value.clone());
                product(rest, combo, emit);
                combo.pop();
            }
        }
    }
}
