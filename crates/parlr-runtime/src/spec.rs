//! The generated parse table.

use std::fmt;

/// The number identifying a state of the LR automaton. The initial state is 0.
pub type StateIdx = u32;

/// The number identifying a terminal symbol. Terminals are dense: the
/// end-of-input marker is [`EOI`], the error-recovery marker is [`ERROR`],
/// and the grammar's own terminals follow.
pub type TerminalIdx = u16;

/// The number identifying a nonterminal symbol. Index 0 is the synthetic
/// start symbol.
pub type NonterminalIdx = u16;

/// The number identifying a production rule. Rule 0 is the augmented start
/// production.
pub type RuleIdx = u16;

/// The reserved end-of-input terminal.
pub const EOI: TerminalIdx = 0;

/// The reserved terminal marking an error-recovery point.
pub const ERROR: TerminalIdx = 1;

/// The action performed by the automaton in a state on a lookahead terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Consume the lookahead and transition to the specified state.
    Shift(StateIdx),

    /// Match the specified production rule.
    Reduce(RuleIdx),

    /// The input forms a complete sentence.
    Accept,

    /// Reject the lookahead. Unlike [`Action::Error`], this entry was
    /// inserted explicitly while resolving a nonassociative conflict, and the
    /// drivers report it as an associativity violation rather than as an
    /// unexpected token.
    Fail,

    /// No action is defined.
    Error,

    /// Multiple competing actions were retained (GLR tables only). The order
    /// is the tentative insertion order: shift first, then reductions by
    /// ascending rule id.
    Conflict(Box<[Action]>),
}

impl Action {
    /// Whether the entry rejects the lookahead.
    pub fn is_rejecting(&self) -> bool {
        matches!(self, Self::Fail | Self::Error)
    }
}

/// Per-rule data consulted on reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInfo {
    /// The nonterminal on the left-hand side.
    pub left: NonterminalIdx,
    /// The number of right-hand-side symbols popped by the reduction.
    pub arity: u16,
    /// A rendering of the rule, used in diagnostics only.
    pub name: Box<str>,
}

/// The raw pieces a [`ParserSpec`] is assembled from.
///
/// `actions` and `gotos` are row-major: the entry for `(state, symbol)` lives
/// at `state * row_width + symbol`.
#[derive(Debug)]
pub struct SpecParts {
    pub actions: Vec<Action>,
    pub gotos: Vec<Option<StateIdx>>,
    pub rules: Vec<RuleInfo>,
    pub terminal_names: Vec<Box<str>>,
    pub nonterminal_names: Vec<Box<str>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("the action table is not a (states x terminals) matrix")]
    ActionShape,

    #[error("the goto table is not a (states x nonterminals) matrix")]
    GotoShape,

    #[error("rule {0} references an unknown symbol")]
    RuleSymbol(RuleIdx),

    #[error("a table entry references state {0}, which does not exist")]
    DanglingState(StateIdx),
}

/// The immutable tables interpreted by the drivers.
#[derive(Debug)]
pub struct ParserSpec {
    num_terminals: usize,
    num_nonterminals: usize,
    num_states: usize,
    actions: Box<[Action]>,
    gotos: Box<[Option<StateIdx>]>,
    rules: Box<[RuleInfo]>,
    terminal_names: Box<[Box<str>]>,
    nonterminal_names: Box<[Box<str>]>,
}

impl ParserSpec {
    /// Validate the raw tables and freeze them.
    pub fn from_parts(parts: SpecParts) -> Result<Self, SpecError> {
        let SpecParts {
            actions,
            gotos,
            rules,
            terminal_names,
            nonterminal_names,
        } = parts;

        let num_terminals = terminal_names.len();
        let num_nonterminals = nonterminal_names.len();
        if num_terminals == 0 || actions.len() % num_terminals != 0 {
            return Err(SpecError::ActionShape);
        }
        let num_states = actions.len() / num_terminals;
        if num_nonterminals == 0 || gotos.len() != num_states * num_nonterminals {
            return Err(SpecError::GotoShape);
        }

        let check_state = |s: StateIdx| {
            if (s as usize) < num_states {
                Ok(())
            } else {
                Err(SpecError::DanglingState(s))
            }
        };
        for action in &actions {
            match action {
                Action::Shift(next) => check_state(*next)?,
                Action::Conflict(list) => {
                    for action in list.iter() {
                        if let Action::Shift(next) = action {
                            check_state(*next)?;
                        }
                    }
                }
                _ => {}
            }
        }
        for goto in gotos.iter().flatten() {
            check_state(*goto)?;
        }
        for (i, rule) in rules.iter().enumerate() {
            if usize::from(rule.left) >= num_nonterminals {
                return Err(SpecError::RuleSymbol(i as RuleIdx));
            }
        }

        Ok(Self {
            num_terminals,
            num_nonterminals,
            num_states,
            actions: actions.into_boxed_slice(),
            gotos: gotos.into_boxed_slice(),
            rules: rules.into_boxed_slice(),
            terminal_names: terminal_names.into_boxed_slice(),
            nonterminal_names: nonterminal_names.into_boxed_slice(),
        })
    }

    pub fn initial_state(&self) -> StateIdx {
        0
    }

    pub fn state_count(&self) -> usize {
        self.num_states
    }

    pub fn terminal_count(&self) -> usize {
        self.num_terminals
    }

    pub fn nonterminal_count(&self) -> usize {
        self.num_nonterminals
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn action(&self, state: StateIdx, terminal: TerminalIdx) -> &Action {
        &self.actions[state as usize * self.num_terminals + usize::from(terminal)]
    }

    pub fn goto(&self, state: StateIdx, nonterminal: NonterminalIdx) -> Option<StateIdx> {
        self.gotos[state as usize * self.num_nonterminals + usize::from(nonterminal)]
    }

    pub fn rule(&self, rule: RuleIdx) -> &RuleInfo {
        &self.rules[usize::from(rule)]
    }

    pub fn terminal_name(&self, terminal: TerminalIdx) -> &str {
        &self.terminal_names[usize::from(terminal)]
    }

    pub fn nonterminal_name(&self, nonterminal: NonterminalIdx) -> &str {
        &self.nonterminal_names[usize::from(nonterminal)]
    }

    /// Look up a terminal by its grammar name, for lexers that tag tokens
    /// with category names.
    pub fn terminal_index(&self, name: &str) -> Option<TerminalIdx> {
        self.terminal_names
            .iter()
            .position(|n| &**n == name)
            .map(|i| i as TerminalIdx)
    }

    /// The terminals a state is prepared to act on, for diagnostics.
    pub fn expected_terminals(&self, state: StateIdx) -> impl Iterator<Item = TerminalIdx> + '_ {
        let row = &self.actions
            [state as usize * self.num_terminals..(state as usize + 1) * self.num_terminals];
        row.iter()
            .enumerate()
            .filter(|(t, action)| !action.is_rejecting() && *t != usize::from(ERROR))
            .map(|(t, _)| t as TerminalIdx)
    }

    /// Render the expected-terminal list of a state, for error messages.
    pub(crate) fn expectation(&self, state: StateIdx) -> String {
        let names: Vec<&str> = self
            .expected_terminals(state)
            .map(|t| self.terminal_name(t))
            .collect();
        names.join(", ")
    }
}

impl fmt::Display for ParserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ParserSpec({} states, {} terminals, {} nonterminals, {} rules)",
            self.num_states,
            self.num_terminals,
            self.num_nonterminals,
            self.rules.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<Box<str>> {
        names.iter().map(|n| Box::from(*n)).collect()
    }

    #[test]
    fn rejects_ragged_action_table() {
        let parts = SpecParts {
            actions: vec![Action::Error; 7],
            gotos: vec![],
            rules: vec![],
            terminal_names: names(&["$eoi", "$error", "A"]),
            nonterminal_names: names(&["$start"]),
        };
        assert!(matches!(
            ParserSpec::from_parts(parts),
            Err(SpecError::ActionShape)
        ));
    }

    #[test]
    fn rejects_dangling_shift() {
        let parts = SpecParts {
            actions: vec![Action::Shift(5), Action::Error, Action::Error],
            gotos: vec![None],
            rules: vec![],
            terminal_names: names(&["$eoi", "$error", "A"]),
            nonterminal_names: names(&["$start"]),
        };
        assert!(matches!(
            ParserSpec::from_parts(parts),
            Err(SpecError::DanglingState(5))
        ));
    }

    #[test]
    fn indexes_rows_by_state() {
        let parts = SpecParts {
            actions: vec![
                Action::Error,
                Action::Error,
                Action::Shift(1),
                Action::Accept,
                Action::Error,
                Action::Error,
            ],
            gotos: vec![None, None],
            rules: vec![],
            terminal_names: names(&["$eoi", "$error", "A"]),
            nonterminal_names: names(&["$start"]),
        };
        let spec = ParserSpec::from_parts(parts).unwrap();
        assert_eq!(spec.state_count(), 2);
        assert_eq!(*spec.action(0, 2), Action::Shift(1));
        assert_eq!(*spec.action(1, 0), Action::Accept);
        assert_eq!(spec.terminal_index("A"), Some(2));
        assert_eq!(spec.expected_terminals(0).collect::<Vec<_>>(), vec![2]);
    }
}
