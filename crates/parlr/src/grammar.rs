//! Grammar intake: symbol declarations, precedence groups, production rules.

use crate::types::{Map, Set};
use crate::util::display_fn;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalID(u16);

impl TerminalID {
    /// Reserved terminal meaning the end of input.
    pub const EOI: Self = Self(0);
    /// Reserved terminal marking the recovery point in error productions.
    pub const ERROR: Self = Self(1);
    const OFFSET: u16 = 2;

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EOI => write!(f, "T#End"),
            &Self::ERROR => write!(f, "T#Err"),
            _ => write!(f, "T#{:03}", self.0),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonterminalID(u16);

impl NonterminalID {
    /// The synthetic start symbol prepended at intake.
    pub const START: Self = Self(0);
    const OFFSET: u16 = 1;

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::START => write!(f, "N#Start"),
            _ => write!(f, "N#{:03}", self.0),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T(t) => write!(f, "{:?}", t),
            Self::N(n) => write!(f, "{:?}", n),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionID(u16);

impl ProductionID {
    /// The augmented start production `$accept : S $eoi`.
    pub const ACCEPT: Self = Self(0);
    const OFFSET: u16 = 1;

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::ACCEPT => write!(f, "P#Accept"),
            _ => write!(f, "P#{:03}", self.0),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Precedence {
    pub priority: u16,
    pub assoc: Assoc,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

#[derive(Debug, Clone)]
pub struct TerminalData {
    name: String,
    precedence: Option<Precedence>,
}

impl TerminalData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }
}

/// A production rule. The precedence is already resolved per the defaulting
/// rule: an explicit `prec:` terminal if one was given, otherwise the
/// rightmost terminal of the right-hand side, otherwise nothing.
#[derive(Debug, Clone)]
pub struct Production {
    pub left: NonterminalID,
    pub right: Vec<SymbolID>,
    precedence: Option<Precedence>,
}

impl Production {
    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} ->", g.nonterminal_name(self.left))?;
            if self.right.is_empty() {
                f.write_str(" %empty")?;
            }
            for symbol in &self.right {
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("terminal `{0}` is declared twice")]
    DuplicateTerminal(String),

    #[error("terminal `{0}` already belongs to a precedence group")]
    DuplicatePrecedence(String),

    #[error("symbol `{0}` is not defined by this grammar")]
    UndefinedSymbol(String),

    #[error("the grammar has no production rules")]
    EmptyGrammar,

    #[error("ill-formed production: {0}")]
    IllFormedProduction(String),
}

/// The grammar the parser tables are derived from. Immutable once
/// [`Grammar::define`] returns.
#[derive(Debug, Clone)]
pub struct Grammar {
    terminals: Map<TerminalID, TerminalData>,
    nonterminals: Map<NonterminalID, String>,
    productions: Map<ProductionID, Production>,
    start_symbol: NonterminalID,
    nullables: Set<NonterminalID>,
    production_bound: u16,
}

impl Grammar {
    /// Build a grammar through the definition context. Validation happens
    /// both per call and once the closure returns.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef::new();
        f(&mut def)?;
        def.end()
    }

    pub fn terminals(&self) -> impl Iterator<Item = (TerminalID, &TerminalData)> + '_ {
        self.terminals.iter().map(|(id, data)| (*id, data))
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = (NonterminalID, &str)> + '_ {
        self.nonterminals.iter().map(|(id, name)| (*id, &**name))
    }

    pub fn productions(&self) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        self.productions.iter().map(|(id, p)| (*id, p))
    }

    pub fn rules_of(
        &self,
        left: NonterminalID,
    ) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        self.productions().filter(move |(_, p)| p.left == left)
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[&id]
    }

    pub fn get_production(&self, id: ProductionID) -> Option<&Production> {
        self.productions.get(&id)
    }

    pub fn terminal(&self, id: TerminalID) -> &TerminalData {
        &self.terminals[&id]
    }

    pub fn terminal_name(&self, id: TerminalID) -> &str {
        self.terminals[&id].name()
    }

    pub fn nonterminal_name(&self, id: NonterminalID) -> &str {
        &self.nonterminals[&id]
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminal_name(t),
            SymbolID::N(n) => self.nonterminal_name(n),
        }
    }

    pub fn start_symbol(&self) -> NonterminalID {
        self.start_symbol
    }

    pub fn nullable(&self, n: NonterminalID) -> bool {
        self.nullables.contains(&n)
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn nonterminal_count(&self) -> usize {
        self.nonterminals.len()
    }

    /// One past the largest production id ever issued. Stays stable when
    /// productions are stripped, so rule ids keep their meaning.
    pub fn production_bound(&self) -> u16 {
        self.production_bound
    }

    /// A copy of this grammar without its error productions, used by GLR
    /// table construction. Production ids of the surviving rules are kept.
    pub fn without_error_productions(&self) -> Self {
        let productions: Map<ProductionID, Production> = self
            .productions
            .iter()
            .filter(|(_, p)| !p.right.contains(&SymbolID::T(TerminalID::ERROR)))
            .map(|(id, p)| (*id, p.clone()))
            .collect();
        let nullables = nullable_fixpoint(&productions);
        Self {
            terminals: self.terminals.clone(),
            nonterminals: self.nonterminals.clone(),
            productions,
            start_symbol: self.start_symbol,
            nullables,
            production_bound: self.production_bound,
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminals:")?;
        for (_, data) in self.terminals() {
            write!(f, " {}", data.name())?;
        }
        write!(f, "\nnonterminals:")?;
        for (_, name) in self.nonterminals() {
            write!(f, " {}", name)?;
        }
        writeln!(
            f,
            "\nstart symbol: {}",
            self.nonterminal_name(self.start_symbol)
        )?;
        writeln!(f, "productions:")?;
        for (id, p) in self.productions() {
            writeln!(f, "  [{:02}] {}", id.into_raw(), p.display(self))?;
        }
        Ok(())
    }
}

/// The least fixpoint of "every right-hand-side symbol is a nullable
/// nonterminal".
fn nullable_fixpoint(productions: &Map<ProductionID, Production>) -> Set<NonterminalID> {
    let mut nullables = Set::default();
    loop {
        let mut changed = false;
        for p in productions.values() {
            if p.right
                .iter()
                .all(|s| matches!(s, SymbolID::N(n) if nullables.contains(n)))
            {
                changed |= nullables.insert(p.left);
            }
        }
        if !changed {
            return nullables;
        }
    }
}

struct DefRule {
    left: NonterminalID,
    right: Vec<SymbolID>,
    prec: Option<TerminalID>,
}

/// The contextual values for building a [`Grammar`].
pub struct GrammarDef {
    terminals: Map<TerminalID, TerminalData>,
    nonterminals: Map<NonterminalID, String>,
    rules: Vec<DefRule>,
    start_symbol: Option<NonterminalID>,
    next_terminal: u16,
    next_nonterminal: u16,
    next_priority: u16,
}

impl GrammarDef {
    fn new() -> Self {
        let mut terminals = Map::default();
        terminals.insert(
            TerminalID::EOI,
            TerminalData {
                name: "$eoi".into(),
                precedence: None,
            },
        );
        terminals.insert(
            TerminalID::ERROR,
            TerminalData {
                name: "$error".into(),
                precedence: None,
            },
        );
        let mut nonterminals = Map::default();
        nonterminals.insert(NonterminalID::START, "$accept".into());
        Self {
            terminals,
            nonterminals,
            rules: Vec::new(),
            start_symbol: None,
            next_terminal: TerminalID::OFFSET,
            next_nonterminal: NonterminalID::OFFSET,
            next_priority: 0,
        }
    }

    /// Declare a terminal symbol.
    pub fn terminal(&mut self, name: &str) -> Result<TerminalID, GrammarError> {
        if self.terminals.values().any(|t| t.name == name) {
            return Err(GrammarError::DuplicateTerminal(name.to_owned()));
        }
        let id = TerminalID(self.next_terminal);
        self.next_terminal += 1;
        self.terminals.insert(
            id,
            TerminalData {
                name: name.to_owned(),
                precedence: None,
            },
        );
        Ok(id)
    }

    /// The reserved terminal for error productions.
    pub fn error_token(&self) -> TerminalID {
        TerminalID::ERROR
    }

    /// Form one precedence group: its members share the next priority level
    /// (levels grow with each group declared) and the given associativity.
    pub fn precedence<I>(&mut self, assoc: Assoc, members: I) -> Result<(), GrammarError>
    where
        I: IntoIterator<Item = TerminalID>,
    {
        let priority = self.next_priority;
        self.next_priority += 1;
        for id in members {
            let data = self
                .terminals
                .get_mut(&id)
                .ok_or_else(|| GrammarError::UndefinedSymbol(format!("{:?}", id)))?;
            if data.precedence.is_some() {
                return Err(GrammarError::DuplicatePrecedence(data.name.clone()));
            }
            data.precedence = Some(Precedence { priority, assoc });
        }
        Ok(())
    }

    /// Declare a nonterminal symbol. Mentioning a name again yields the id it
    /// was first given.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarError> {
        if let Some((id, _)) = self.nonterminals.iter().find(|(_, n)| *n == name) {
            return Ok(*id);
        }
        let id = NonterminalID(self.next_nonterminal);
        self.next_nonterminal += 1;
        self.nonterminals.insert(id, name.to_owned());
        Ok(id)
    }

    /// Add a production rule.
    pub fn rule<I>(&mut self, left: NonterminalID, right: I) -> Result<ProductionID, GrammarError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        self.add_rule(left, right.into_iter().collect(), None)
    }

    /// Add a production rule borrowing the precedence of `prec` (the
    /// `prec:` annotation) instead of its rightmost terminal's.
    pub fn rule_with_prec<I>(
        &mut self,
        left: NonterminalID,
        right: I,
        prec: TerminalID,
    ) -> Result<ProductionID, GrammarError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        self.add_rule(left, right.into_iter().collect(), Some(prec))
    }

    fn add_rule(
        &mut self,
        left: NonterminalID,
        right: Vec<SymbolID>,
        prec: Option<TerminalID>,
    ) -> Result<ProductionID, GrammarError> {
        if !self.nonterminals.contains_key(&left) {
            return Err(GrammarError::UndefinedSymbol(format!("{:?}", left)));
        }
        for symbol in &right {
            let known = match symbol {
                SymbolID::T(t) => self.terminals.contains_key(t),
                SymbolID::N(n) => self.nonterminals.contains_key(n),
            };
            if !known {
                return Err(GrammarError::UndefinedSymbol(format!("{:?}", symbol)));
            }
        }
        if let Some(prec) = prec {
            if !self.terminals.contains_key(&prec) {
                return Err(GrammarError::UndefinedSymbol(format!("{:?}", prec)));
            }
        }
        self.check_error_shape(&right)?;

        let id = ProductionID(ProductionID::OFFSET + self.rules.len() as u16);
        self.rules.push(DefRule { left, right, prec });
        Ok(id)
    }

    /// An error production carries at most one `$error`, and the recovery
    /// synchronization symbol following it must be a terminal.
    fn check_error_shape(&self, right: &[SymbolID]) -> Result<(), GrammarError> {
        let mut positions = right
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == SymbolID::T(TerminalID::ERROR))
            .map(|(i, _)| i);
        let Some(first) = positions.next() else {
            return Ok(());
        };
        if positions.next().is_some() {
            return Err(GrammarError::IllFormedProduction(
                "more than one $error in a right-hand side".into(),
            ));
        }
        if let Some(SymbolID::N(_)) = right.get(first + 1) {
            return Err(GrammarError::IllFormedProduction(
                "$error must be followed by a terminal".into(),
            ));
        }
        Ok(())
    }

    /// Override the start symbol. Without this, the first declared
    /// nonterminal starts the grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarError> {
        if !self.nonterminals.contains_key(&symbol) {
            return Err(GrammarError::UndefinedSymbol(format!("{:?}", symbol)));
        }
        self.start_symbol.replace(symbol);
        Ok(())
    }

    fn end(self) -> Result<Grammar, GrammarError> {
        let start = match self.start_symbol {
            Some(start) => start,
            None => self
                .nonterminals
                .keys()
                .copied()
                .find(|n| *n != NonterminalID::START)
                .ok_or(GrammarError::EmptyGrammar)?,
        };
        if self.rules.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }

        // Every nonterminal reachable from a right-hand side (or the start
        // symbol itself) must be some rule's left-hand side.
        let referenced = self
            .rules
            .iter()
            .flat_map(|r| &r.right)
            .filter_map(|s| match s {
                SymbolID::N(n) => Some(*n),
                SymbolID::T(_) => None,
            })
            .chain(Some(start));
        for n in referenced {
            if !self.rules.iter().any(|r| r.left == n) {
                return Err(GrammarError::UndefinedSymbol(self.nonterminals[&n].clone()));
            }
        }

        let mut productions = Map::default();
        productions.insert(
            ProductionID::ACCEPT,
            Production {
                left: NonterminalID::START,
                right: vec![SymbolID::N(start), SymbolID::T(TerminalID::EOI)],
                precedence: None,
            },
        );
        for (i, rule) in self.rules.iter().enumerate() {
            let precedence = match rule.prec {
                Some(t) => self.terminals[&t].precedence,
                None => rule
                    .right
                    .iter()
                    .rev()
                    .find_map(|s| match s {
                        SymbolID::T(t) => Some(self.terminals[t].precedence),
                        SymbolID::N(_) => None,
                    })
                    .flatten(),
            };
            productions.insert(
                ProductionID(ProductionID::OFFSET + i as u16),
                Production {
                    left: rule.left,
                    right: rule.right.clone(),
                    precedence,
                },
            );
        }
        let production_bound = ProductionID::OFFSET + self.rules.len() as u16;

        let nullables = nullable_fixpoint(&productions);

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            productions,
            start_symbol: start,
            nullables,
            production_bound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SymbolID::*;

    #[test]
    fn nullable_fixpoint_chases_chains() {
        let g = Grammar::define(|g| {
            let x = g.terminal("X")?;
            let s = g.nonterminal("s")?;
            let a = g.nonterminal("a")?;
            let b = g.nonterminal("b")?;
            g.rule(s, [N(a), T(x)])?;
            g.rule(a, [N(b), N(b)])?;
            g.rule(b, [])?;
            g.rule(b, [T(x)])?;
            Ok(())
        })
        .unwrap();
        let ids: Map<_, _> = g.nonterminals().map(|(id, name)| (name.to_owned(), id)).collect();
        assert!(g.nullable(ids["a"]));
        assert!(g.nullable(ids["b"]));
        assert!(!g.nullable(ids["s"]));
    }

    #[test]
    fn production_precedence_defaults_to_rightmost_terminal() {
        let g = Grammar::define(|g| {
            let plus = g.terminal("PLUS")?;
            let star = g.terminal("STAR")?;
            let num = g.terminal("NUM")?;
            g.precedence(Assoc::Left, [plus])?;
            g.precedence(Assoc::Left, [star])?;
            let e = g.nonterminal("expr")?;
            g.rule(e, [N(e), T(plus), N(e), T(star), N(e)])?;
            g.rule(e, [N(e), T(plus), N(e)])?;
            g.rule(e, [T(num)])?;
            Ok(())
        })
        .unwrap();
        let precs: Vec<_> = g
            .productions()
            .filter(|(id, _)| *id != ProductionID::ACCEPT)
            .map(|(_, p)| p.precedence())
            .collect();
        // STAR sits to the right of PLUS in the first rule.
        assert_eq!(precs[0].unwrap().priority, 1);
        assert_eq!(precs[1].unwrap().priority, 0);
        assert_eq!(precs[2], None);
    }

    #[test]
    fn explicit_prec_overrides_the_default() {
        let g = Grammar::define(|g| {
            let minus = g.terminal("MINUS")?;
            let uminus = g.terminal("UMINUS")?;
            let num = g.terminal("NUM")?;
            g.precedence(Assoc::Left, [minus])?;
            g.precedence(Assoc::Nonassoc, [uminus])?;
            let e = g.nonterminal("expr")?;
            g.rule(e, [N(e), T(minus), N(e)])?;
            g.rule_with_prec(e, [T(minus), N(e)], uminus)?;
            g.rule(e, [T(num)])?;
            Ok(())
        })
        .unwrap();
        let unary = g.production(ProductionID::from_raw(2));
        assert_eq!(
            unary.precedence(),
            Some(Precedence {
                priority: 1,
                assoc: Assoc::Nonassoc
            })
        );
    }

    #[test]
    fn duplicate_terminal_is_rejected() {
        let err = Grammar::define(|g| {
            g.terminal("ID")?;
            g.terminal("ID")?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateTerminal(name) if name == "ID"));
    }

    #[test]
    fn undefined_nonterminal_in_rhs_is_rejected() {
        let err = Grammar::define(|g| {
            let x = g.terminal("X")?;
            let s = g.nonterminal("s")?;
            let ghost = g.nonterminal("ghost")?;
            g.rule(s, [T(x), N(ghost)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::UndefinedSymbol(name) if name == "ghost"));
    }

    #[test]
    fn error_rule_shape_is_checked() {
        let err = Grammar::define(|g| {
            let semi = g.terminal("SEMI")?;
            let _ = semi;
            let s = g.nonterminal("s")?;
            let err = g.error_token();
            g.rule(s, [T(err), N(s)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::IllFormedProduction(_)));
    }

    #[test]
    fn stripping_error_productions_keeps_rule_ids() {
        let g = Grammar::define(|g| {
            let semi = g.terminal("SEMI")?;
            let id = g.terminal("ID")?;
            let s = g.nonterminal("stmt")?;
            g.rule(s, [T(id), T(semi)])?;
            g.rule(s, [T(g.error_token()), T(semi)])?;
            g.rule(s, [T(semi)])?;
            Ok(())
        })
        .unwrap();
        let stripped = g.without_error_productions();
        assert_eq!(stripped.production_bound(), g.production_bound());
        assert!(stripped.get_production(ProductionID::from_raw(2)).is_none());
        assert!(stripped.get_production(ProductionID::from_raw(3)).is_some());
    }
}
