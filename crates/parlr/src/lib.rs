//! An LALR(1) parser generator.
//!
//! A [`grammar::Grammar`] goes in; out come the deterministic action/goto
//! tables of an LALR(1) parser, with look-ahead sets computed by DeRemer and
//! Pennello's relational method, conflicts resolved through precedence and
//! associativity, and — when requested — a generalized (GLR) table that keeps
//! the competing actions for the forking driver in `parlr-runtime`.
//!
//! ```
//! use parlr::grammar::{Grammar, SymbolID::*};
//! use parlr::{generate, GeneratorOptions};
//!
//! let grammar = Grammar::define(|g| {
//!     let num = g.terminal("NUM")?;
//!     let plus = g.terminal("PLUS")?;
//!     let expr = g.nonterminal("expr")?;
//!     g.rule(expr, [N(expr), T(plus), T(num)])?;
//!     g.rule(expr, [T(num)])?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
//! assert!(generated.conflicts().is_empty());
//! ```

pub mod codegen;
pub mod digraph;
pub mod grammar;
pub mod lalr;
pub mod lr0;
pub mod report;
pub mod table;

mod types;
mod util;

pub use parlr_runtime as runtime;

use crate::grammar::{Grammar, TerminalID};
use crate::table::ConflictReport;
use parlr_runtime::glr::{GlrParser, GlrSemanticAction};
use parlr_runtime::parser::{DriverError, Parser, SemanticAction};
use parlr_runtime::spec::ParserSpec;
use std::{fs, io, path::PathBuf, sync::Arc};

/// A set of terminals, dense over the grammar's terminal ids. Look-ahead
/// computation is dominated by set unions, so this is a fixed-width bitset.
#[derive(Debug, Default, Clone)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.into_raw().into())
    }

    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.into_raw().into())
    }

    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner
            .iter()
            .map(|raw| TerminalID::from_raw(raw as u16))
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.into_raw().into()).collect(),
        }
    }
}

impl digraph::Set for TerminalSet {
    fn union_with(&mut self, other: &Self) {
        self.union_with(other)
    }
}

/// Which runtime the tables are built for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DriverKind {
    /// Deterministic tables; conflicts are resolved or reported.
    #[default]
    Lalr,
    /// Conflicts are retained for the forking driver. Error productions are
    /// stripped before construction.
    Glr,
}

/// Options steering a generation run. One instance per run; the generator
/// holds no state outside of it.
#[derive(Debug, Default)]
pub struct GeneratorOptions {
    /// Which driver the tables target.
    pub driver: DriverKind,
    /// How many unresolved conflicts to tolerate before failing.
    pub expect: usize,
    /// Emit the generated driver module `(module name, path)`.
    pub output: Option<(String, PathBuf)>,
    /// Emit the human-readable table dump.
    pub out_table: Option<PathBuf>,
}

impl GeneratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glr(mut self) -> Self {
        self.driver = DriverKind::Glr;
        self
    }

    pub fn expect(mut self, n: usize) -> Self {
        self.expect = n;
        self
    }

    pub fn output(mut self, module: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.output = Some((module.into(), path.into()));
        self
    }

    pub fn out_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.out_table = Some(path.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("{count} unresolved conflict(s) exceed the expected budget:\n{listing}")]
    UnexpectedConflicts { count: usize, listing: String },

    #[error("the assembled tables are inconsistent")]
    InvalidTables(
        #[from]
        #[source]
        parlr_runtime::spec::SpecError,
    ),

    #[error("failed to write a generator artifact")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}

/// The result of a generation run: the frozen tables plus the conflict
/// listing that stayed within budget.
#[derive(Debug)]
pub struct Generated {
    spec: Arc<ParserSpec>,
    conflicts: ConflictReport,
}

impl Generated {
    pub fn spec(&self) -> &Arc<ParserSpec> {
        &self.spec
    }

    pub fn conflicts(&self) -> &ConflictReport {
        &self.conflicts
    }

    /// The deterministic parser, with one semantic action per production.
    pub fn parser<V>(&self, actions: Vec<SemanticAction<V>>) -> Result<Parser<V>, DriverError> {
        Parser::new(self.spec.clone(), actions)
    }

    /// The forking parser over tables built with [`DriverKind::Glr`].
    pub fn glr_parser<V: Clone>(
        &self,
        actions: Vec<GlrSemanticAction<V>>,
    ) -> Result<GlrParser<V>, DriverError> {
        GlrParser::new(self.spec.clone(), actions)
    }
}

/// Run table construction end to end: LR(0) automaton, look-ahead sets,
/// table assembly with conflict resolution, and the artifacts the options
/// ask for.
#[tracing::instrument(skip_all)]
pub fn generate(grammar: &Grammar, options: &GeneratorOptions) -> Result<Generated, GenerateError> {
    let stripped;
    let g = match options.driver {
        DriverKind::Glr => {
            stripped = grammar.without_error_productions();
            &stripped
        }
        DriverKind::Lalr => grammar,
    };

    let automaton = lr0::lr0(g);
    let lookaheads = lalr::lalr(g, &automaton);
    let (spec, conflicts) = table::assemble(g, &automaton, &lookaheads, options.driver)?;

    if options.driver == DriverKind::Lalr && conflicts.unresolved() > options.expect {
        return Err(GenerateError::UnexpectedConflicts {
            count: conflicts.unresolved(),
            listing: conflicts.display(g).to_string(),
        });
    }

    if let Some(path) = &options.out_table {
        fs::write(
            path,
            report::table_dump(g, &automaton, &spec, &conflicts).to_string(),
        )?;
    }
    if let Some((module, path)) = &options.output {
        fs::write(path, codegen::Codegen::new(&spec, module).to_string())?;
    }

    Ok(Generated {
        spec: Arc::new(spec),
        conflicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn conflicted() -> Grammar {
        Grammar::define(|g| {
            let plus = g.terminal("PLUS")?;
            let num = g.terminal("NUM")?;
            let e = g.nonterminal("e")?;
            g.rule(e, [N(e), T(plus), N(e)])?;
            g.rule(e, [T(num)])?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn conflicts_over_budget_fail_with_a_listing() {
        let err = generate(&conflicted(), &GeneratorOptions::new()).unwrap_err();
        match err {
            GenerateError::UnexpectedConflicts { count, listing } => {
                assert_eq!(count, 1);
                assert!(listing.contains("shift/reduce"), "{}", listing);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn expect_suppresses_the_failure() {
        let generated = generate(&conflicted(), &GeneratorOptions::new().expect(1)).unwrap();
        assert_eq!(generated.conflicts().unresolved(), 1);
    }

    #[test]
    fn terminal_set_unions_and_iterates_in_order() {
        let mut a: TerminalSet = [TerminalID::from_raw(5), TerminalID::from_raw(2)]
            .into_iter()
            .collect();
        let b: TerminalSet = [TerminalID::EOI].into_iter().collect();
        a.union_with(&b);
        let ids: Vec<_> = a.iter().map(TerminalID::into_raw).collect();
        assert_eq!(ids, vec![0, 2, 5]);
    }
}
